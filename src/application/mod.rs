// Feature engineering, classifiers and offline training
pub mod ml;

// Online scoring
pub mod signals;
