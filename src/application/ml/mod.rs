pub mod classifier;
pub mod feature_engineer;
pub mod metrics;
pub mod trainer;

pub use feature_engineer::FeatureEngineer;
pub use trainer::{ModelTrainer, SplitStrategy, TrainingOptions, TrainingReport};
