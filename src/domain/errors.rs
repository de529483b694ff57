use std::path::PathBuf;
use thiserror::Error;

/// Errors related to reading and publishing artifact bundles
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed artifact file {path}: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Artifact bundle is inconsistent: expected {expected}, found {found}")]
    Inconsistent { expected: String, found: String },

    #[error("Artifact version {timestamp} already exists; refusing to overwrite it")]
    VersionExists { timestamp: String },
}

/// Errors that abort a training run. No artifact is written when one is raised.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("Feature table is empty: nothing to train on")]
    EmptyFeatureTable,

    #[error("Labels contain a single class ({class}); need both outcomes to train")]
    SingleClass { class: u8 },

    #[error("Unsupported model type: {kind}. Must be 'random_forest' or 'logistic_regression'")]
    UnsupportedModelKind { kind: String },

    #[error("No fitted model: call fit before {operation}")]
    NotFitted { operation: &'static str },

    #[error("Model fit failed: {reason}")]
    Fit { reason: String },

    #[error("Train/test split left an empty partition: {reason}")]
    EmptySplit { reason: String },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Errors on the model scoring path. Any of these sends the batch to the heuristic scorer.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("None of the artifact's declared features are present in the feature table")]
    NoFeatureOverlap,

    #[error("Inference failed: {reason}")]
    Inference { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_error_formatting() {
        let err = TrainingError::SingleClass { class: 0 };
        let msg = err.to_string();
        assert!(msg.contains("single class"));
        assert!(msg.contains('0'));
    }

    #[test]
    fn test_artifact_error_converts_into_training_error() {
        let err: TrainingError = ArtifactError::Inconsistent {
            expected: "20240101_000000".to_string(),
            found: "20231231_000000".to_string(),
        }
        .into();

        let msg = err.to_string();
        assert!(msg.contains("20240101_000000"));
        assert!(msg.contains("20231231_000000"));
    }
}
