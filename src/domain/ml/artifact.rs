use crate::domain::errors::TrainingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classifier families the trainer can fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    RandomForest,
    LogisticRegression,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "random_forest",
            ModelKind::LogisticRegression => "logistic_regression",
        }
    }

    /// Only the linear model is trained on standardized features.
    pub fn uses_scaler(&self) -> bool {
        matches!(self, ModelKind::LogisticRegression)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "random_forest" => Ok(ModelKind::RandomForest),
            "logistic_regression" => Ok(ModelKind::LogisticRegression),
            other => Err(TrainingError::UnsupportedModelKind {
                kind: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassSupport {
    pub negative: usize,
    pub positive: usize,
}

/// Held-out evaluation of a fitted classifier. Precision, recall and F1 refer to the positive class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub auc: f64,
    pub pr_auc: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: ClassSupport,
}

/// Contents of `metadata.json` in an artifact directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub timestamp: String,
    pub model_type: ModelKind,
    pub feature_names: Vec<String>,
    pub n_features: usize,
    pub metrics: ModelMetrics,
    pub scaler_used: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_kind_parsing() {
        assert_eq!(
            "random_forest".parse::<ModelKind>().unwrap(),
            ModelKind::RandomForest
        );
        assert_eq!(
            "Logistic_Regression".parse::<ModelKind>().unwrap(),
            ModelKind::LogisticRegression
        );

        let err = "gradient_boosting".parse::<ModelKind>().unwrap_err();
        assert!(matches!(err, TrainingError::UnsupportedModelKind { ref kind } if kind == "gradient_boosting"));
        assert!(err.to_string().contains("gradient_boosting"));
    }

    #[test]
    fn test_metadata_json_shape() {
        let metadata = ModelMetadata {
            timestamp: "20240301_120000".to_string(),
            model_type: ModelKind::LogisticRegression,
            feature_names: vec!["is_ceo".to_string()],
            n_features: 1,
            metrics: ModelMetrics::default(),
            scaler_used: true,
        };
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["model_type"], "logistic_regression");
        assert_eq!(value["metrics"]["support"]["positive"], 0);
        assert_eq!(value["scaler_used"], true);
    }
}
