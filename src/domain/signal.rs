use crate::domain::ml::artifact::ModelMetrics;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Scores above this are "high" confidence.
pub const HIGH_CONFIDENCE_SCORE: f64 = 0.70;
/// Scores above this (and not high) are "medium" confidence.
pub const MEDIUM_CONFIDENCE_SCORE: f64 = 0.50;

/// Coarse bucket derived from a score. Same boundaries on every scoring path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn from_score(score: f64) -> Self {
        if score > HIGH_CONFIDENCE_SCORE {
            Confidence::High
        } else if score > MEDIUM_CONFIDENCE_SCORE {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// Which scorer produced a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSource {
    Model,
    Heuristic,
}

/// A scored, explained insider buy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub ticker: String,
    pub score: f64,
    pub confidence: Confidence,
    pub reasons: Vec<String>,
    pub trade_date: Option<NaiveDate>,
    pub insider_name: String,
    pub trade_value: f64,
    pub expected_return: f64,
    pub generated_at: DateTime<Utc>,
    pub source: SignalSource,
}

/// Ranked signals for the API layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalBatch {
    pub generated_at: DateTime<Utc>,
    pub window_days: u32,
    pub signals: Vec<Signal>,
    pub total: usize,
}

impl SignalBatch {
    pub fn new(generated_at: DateTime<Utc>, window_days: u32, signals: Vec<Signal>) -> Self {
        let total = signals.len();
        Self {
            generated_at,
            window_days,
            signals,
            total,
        }
    }
}

/// Diagnostics about the loaded artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_loaded: bool,
    pub model_type: String,
    pub n_features: usize,
    pub model_timestamp: Option<String>,
    pub model_metrics: Option<ModelMetrics>,
    pub scaler_used: bool,
}

/// Sorts by score descending; ties keep input order.
pub fn rank_signals(signals: &mut [Signal]) {
    signals.sort_by(|a, b| b.score.total_cmp(&a.score));
}
