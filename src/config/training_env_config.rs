//! Offline training configuration parsed from environment variables.

use crate::application::ml::trainer::{SplitStrategy, TrainingOptions};
use crate::domain::ml::artifact::ModelKind;
use anyhow::{Result, anyhow};
use std::env;
use std::str::FromStr;

/// Training environment configuration
#[derive(Debug, Clone)]
pub struct TrainingEnvConfig {
    pub model_kind: ModelKind,
    pub horizon_days: u32,
    pub threshold_pct: f64,
    pub test_fraction: f64,
    pub seed: u64,
    pub split: SplitStrategy,
    pub limit: Option<usize>,
}

impl Default for TrainingEnvConfig {
    fn default() -> Self {
        let options = TrainingOptions::default();
        Self {
            model_kind: options.model_kind,
            horizon_days: options.horizon_days,
            threshold_pct: options.threshold_pct,
            test_fraction: options.test_fraction,
            seed: options.seed,
            split: options.split,
            limit: options.limit,
        }
    }
}

impl TrainingEnvConfig {
    /// Enumerated settings must be valid; malformed numbers fall back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let model_kind = match env::var("TRAIN_MODEL_TYPE") {
            Ok(raw) => ModelKind::from_str(&raw)?,
            Err(_) => defaults.model_kind,
        };
        let split = match env::var("TRAIN_SPLIT") {
            Ok(raw) => SplitStrategy::from_str(&raw).map_err(|e| anyhow!(e))?,
            Err(_) => defaults.split,
        };

        let test_fraction = env::var("TRAIN_TEST_FRACTION")
            .ok()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|f| *f > 0.0 && *f < 1.0)
            .unwrap_or(defaults.test_fraction);

        Ok(Self {
            model_kind,
            horizon_days: env::var("TRAIN_HORIZON_DAYS")
                .ok()
                .and_then(|v| v.trim().parse::<u32>().ok())
                .unwrap_or(defaults.horizon_days),
            threshold_pct: env::var("TRAIN_THRESHOLD_PCT")
                .ok()
                .and_then(|v| v.trim().parse::<f64>().ok())
                .unwrap_or(defaults.threshold_pct),
            test_fraction,
            seed: env::var("TRAIN_SEED")
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(defaults.seed),
            split,
            limit: env::var("TRAIN_LIMIT")
                .ok()
                .and_then(|v| v.trim().parse::<usize>().ok()),
        })
    }

    pub fn options(&self) -> TrainingOptions {
        TrainingOptions {
            model_kind: self.model_kind,
            horizon_days: self.horizon_days,
            threshold_pct: self.threshold_pct,
            test_fraction: self.test_fraction,
            seed: self.seed,
            split: self.split,
            limit: self.limit,
        }
    }
}
