//! Configuration module for insidex.
//!
//! Structured configuration loading from environment variables, organized by concern:
//! storage locations, online scoring, and offline training.

mod scoring_env_config;
mod training_env_config;

pub use scoring_env_config::ScoringEnvConfig;
pub use training_env_config::TrainingEnvConfig;

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://insider_trading.db";
pub const DEFAULT_ARTIFACTS_DIR: &str = "data/ml/artifacts";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub artifacts_dir: PathBuf,
    pub scoring: ScoringEnvConfig,
    pub training: TrainingEnvConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        let artifacts_dir = env::var("ML_ARTIFACTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_ARTIFACTS_DIR));

        let scoring = ScoringEnvConfig::from_env();
        let training = TrainingEnvConfig::from_env().context("Failed to load training config")?;

        Ok(Self {
            database_url,
            artifacts_dir,
            scoring,
            training,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ml::trainer::SplitStrategy;
    use crate::domain::ml::artifact::ModelKind;
    use std::sync::{Mutex, OnceLock};

    // Global lock to prevent race conditions when modifying environment variables in tests
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn get_env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    const VARS: &[&str] = &[
        "DATABASE_URL",
        "ML_ARTIFACTS_DIR",
        "SIGNAL_WINDOW_DAYS",
        "SIGNAL_LIMIT",
        "SIGNAL_CANDIDATE_LIMIT",
        "TICKER_LOOKBACK_DAYS",
        "TICKER_CANDIDATE_LIMIT",
        "TRAIN_MODEL_TYPE",
        "TRAIN_HORIZON_DAYS",
        "TRAIN_THRESHOLD_PCT",
        "TRAIN_TEST_FRACTION",
        "TRAIN_SEED",
        "TRAIN_SPLIT",
        "TRAIN_LIMIT",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe { env::remove_var(var) };
        }
    }

    #[test]
    fn test_config_from_env_defaults() {
        let _guard = get_env_lock().lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let config = Config::from_env().unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.artifacts_dir, PathBuf::from(DEFAULT_ARTIFACTS_DIR));
        assert_eq!(config.scoring, ScoringEnvConfig::default());
        assert_eq!(config.training.model_kind, ModelKind::RandomForest);
        assert_eq!(config.training.horizon_days, 20);
        assert_eq!(config.training.split, SplitStrategy::Temporal);
        assert!(config.training.limit.is_none());
    }

    #[test]
    fn test_config_overrides() {
        let _guard = get_env_lock().lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        unsafe {
            env::set_var("ML_ARTIFACTS_DIR", "/tmp/insidex-models");
            env::set_var("SIGNAL_LIMIT", "10");
            env::set_var("TRAIN_MODEL_TYPE", "Logistic_Regression");
            env::set_var("TRAIN_SPLIT", "stratified");
            env::set_var("TRAIN_LIMIT", "5000");
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.artifacts_dir, PathBuf::from("/tmp/insidex-models"));
        assert_eq!(config.scoring.limit, 10);
        assert_eq!(config.training.model_kind, ModelKind::LogisticRegression);
        assert_eq!(config.training.options().split, SplitStrategy::Stratified);
        assert_eq!(config.training.limit, Some(5000));

        clear_env();
    }

    #[test]
    fn test_malformed_numbers_fall_back() {
        let _guard = get_env_lock().lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        unsafe {
            env::set_var("SIGNAL_WINDOW_DAYS", "thirty");
            env::set_var("TRAIN_TEST_FRACTION", "1.5");
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.scoring.window_days, 30);
        assert_eq!(config.training.test_fraction, 0.2);

        clear_env();
    }

    #[test]
    fn test_invalid_model_type_is_an_error() {
        let _guard = get_env_lock().lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        unsafe { env::set_var("TRAIN_MODEL_TYPE", "svm") };

        let err = Config::from_env().unwrap_err();
        assert!(format!("{:#}", err).contains("svm"));

        clear_env();
    }
}
