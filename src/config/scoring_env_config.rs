//! Online scoring configuration parsed from environment variables.

use std::env;

/// Windows and caps used when pulling candidate trades for scoring
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringEnvConfig {
    pub window_days: u32,
    pub limit: usize,
    pub candidate_limit: usize,
    pub ticker_lookback_days: u32,
    pub ticker_candidate_limit: usize,
}

impl Default for ScoringEnvConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            limit: 50,
            candidate_limit: 1000,
            ticker_lookback_days: 30,
            ticker_candidate_limit: 100,
        }
    }
}

impl ScoringEnvConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            window_days: env::var("SIGNAL_WINDOW_DAYS")
                .ok()
                .and_then(|v| v.trim().parse::<u32>().ok())
                .unwrap_or(defaults.window_days),
            limit: env::var("SIGNAL_LIMIT")
                .ok()
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(defaults.limit),
            candidate_limit: env::var("SIGNAL_CANDIDATE_LIMIT")
                .ok()
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(defaults.candidate_limit),
            ticker_lookback_days: env::var("TICKER_LOOKBACK_DAYS")
                .ok()
                .and_then(|v| v.trim().parse::<u32>().ok())
                .unwrap_or(defaults.ticker_lookback_days),
            ticker_candidate_limit: env::var("TICKER_CANDIDATE_LIMIT")
                .ok()
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(defaults.ticker_candidate_limit),
        }
    }
}
