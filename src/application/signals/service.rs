//! Signal generation facade used by the API layer.
//!
//! Holds at most one loaded artifact. A newer artifact is only picked up through
//! `reload`; there is no file watching.

use super::heuristic::HeuristicScorer;
use super::model_scorer::ModelScorer;
use super::scorer::Scorer;
use crate::config::ScoringEnvConfig;
use crate::domain::repositories::{TradeQuery, TradeStore};
use crate::domain::signal::{ModelInfo, Signal, SignalBatch, rank_signals};
use crate::domain::trade::TradeRecord;
use crate::infrastructure::artifact_store::ArtifactStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

pub struct SignalService {
    store: Arc<dyn TradeStore>,
    artifacts: ArtifactStore,
    config: ScoringEnvConfig,
    heuristic: HeuristicScorer,
    model: Option<ModelScorer>,
}

impl SignalService {
    /// Never fails: a missing or unreadable artifact leaves the service heuristic-only.
    pub fn new(store: Arc<dyn TradeStore>, artifacts: ArtifactStore, config: ScoringEnvConfig) -> Self {
        let model = load_model(&artifacts);
        Self {
            store,
            artifacts,
            config,
            heuristic: HeuristicScorer::default(),
            model,
        }
    }

    pub fn with_heuristic(mut self, heuristic: HeuristicScorer) -> Self {
        self.heuristic = heuristic;
        self
    }

    /// Re-reads the latest bundle. Returns whether a model is loaded afterwards.
    pub fn reload(&mut self) -> bool {
        self.model = load_model(&self.artifacts);
        self.model.is_some()
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Scores the Buy rows of `trades`, best first, truncated to `limit` when given.
    ///
    /// Any model-path failure sends the whole batch to the heuristic scorer.
    pub fn score_batch(
        &self,
        trades: &[TradeRecord],
        now: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Vec<Signal> {
        let buys: Vec<TradeRecord> = trades.iter().filter(|t| t.is_buy()).cloned().collect();
        if buys.is_empty() {
            return Vec::new();
        }

        let mut signals = match &self.model {
            Some(model) => match model.score(&buys, now) {
                Ok(signals) => signals,
                Err(e) => {
                    warn!(
                        "{} scorer failed ({}); falling back to heuristics for {} trades",
                        model.name(),
                        e,
                        buys.len()
                    );
                    self.score_heuristic(&buys, now)
                }
            },
            None => self.score_heuristic(&buys, now),
        };

        rank_signals(&mut signals);
        if let Some(limit) = limit {
            signals.truncate(limit);
        }
        signals
    }

    fn score_heuristic(&self, buys: &[TradeRecord], now: DateTime<Utc>) -> Vec<Signal> {
        self.heuristic.score(buys, now).unwrap_or_else(|e| {
            warn!("Heuristic scoring failed: {}", e);
            Vec::new()
        })
    }

    /// Top signals over trades dated within `window_days` of `now`.
    pub async fn generate_signals(
        &self,
        window_days: u32,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<SignalBatch> {
        let start = (now - Duration::days(i64::from(window_days))).date_naive();
        let query = TradeQuery::new()
            .start_date(start)
            .limit(self.config.candidate_limit);
        let trades = self
            .store
            .query_trades(&query)
            .await
            .context("Failed to load recent trades")?;

        let signals = self.score_batch(&trades, now, Some(limit));
        info!(
            "Generated {} signals from {} trades over {} days",
            signals.len(),
            trades.len(),
            window_days
        );
        Ok(SignalBatch::new(now, window_days, signals))
    }

    /// Top signals with the configured window and limit.
    pub async fn generate_default_signals(&self, now: DateTime<Utc>) -> Result<SignalBatch> {
        self.generate_signals(self.config.window_days, self.config.limit, now)
            .await
    }

    /// Every surviving signal for one ticker's recent trades, best first.
    pub async fn score_for_ticker(
        &self,
        ticker: &str,
        lookback_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Signal>> {
        let start = (now - Duration::days(i64::from(lookback_days))).date_naive();
        let query = TradeQuery::new()
            .ticker(&ticker.trim().to_uppercase())
            .start_date(start)
            .limit(self.config.ticker_candidate_limit);
        let trades = self
            .store
            .query_trades(&query)
            .await
            .with_context(|| format!("Failed to load trades for {}", ticker))?;

        Ok(self.score_batch(&trades, now, None))
    }

    pub fn model_info(&self) -> ModelInfo {
        match &self.model {
            Some(model) => {
                let artifact = model.artifact();
                ModelInfo {
                    model_loaded: true,
                    model_type: artifact.metadata.model_type.to_string(),
                    n_features: artifact.metadata.feature_names.len(),
                    model_timestamp: Some(artifact.metadata.timestamp.clone()),
                    model_metrics: Some(artifact.metadata.metrics.clone()),
                    scaler_used: artifact.scaler.is_some(),
                }
            }
            None => ModelInfo {
                model_loaded: false,
                model_type: "Unknown".to_string(),
                n_features: 0,
                model_timestamp: None,
                model_metrics: None,
                scaler_used: false,
            },
        }
    }
}

fn load_model(artifacts: &ArtifactStore) -> Option<ModelScorer> {
    match artifacts.load_latest() {
        Ok(Some(artifact)) if !artifact.metadata.feature_names.is_empty() => {
            info!(
                "Loaded {} model {} with {} features",
                artifact.metadata.model_type,
                artifact.metadata.timestamp,
                artifact.metadata.feature_names.len()
            );
            Some(ModelScorer::new(Arc::new(artifact)))
        }
        Ok(Some(artifact)) => {
            warn!(
                "Model {} declares no features; using heuristic scoring",
                artifact.metadata.timestamp
            );
            None
        }
        Ok(None) => {
            warn!(
                "No model artifact in {:?}; using heuristic scoring",
                artifacts.dir()
            );
            None
        }
        Err(e) => {
            warn!("Could not load model artifact: {}; using heuristic scoring", e);
            None
        }
    }
}
