use super::scorer::{Scorer, format_pct, format_usd};
use crate::application::ml::feature_engineer::FeatureEngineer;
use crate::domain::errors::ScoringError;
use crate::domain::ml::feature_table::FeatureTable;
use crate::domain::signal::{Confidence, Signal, SignalSource};
use crate::domain::trade::TradeRecord;
use crate::infrastructure::artifact_store::ModelArtifact;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Probabilities below this are not actionable.
pub const MODEL_SCORE_FLOOR: f64 = 0.30;
pub const MODEL_EXPECTED_RETURN_MULTIPLIER: f64 = 0.15;

const EXPLAINED_FEATURES: usize = 5;
const MIN_EXPLAINED_IMPORTANCE: f64 = 0.05;
const MAX_FEATURE_REASONS: usize = 3;
const MAX_REASONS: usize = 4;

/// Scores with a trained artifact. Features are built over the batch being scored.
pub struct ModelScorer {
    artifact: Arc<ModelArtifact>,
    engineer: FeatureEngineer,
    /// Most important declared features with normalized importance above the reason threshold.
    explained: Vec<String>,
}

impl ModelScorer {
    pub fn new(artifact: Arc<ModelArtifact>) -> Self {
        let explained = explained_features(&artifact);
        Self {
            artifact,
            engineer: FeatureEngineer::new(),
            explained,
        }
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    fn reasons(&self, table: &FeatureTable, row: usize, score: f64) -> Vec<String> {
        let mut reasons: Vec<String> = self
            .explained
            .iter()
            .filter_map(|name| {
                let value = table.value(row, name)?;
                feature_reason(name, value)
            })
            .take(MAX_FEATURE_REASONS)
            .collect();
        reasons.push(format!("Model confidence: {}", format_pct(score)));
        reasons.truncate(MAX_REASONS);
        reasons
    }
}

/// Top declared features by normalized importance, keeping those above the threshold.
fn explained_features(artifact: &ModelArtifact) -> Vec<String> {
    let names = &artifact.metadata.feature_names;
    let importances = artifact.classifier.importances();
    let total: f64 = importances.iter().sum();
    if importances.len() != names.len() || total <= 0.0 {
        return Vec::new();
    }

    let mut ranked: Vec<(&String, f64)> = names
        .iter()
        .zip(importances.iter().map(|v| v / total))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
        .into_iter()
        .take(EXPLAINED_FEATURES)
        .filter(|(_, importance)| *importance > MIN_EXPLAINED_IMPORTANCE)
        .map(|(name, _)| name.clone())
        .collect()
}

/// Sentence for a feature whose value crosses its domain threshold.
fn feature_reason(name: &str, value: f64) -> Option<String> {
    match name {
        "trade_value_usd" if value >= 500_000.0 => {
            Some(format!("High trade value: {}", format_usd(value)))
        }
        "is_ceo" if value == 1.0 => Some("CEO-level insider".to_string()),
        "is_cfo" if value == 1.0 => Some("CFO-level insider".to_string()),
        "insider_success_rate_1m" if value > 0.6 => Some(format!(
            "High insider success rate: {}",
            format_pct(value)
        )),
        "company_buy_ratio" if value > 0.7 => Some("Strong company insider buying".to_string()),
        "price_momentum_1m" if value > 0.05 => Some(format!(
            "Positive price momentum: {}",
            format_pct(value)
        )),
        _ => None,
    }
}

impl Scorer for ModelScorer {
    fn score(&self, trades: &[TradeRecord], now: DateTime<Utc>) -> Result<Vec<Signal>, ScoringError> {
        if trades.is_empty() {
            return Ok(Vec::new());
        }

        // Group aggregates only see this scoring window.
        let table = self.engineer.transform(trades, now);
        let declared = &self.artifact.metadata.feature_names;
        if table.available(declared).is_empty() {
            return Err(ScoringError::NoFeatureOverlap);
        }

        // Declared order; names missing from the table read as 0.
        let x = table.matrix(declared);
        let probabilities = self
            .artifact
            .predict_proba(&x)
            .map_err(|reason| ScoringError::Inference { reason })?;
        if probabilities.len() != trades.len() {
            return Err(ScoringError::Inference {
                reason: format!(
                    "{} probabilities for {} trades",
                    probabilities.len(),
                    trades.len()
                ),
            });
        }
        if let Some(bad) = probabilities.iter().find(|p| !p.is_finite()) {
            return Err(ScoringError::Inference {
                reason: format!("non-finite probability {}", bad),
            });
        }

        let signals = trades
            .iter()
            .zip(probabilities)
            .enumerate()
            .filter(|(_, (_, score))| *score >= MODEL_SCORE_FLOOR)
            .map(|(row, (trade, score))| Signal {
                ticker: trade.ticker.clone(),
                score,
                confidence: Confidence::from_score(score),
                reasons: self.reasons(&table, row, score),
                trade_date: trade.trade_date,
                insider_name: trade.insider_name.clone(),
                trade_value: trade.trade_value(),
                expected_return: score * MODEL_EXPECTED_RETURN_MULTIPLIER,
                generated_at: now,
                source: SignalSource::Model,
            })
            .collect();
        Ok(signals)
    }

    fn name(&self) -> &str {
        self.artifact.metadata.model_type.as_str()
    }
}
