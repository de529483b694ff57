use super::scorer::{Scorer, format_pct, format_usd};
use crate::domain::errors::ScoringError;
use crate::domain::signal::{Confidence, Signal, SignalSource};
use crate::domain::trade::TradeRecord;
use chrono::{DateTime, Utc};

const GENERIC_REASON: &str = "Insider buy activity";

const CEO_LEVEL: &[&str] = &["ceo", "president", "chief executive"];
const CFO_LEVEL: &[&str] = &["cfo", "chief financial"];
const DIRECTOR_LEVEL: &[&str] = &["director"];

/// Rule weights for the fallback scorer.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicWeights {
    pub base: f64,
    pub large_trade_usd: f64,
    pub large_trade_bonus: f64,
    pub significant_trade_usd: f64,
    pub significant_trade_bonus: f64,
    pub ceo_bonus: f64,
    pub cfo_bonus: f64,
    pub director_bonus: f64,
    /// 1-month performance above this earns `momentum_bonus`.
    pub momentum_threshold: f64,
    pub momentum_bonus: f64,
    pub recent_filing_days: i64,
    pub recent_filing_bonus: f64,
    pub cap: f64,
    /// Rows scoring below this are dropped.
    pub floor: f64,
    pub expected_return_multiplier: f64,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            base: 0.40,
            large_trade_usd: 1_000_000.0,
            large_trade_bonus: 0.25,
            significant_trade_usd: 500_000.0,
            significant_trade_bonus: 0.15,
            ceo_bonus: 0.15,
            cfo_bonus: 0.12,
            director_bonus: 0.08,
            momentum_threshold: 0.05,
            momentum_bonus: 0.10,
            recent_filing_days: 7,
            recent_filing_bonus: 0.05,
            cap: 0.95,
            floor: 0.35,
            expected_return_multiplier: 0.12,
        }
    }
}

/// Deterministic rule-based scorer used when no model is available or the model path fails.
#[derive(Debug, Clone, Default)]
pub struct HeuristicScorer {
    weights: HeuristicWeights,
}

impl HeuristicScorer {
    pub fn new(weights: HeuristicWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &HeuristicWeights {
        &self.weights
    }

    /// Score and reasons for one trade, before the cap/floor.
    fn rate(&self, trade: &TradeRecord, now: DateTime<Utc>) -> (f64, Vec<String>) {
        let w = &self.weights;
        let mut score = w.base;
        let mut reasons = Vec::new();

        let notional = trade.notional();
        if notional >= w.large_trade_usd {
            score += w.large_trade_bonus;
            reasons.push(format!("Large trade value: {}", format_usd(notional)));
        } else if notional >= w.significant_trade_usd {
            score += w.significant_trade_bonus;
            reasons.push(format!("Significant trade value: {}", format_usd(notional)));
        }

        let title = trade.title.as_deref().unwrap_or_default().to_lowercase();
        let has_any = |roles: &[&str]| roles.iter().any(|r| title.contains(r));
        if has_any(CEO_LEVEL) {
            score += w.ceo_bonus;
            reasons.push("CEO-level insider trading".to_string());
        } else if has_any(CFO_LEVEL) {
            score += w.cfo_bonus;
            reasons.push("CFO-level insider trading".to_string());
        } else if has_any(DIRECTOR_LEVEL) {
            score += w.director_bonus;
            reasons.push("Director-level insider trading".to_string());
        }

        if let Some(perf) = trade.performance_1m
            && perf > w.momentum_threshold
        {
            score += w.momentum_bonus;
            reasons.push(format!("Strong 1M performance history: {}", format_pct(perf)));
        }

        if let Some(filed) = trade.filing_date
            && (now.naive_utc() - filed).num_days() < w.recent_filing_days
        {
            score += w.recent_filing_bonus;
            reasons.push("Recently filed".to_string());
        }

        (score.min(w.cap), reasons)
    }
}

impl Scorer for HeuristicScorer {
    fn score(&self, trades: &[TradeRecord], now: DateTime<Utc>) -> Result<Vec<Signal>, ScoringError> {
        let signals = trades
            .iter()
            .filter_map(|trade| {
                let (score, mut reasons) = self.rate(trade, now);
                if score < self.weights.floor {
                    return None;
                }
                if reasons.is_empty() {
                    reasons.push(GENERIC_REASON.to_string());
                }
                Some(Signal {
                    ticker: trade.ticker.clone(),
                    score,
                    confidence: Confidence::from_score(score),
                    reasons,
                    trade_date: trade.trade_date,
                    insider_name: trade.insider_name.clone(),
                    trade_value: trade.trade_value(),
                    expected_return: score * self.weights.expected_return_multiplier,
                    generated_at: now,
                    source: SignalSource::Heuristic,
                })
            })
            .collect();
        Ok(signals)
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}
