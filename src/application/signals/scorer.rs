use crate::domain::errors::ScoringError;
use crate::domain::signal::Signal;
use crate::domain::trade::TradeRecord;
use chrono::{DateTime, Utc};

/// A way of turning buy trades into explained signals.
///
/// Implementations score every row they are given (callers restrict the batch to buys),
/// drop rows below their own floor, and return signals in input order.
pub trait Scorer: Send + Sync {
    fn score(&self, trades: &[TradeRecord], now: DateTime<Utc>) -> Result<Vec<Signal>, ScoringError>;

    /// Scorer name for logs and diagnostics
    fn name(&self) -> &str;
}

/// `$1,234,567` style rendering of a dollar amount.
pub(crate) fn format_usd(value: f64) -> String {
    let digits = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if value < 0.0 && digits != "0" {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

/// Renders a fraction as a percentage with one decimal, e.g. `0.123` -> `12.3%`.
pub(crate) fn format_pct(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_usd_groups_thousands() {
        assert_eq!(format_usd(0.0), "$0");
        assert_eq!(format_usd(999.4), "$999");
        assert_eq!(format_usd(1_000.0), "$1,000");
        assert_eq!(format_usd(1_200_000.0), "$1,200,000");
        assert_eq!(format_usd(-25_000.0), "-$25,000");
    }

    #[test]
    fn test_format_pct() {
        assert_eq!(format_pct(0.123), "12.3%");
        assert_eq!(format_pct(0.06), "6.0%");
    }
}
