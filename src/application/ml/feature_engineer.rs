//! Feature engineering shared by training and serving.
//!
//! `transform` is a pure function of the batch and the caller's clock. The same code path
//! builds the training matrix and the serving matrix, so a feature means the same thing in
//! both places as long as the batches are comparable (see `cross_sectional_stats`).

use crate::domain::ml::feature_registry::{
    CEO_KEYWORDS, CFO_KEYWORDS, DIRECTOR_KEYWORDS, FEATURE_NAMES, OWNER_KEYWORDS,
    TRADE_FLAG_CODES, UNKNOWN_TEXT, is_zero_filled, title_matches,
};
use crate::domain::ml::feature_table::{FeatureTable, RowKey};
use crate::domain::trade::{TradeRecord, TradeType};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use statrs::statistics::{Data, Median, Statistics};
use std::collections::HashMap;

/// Horizons up to this many days are labelled from the 1-month performance field.
const ONE_MONTH_HORIZON_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEngineer;

impl FeatureEngineer {
    pub fn new() -> Self {
        Self
    }

    /// Canonical, ordered feature list expected by the classifiers.
    pub fn feature_names() -> Vec<String> {
        FEATURE_NAMES.iter().map(|n| n.to_string()).collect()
    }

    /// Builds the feature table for `batch`. Row `i` of the table describes `batch[i]`.
    ///
    /// `now` anchors the recency feature so repeated calls are deterministic.
    pub fn transform(&self, batch: &[TradeRecord], now: DateTime<Utc>) -> FeatureTable {
        if batch.is_empty() {
            return FeatureTable::default();
        }

        let keys = batch
            .iter()
            .map(|t| RowKey {
                ticker: text_or_unknown(Some(&t.ticker)),
                insider_name: text_or_unknown(Some(&t.insider_name)),
                title: text_or_unknown(t.title.as_deref()),
            })
            .collect();
        let mut table = FeatureTable::new(keys);

        add_trade_features(&mut table, batch);
        add_calendar_features(&mut table, batch, now.naive_utc());
        add_insider_features(&mut table, batch);
        add_company_features(&mut table, batch);
        add_market_features(&mut table, batch);
        fill_missing_values(&mut table);

        table
    }

    /// Binary training target per row.
    ///
    /// Horizons up to 30 days read the 1-month performance, longer ones the 6-month
    /// performance. A row is positive when performance exceeds `threshold_pct` percent.
    /// Rows without a realized performance are labelled 0, so "unknown" and "negative"
    /// are indistinguishable to the trainer.
    pub fn label_for(&self, batch: &[TradeRecord], horizon_days: u32, threshold_pct: f64) -> Vec<u8> {
        let threshold = threshold_pct / 100.0;
        batch
            .iter()
            .map(|t| {
                let performance = if horizon_days <= ONE_MONTH_HORIZON_DAYS {
                    t.performance_1m
                } else {
                    t.performance_6m
                };
                u8::from(performance.is_some_and(|p| p > threshold))
            })
            .collect()
    }
}

fn text_or_unknown(text: Option<&str>) -> String {
    match text.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => UNKNOWN_TEXT.to_string(),
    }
}

fn indicator(flag: bool) -> f64 {
    if flag { 1.0 } else { 0.0 }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

fn add_trade_features(table: &mut FeatureTable, batch: &[TradeRecord]) {
    let notional: Vec<f64> = batch
        .iter()
        .map(|t| t.qty.unwrap_or(0.0) * t.price.unwrap_or(0.0))
        .collect();
    // Notionals at or below -1 give NaN/-inf here and are median-filled later.
    let log_notional = notional.iter().map(|v| v.ln_1p()).collect();

    let delta_own_ratio = batch
        .iter()
        .map(|t| match t.owned {
            Some(owned) if owned > 0.0 => t.delta_own.unwrap_or(0.0) / owned,
            _ => 0.0,
        })
        .collect();

    table.insert("trade_value_usd", notional);
    table.insert("log_trade_value", log_notional);
    table.insert("delta_own_ratio", delta_own_ratio);
    table.insert(
        "is_buy",
        batch.iter().map(|t| indicator(t.trade_type == TradeType::Buy)).collect(),
    );
    table.insert(
        "is_sell",
        batch.iter().map(|t| indicator(t.trade_type == TradeType::Sell)).collect(),
    );

    for code in TRADE_FLAG_CODES {
        let values = batch
            .iter()
            .map(|t| indicator(t.trade_flag.as_deref().is_some_and(|f| f.contains(code))))
            .collect();
        table.insert(&format!("flag_{code}"), values);
    }

    let roles: [(&str, &[&str]); 4] = [
        ("is_ceo", CEO_KEYWORDS),
        ("is_cfo", CFO_KEYWORDS),
        ("is_director", DIRECTOR_KEYWORDS),
        ("is_owner", OWNER_KEYWORDS),
    ];
    for (name, keywords) in roles {
        let values = batch
            .iter()
            .map(|t| indicator(title_matches(t.title.as_deref(), keywords)))
            .collect();
        table.insert(name, values);
    }
}

/// Whole days from `earlier` to `later`, floored like a calendar difference.
fn days_between(earlier: NaiveDateTime, later: NaiveDateTime) -> f64 {
    ((later - earlier).num_seconds() as f64 / 86_400.0).floor()
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(chrono::NaiveTime::MIN)
}

fn add_calendar_features(table: &mut FeatureTable, batch: &[TradeRecord], now: NaiveDateTime) {
    let filing_delay = batch
        .iter()
        .map(|t| match (t.filing_date, t.trade_date) {
            (Some(filed), Some(traded)) => days_between(midnight(traded), filed),
            _ => 0.0,
        })
        .collect();
    table.insert("filing_delay_days", filing_delay);

    let by_date = |f: fn(NaiveDate) -> f64| -> Vec<f64> {
        batch
            .iter()
            .map(|t| t.trade_date.map(f).unwrap_or(f64::NAN))
            .collect()
    };
    table.insert(
        "trade_day_of_week",
        by_date(|d| d.weekday().num_days_from_monday() as f64),
    );
    table.insert("trade_month", by_date(|d| d.month() as f64));
    table.insert("trade_quarter", by_date(|d| (d.month0() / 3 + 1) as f64));
    table.insert("trade_year", by_date(|d| d.year() as f64));

    let recency = batch
        .iter()
        .map(|t| {
            t.trade_date
                .map(|d| days_between(midnight(d), now))
                .unwrap_or(f64::NAN)
        })
        .collect();
    table.insert("days_since_trade", recency);
}

/// Summary of the group a row belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStats {
    pub count: f64,
    pub notional_sum: f64,
    pub notional_mean: f64,
    /// Sample standard deviation; NaN for single-row groups.
    pub notional_std: f64,
    pub buy_count: f64,
    /// Means over rows with a realized performance; NaN when none has one.
    pub performance_1m_mean: f64,
    pub performance_6m_mean: f64,
    pub performance_1m_std: f64,
    pub price_mean: f64,
}

/// Groups the rows of `batch` by `key` and returns, for every row, the stats of its group.
///
/// The aggregates describe only the rows passed in. During training the batch is the full
/// historical corpus; during serving it is the recent scoring window. The same insider can
/// therefore get different aggregate values at train and serve time.
pub fn cross_sectional_stats<F>(batch: &[TradeRecord], key: F) -> Vec<GroupStats>
where
    F: Fn(&TradeRecord) -> String,
{
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    let row_keys: Vec<String> = batch.iter().map(&key).collect();
    for (row, k) in row_keys.iter().enumerate() {
        groups.entry(k.clone()).or_default().push(row);
    }

    let stats: HashMap<String, GroupStats> = groups
        .into_iter()
        .map(|(k, rows)| {
            let s = group_stats(batch, &rows);
            (k, s)
        })
        .collect();

    row_keys
        .iter()
        .map(|k| stats[k.as_str()].clone())
        .collect()
}

fn group_stats(batch: &[TradeRecord], rows: &[usize]) -> GroupStats {
    let notional: Vec<f64> = rows
        .iter()
        .map(|&i| batch[i].qty.unwrap_or(0.0) * batch[i].price.unwrap_or(0.0))
        .collect();
    let present = |f: fn(&TradeRecord) -> Option<f64>| -> Vec<f64> {
        rows.iter().filter_map(|&i| f(&batch[i])).collect()
    };
    let perf_1m = present(|t| t.performance_1m);
    let perf_6m = present(|t| t.performance_6m);
    let prices = present(|t| t.price);

    GroupStats {
        count: rows.len() as f64,
        notional_sum: notional.iter().sum(),
        notional_mean: (&notional).mean(),
        notional_std: (&notional).std_dev(),
        buy_count: rows.iter().filter(|&&i| batch[i].is_buy()).count() as f64,
        performance_1m_mean: (&perf_1m).mean(),
        performance_6m_mean: (&perf_6m).mean(),
        performance_1m_std: (&perf_1m).std_dev(),
        price_mean: (&prices).mean(),
    }
}

fn add_insider_features(table: &mut FeatureTable, batch: &[TradeRecord]) {
    let stats = cross_sectional_stats(batch, |t| text_or_unknown(Some(&t.insider_name)));
    let col = |f: fn(&GroupStats) -> f64| -> Vec<f64> { stats.iter().map(|s| round4(f(s))).collect() };

    let count = col(|s| s.count);
    let buys = col(|s| s.buy_count);
    let perf_1m_mean = col(|s| s.performance_1m_mean);

    let buy_ratio = count.iter().zip(&buys).map(|(c, b)| b / c).collect();
    let success_rate = perf_1m_mean.iter().map(|m| indicator(*m > 0.0)).collect();

    table.insert("insider_trade_value_usd_count", count);
    table.insert("insider_trade_value_usd_sum", col(|s| s.notional_sum));
    table.insert("insider_trade_value_usd_mean", col(|s| s.notional_mean));
    table.insert("insider_trade_value_usd_std", col(|s| s.notional_std));
    table.insert("insider_is_buy_sum", buys);
    table.insert("insider_performance_1m_mean", perf_1m_mean);
    table.insert("insider_performance_6m_mean", col(|s| s.performance_6m_mean));
    table.insert("insider_buy_ratio", buy_ratio);
    table.insert("insider_success_rate_1m", success_rate);
}

fn add_company_features(table: &mut FeatureTable, batch: &[TradeRecord]) {
    let stats = cross_sectional_stats(batch, |t| text_or_unknown(Some(&t.ticker)));
    let col = |f: fn(&GroupStats) -> f64| -> Vec<f64> { stats.iter().map(|s| round4(f(s))).collect() };

    let count = col(|s| s.count);
    let buys = col(|s| s.buy_count);
    let buy_ratio = count.iter().zip(&buys).map(|(c, b)| b / c).collect();

    table.insert("company_trade_value_usd_count", count);
    table.insert("company_trade_value_usd_sum", col(|s| s.notional_sum));
    table.insert("company_trade_value_usd_mean", col(|s| s.notional_mean));
    table.insert("company_is_buy_sum", buys);
    table.insert("company_price_mean", col(|s| s.price_mean));
    table.insert("company_buy_ratio", buy_ratio);

    // Market proxy; unrounded and zero-filled rather than median-filled.
    let volatility = stats
        .iter()
        .map(|s| {
            if s.performance_1m_std.is_finite() {
                s.performance_1m_std
            } else {
                0.0
            }
        })
        .collect();
    table.insert("price_volatility", volatility);
}

fn add_market_features(table: &mut FeatureTable, batch: &[TradeRecord]) {
    // Realized forward performance stands in for momentum until a market data feed exists.
    table.insert(
        "price_momentum_1m",
        batch.iter().map(|t| t.performance_1m.unwrap_or(0.0)).collect(),
    );
    table.insert(
        "price_momentum_6m",
        batch.iter().map(|t| t.performance_6m.unwrap_or(0.0)).collect(),
    );
}

/// Ratio/rate columns take 0; every other column takes its own median within the batch.
fn fill_missing_values(table: &mut FeatureTable) {
    let names: Vec<String> = table.names().to_vec();
    for name in names {
        let Some(values) = table.column_mut(&name) else {
            continue;
        };
        if values.iter().all(|v| v.is_finite()) {
            continue;
        }

        let fill = if is_zero_filled(&name) {
            0.0
        } else {
            let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
            if finite.is_empty() {
                continue;
            }
            Data::new(finite).median()
        };

        for v in values.iter_mut().filter(|v| !v.is_finite()) {
            *v = fill;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    fn buy(ticker: &str, insider: &str, title: &str, qty: f64, price: f64) -> TradeRecord {
        TradeRecord {
            title: Some(title.to_string()),
            qty: Some(qty),
            price: Some(price),
            trade_date: NaiveDate::from_ymd_opt(2024, 3, 11),
            filing_date: NaiveDate::from_ymd_opt(2024, 3, 13).and_then(|d| d.and_hms_opt(16, 30, 0)),
            ..TradeRecord::new(ticker, insider, TradeType::Buy)
        }
    }

    #[test]
    fn test_empty_batch_gives_empty_table() {
        let table = FeatureEngineer::new().transform(&[], now());
        assert!(table.is_empty());
        assert!(table.names().is_empty());
    }

    #[test]
    fn test_trade_level_features() {
        let mut trade = buy("ACME", "Jane Roe", "Pres, CEO", 1_000.0, 50.0);
        trade.owned = Some(10_000.0);
        trade.delta_own = Some(1_000.0);
        trade.trade_flag = Some("DM".to_string());

        let table = FeatureEngineer::new().transform(&[trade], now());

        assert_eq!(table.value(0, "trade_value_usd"), Some(50_000.0));
        let log = table.value(0, "log_trade_value").unwrap();
        assert!((log - 50_001f64.ln()).abs() < 1e-12);
        assert_eq!(table.value(0, "delta_own_ratio"), Some(0.1));
        assert_eq!(table.value(0, "is_buy"), Some(1.0));
        assert_eq!(table.value(0, "is_sell"), Some(0.0));
        assert_eq!(table.value(0, "flag_D"), Some(1.0));
        assert_eq!(table.value(0, "flag_M"), Some(1.0));
        assert_eq!(table.value(0, "flag_S"), Some(0.0));
        assert_eq!(table.value(0, "is_ceo"), Some(1.0));
        assert_eq!(table.value(0, "is_cfo"), Some(0.0));
    }

    #[test]
    fn test_negative_notional_log_is_median_filled() {
        let batch = vec![
            buy("ACME", "A", "Director", 100.0, 1.0),
            buy("ACME", "A", "Director", 300.0, 1.0),
            buy("ZZZ", "B", "Director", -10.0, 1.0),
        ];
        let table = FeatureEngineer::new().transform(&batch, now());

        assert_eq!(table.value(2, "trade_value_usd"), Some(-10.0));
        let expected = (101f64.ln() + 301f64.ln()) / 2.0;
        let filled = table.value(2, "log_trade_value").unwrap();
        assert!((filled - expected).abs() < 1e-12);
    }

    #[test]
    fn test_zero_ownership_gives_zero_ratio() {
        let mut trade = buy("ACME", "Jane Roe", "Director", 10.0, 1.0);
        trade.owned = Some(0.0);
        trade.delta_own = Some(10.0);
        let table = FeatureEngineer::new().transform(&[trade], now());
        assert_eq!(table.value(0, "delta_own_ratio"), Some(0.0));
    }

    #[test]
    fn test_calendar_features() {
        let table = FeatureEngineer::new().transform(&[buy("ACME", "A", "CFO", 1.0, 1.0)], now());

        // 2024-03-11 is a Monday
        assert_eq!(table.value(0, "trade_day_of_week"), Some(0.0));
        assert_eq!(table.value(0, "trade_month"), Some(3.0));
        assert_eq!(table.value(0, "trade_quarter"), Some(1.0));
        assert_eq!(table.value(0, "trade_year"), Some(2024.0));
        assert_eq!(table.value(0, "filing_delay_days"), Some(2.0));
        assert_eq!(table.value(0, "days_since_trade"), Some(4.0));
    }

    #[test]
    fn test_aggregates_cover_only_the_batch() {
        let mut first = buy("ACME", "Jane Roe", "Director", 100.0, 10.0);
        first.performance_1m = Some(0.10);
        let mut second = buy("ACME", "Jane Roe", "Director", 300.0, 10.0);
        second.trade_type = TradeType::Sell;
        second.performance_1m = Some(-0.02);
        let other = buy("ZZZ", "John Doe", "CFO", 50.0, 2.0);

        let engineer = FeatureEngineer::new();
        let table = engineer.transform(&[first.clone(), second, other], now());

        assert_eq!(table.value(0, "insider_trade_value_usd_count"), Some(2.0));
        assert_eq!(table.value(0, "insider_trade_value_usd_sum"), Some(4_000.0));
        assert_eq!(table.value(0, "insider_trade_value_usd_mean"), Some(2_000.0));
        assert_eq!(table.value(1, "insider_buy_ratio"), Some(0.5));
        assert_eq!(table.value(0, "insider_success_rate_1m"), Some(1.0));
        assert_eq!(table.value(0, "company_buy_ratio"), Some(0.5));
        assert_eq!(table.value(2, "company_trade_value_usd_count"), Some(1.0));

        // The same trade scored alone sees a different insider history.
        let alone = engineer.transform(&[first], now());
        assert_eq!(alone.value(0, "insider_trade_value_usd_count"), Some(1.0));
    }

    #[test]
    fn test_single_row_std_is_median_filled() {
        let batch = vec![
            buy("ACME", "A", "Director", 100.0, 1.0),
            buy("ACME", "A", "Director", 300.0, 1.0),
            buy("ZZZ", "B", "Director", 50.0, 1.0),
        ];
        let table = FeatureEngineer::new().transform(&batch, now());

        // Insider A: sample std of [100, 300]; insider B has one row and takes the column median.
        let std_a = table.value(0, "insider_trade_value_usd_std").unwrap();
        assert!((std_a - 141.4214).abs() < 1e-4);
        assert_eq!(table.value(2, "insider_trade_value_usd_std"), Some(std_a));
        assert_eq!(table.value(2, "price_volatility"), Some(0.0));
    }

    #[test]
    fn test_missing_dates_use_median_and_ratios_use_zero() {
        let mut undated = buy("ACME", "A", "Director", 1.0, 1.0);
        undated.trade_date = None;
        let mut with_performance = buy("ACME", "A", "Director", 1.0, 1.0);
        with_performance.performance_1m = Some(0.01);
        with_performance.performance_6m = Some(0.02);
        let batch = vec![
            with_performance,
            buy("ACME", "B", "Director", 1.0, 1.0),
            undated,
        ];
        let table = FeatureEngineer::new().transform(&batch, now());

        assert_eq!(table.value(2, "trade_month"), Some(3.0));
        assert_eq!(table.value(2, "filing_delay_days"), Some(0.0));
        for name in table.names() {
            assert!(
                table.column(name).unwrap().iter().all(|v| v.is_finite()),
                "{name} still has gaps"
            );
        }
    }

    #[test]
    fn test_labels_use_horizon_and_threshold() {
        let with_perf = |p: Option<f64>| TradeRecord {
            performance_1m: p,
            performance_6m: Some(0.50),
            ..TradeRecord::new("ACME", "A", TradeType::Buy)
        };
        let batch = vec![with_perf(Some(0.06)), with_perf(Some(0.04)), with_perf(None)];
        let engineer = FeatureEngineer::new();

        assert_eq!(engineer.label_for(&batch, 20, 5.0), vec![1, 0, 0]);
        // Six-month horizon reads the 6m field instead.
        assert_eq!(engineer.label_for(&batch, 90, 5.0), vec![1, 1, 1]);
    }

    #[test]
    fn test_all_canonical_features_are_produced() {
        let table = FeatureEngineer::new().transform(&[buy("ACME", "A", "CEO", 1.0, 1.0)], now());
        for name in FEATURE_NAMES {
            assert!(table.has_column(name), "missing {name}");
        }
    }

    #[test]
    fn test_transform_is_deterministic() {
        let batch = vec![
            buy("ACME", "A", "CEO", 10.0, 1.0),
            buy("ZZZ", "B", "CFO", 20.0, 3.0),
        ];
        let engineer = FeatureEngineer::new();
        let names = FeatureEngineer::feature_names();
        let first = engineer.transform(&batch, now()).matrix(&names);
        let second = engineer.transform(&batch, now()).matrix(&names);
        assert_eq!(first, second);
    }
}
