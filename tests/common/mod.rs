#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use insidex::domain::trade::{TradeRecord, TradeType};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fresh, not yet created directory under the system temp dir.
pub fn temp_dir(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "insidex_{}_{}_{}_{}",
        label,
        std::process::id(),
        nanos,
        id
    ))
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// A buy `days_ago` days before `now()`, filed two days after the trade.
pub fn buy(ticker: &str, insider: &str, title: &str, notional: f64, days_ago: i64) -> TradeRecord {
    let trade_date = now().date_naive() - Duration::days(days_ago);
    TradeRecord {
        title: Some(title.to_string()),
        price: Some(25.0),
        qty: Some(notional / 25.0),
        trade_date: Some(trade_date),
        filing_date: (trade_date + Duration::days(2)).and_hms_opt(18, 0, 0),
        trade_flag: Some("M".to_string()),
        owned: Some(100_000.0),
        delta_own: Some(notional / 25.0),
        ..TradeRecord::new(ticker, insider, TradeType::Buy)
    }
}

pub fn sell(ticker: &str, insider: &str, notional: f64, days_ago: i64) -> TradeRecord {
    TradeRecord {
        trade_type: TradeType::Sell,
        ..buy(ticker, insider, "Director", notional, days_ago)
    }
}

/// Two years of history where large officer buys outperform small director buys.
pub fn history(n: usize) -> Vec<TradeRecord> {
    let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
    (0..n)
        .map(|i| {
            let winner = i % 3 == 0;
            let trade_date = start + Duration::days(i as i64);
            let trade_type = if i % 7 == 6 { TradeType::Sell } else { TradeType::Buy };
            TradeRecord {
                title: Some(if winner { "CEO" } else { "Director" }.to_string()),
                trade_flag: Some(["D", "M", "A", "S"][i % 4].to_string()),
                price: Some(20.0 + (i % 11) as f64),
                qty: Some(if winner { 50_000.0 } else { 500.0 + (i % 13) as f64 * 50.0 }),
                owned: Some(250_000.0),
                delta_own: Some(5_000.0),
                trade_date: Some(trade_date),
                filing_date: (trade_date + Duration::days(1 + (i % 3) as i64)).and_hms_opt(17, 0, 0),
                performance_1m: Some(if winner { 0.09 } else { -0.03 + (i % 5) as f64 * 0.005 }),
                performance_6m: Some(if winner { 0.15 } else { -0.05 }),
                ..TradeRecord::new(
                    ["ACME", "BOLT", "CRUX", "DYNA", "EDGE"][i % 5],
                    &format!("Insider {}", i % 17),
                    trade_type,
                )
            }
        })
        .collect()
}
