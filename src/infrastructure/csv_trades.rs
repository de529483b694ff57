use crate::domain::repositories::{TradeQuery, TradeStore};
use crate::domain::trade::{TradeRecord, TradeType, parse_filing_date, parse_trade_date};
use crate::infrastructure::repositories::InMemoryTradeStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{info, warn};

/// One row of an `insider_trades` export. Dates stay textual until parsed.
#[derive(Debug, Deserialize)]
struct CsvTradeRow {
    #[serde(default)]
    trade_flag: Option<String>,
    #[serde(default)]
    filing_date: Option<String>,
    #[serde(default)]
    trade_date: Option<String>,
    #[serde(default)]
    ticker: Option<String>,
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    insider_name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    trade_type: Option<String>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    qty: Option<f64>,
    #[serde(default)]
    owned: Option<f64>,
    #[serde(default)]
    delta_own: Option<f64>,
    #[serde(default)]
    value: Option<f64>,
    #[serde(default)]
    performance_1d: Option<f64>,
    #[serde(default)]
    performance_1w: Option<f64>,
    #[serde(default)]
    performance_1m: Option<f64>,
    #[serde(default)]
    performance_6m: Option<f64>,
}

impl From<CsvTradeRow> for TradeRecord {
    fn from(row: CsvTradeRow) -> Self {
        let non_empty = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
        TradeRecord {
            ticker: row.ticker.unwrap_or_default().trim().to_string(),
            company_name: non_empty(row.company_name),
            insider_name: row.insider_name.unwrap_or_default().trim().to_string(),
            title: non_empty(row.title),
            trade_type: row
                .trade_type
                .as_deref()
                .unwrap_or_default()
                .parse()
                .unwrap_or(TradeType::Other),
            trade_flag: non_empty(row.trade_flag),
            price: row.price,
            qty: row.qty,
            value: row.value,
            filing_date: row.filing_date.as_deref().and_then(parse_filing_date),
            trade_date: row.trade_date.as_deref().and_then(parse_trade_date),
            owned: row.owned,
            delta_own: row.delta_own,
            performance_1d: row.performance_1d,
            performance_1w: row.performance_1w,
            performance_1m: row.performance_1m,
            performance_6m: row.performance_6m,
        }
    }
}

/// Trades loaded from a CSV export of the trade table, served from memory.
#[derive(Clone)]
pub struct CsvTradeStore {
    inner: InMemoryTradeStore,
}

impl CsvTradeStore {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let store = Self::from_reader(BufReader::new(file))?;
        info!("Loaded trades from {:?}", path);
        Ok(store)
    }

    /// Malformed rows are skipped with a warning.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut trades = Vec::new();
        let mut skipped = 0usize;

        for (line, result) in rdr.deserialize::<CsvTradeRow>().enumerate() {
            match result {
                Ok(row) => trades.push(TradeRecord::from(row)),
                Err(e) => {
                    skipped += 1;
                    warn!("Skipping CSV row {}: {}", line + 2, e);
                }
            }
        }

        info!("Parsed {} trades ({} rows skipped)", trades.len(), skipped);
        Ok(Self {
            inner: InMemoryTradeStore::new(trades),
        })
    }
}

#[async_trait]
impl TradeStore for CsvTradeStore {
    async fn query_trades(&self, query: &TradeQuery) -> Result<Vec<TradeRecord>> {
        self.inner.query_trades(query).await
    }

    async fn load_training_trades(&self, limit: Option<usize>) -> Result<Vec<TradeRecord>> {
        self.inner.load_training_trades(limit).await
    }
}
