//! Repository abstraction for insider trade records.
//!
//! The scoring pipeline only reads trades. Ingestion (scraping, de-duplication,
//! inserts) belongs to the storage implementations in `infrastructure`.
//!
//! # Example
//!
//! ```rust,no_run
//! use insidex::domain::repositories::{TradeQuery, TradeStore};
//! use insidex::infrastructure::InMemoryTradeStore;
//!
//! # async {
//! let store = InMemoryTradeStore::new(Vec::new());
//! let recent = store.query_trades(&TradeQuery::new().ticker("ACME").limit(100)).await;
//! # };
//! ```

use crate::domain::trade::{TradeRecord, TradeType};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Filters for `TradeStore::query_trades`. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeQuery {
    pub ticker: Option<String>,
    /// Substring match on the insider name.
    pub insider_name: Option<String>,
    pub trade_type: Option<TradeType>,
    pub trade_flag: Option<String>,
    /// Inclusive lower bound on trade date.
    pub start_date: Option<NaiveDate>,
    /// Inclusive upper bound on trade date.
    pub end_date: Option<NaiveDate>,
    pub limit: Option<usize>,
}

impl TradeQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticker(mut self, ticker: &str) -> Self {
        self.ticker = Some(ticker.to_string());
        self
    }

    pub fn insider_name(mut self, name: &str) -> Self {
        self.insider_name = Some(name.to_string());
        self
    }

    pub fn trade_type(mut self, trade_type: TradeType) -> Self {
        self.trade_type = Some(trade_type);
        self
    }

    pub fn trade_flag(mut self, flag: &str) -> Self {
        self.trade_flag = Some(flag.to_string());
        self
    }

    pub fn start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    pub fn end_date(mut self, date: NaiveDate) -> Self {
        self.end_date = Some(date);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// In-memory evaluation of the filter, used by stores without a query engine.
    pub fn matches(&self, trade: &TradeRecord) -> bool {
        if let Some(ticker) = &self.ticker
            && &trade.ticker != ticker
        {
            return false;
        }
        if let Some(name) = &self.insider_name
            && !trade.insider_name.contains(name.as_str())
        {
            return false;
        }
        if let Some(trade_type) = self.trade_type
            && trade.trade_type != trade_type
        {
            return false;
        }
        if let Some(flag) = &self.trade_flag
            && trade.trade_flag.as_deref() != Some(flag.as_str())
        {
            return false;
        }
        if self.start_date.is_some() || self.end_date.is_some() {
            let Some(date) = trade.trade_date else {
                return false;
            };
            if self.start_date.is_some_and(|start| date < start) {
                return false;
            }
            if self.end_date.is_some_and(|end| date > end) {
                return false;
            }
        }
        true
    }
}

/// Read access to stored insider trades.
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Trades matching `query`, newest trade date first.
    async fn query_trades(&self, query: &TradeQuery) -> Result<Vec<TradeRecord>>;

    /// Historical trades usable for training: trade date and ticker present,
    /// trade type Buy or Sell, newest first, optionally capped.
    async fn load_training_trades(&self, limit: Option<usize>) -> Result<Vec<TradeRecord>>;
}

/// Newest-first ordering shared by the in-memory stores. Undated rows sort last.
pub fn sort_newest_first(trades: &mut [TradeRecord]) {
    trades.sort_by(|a, b| b.trade_date.cmp(&a.trade_date));
}

/// Training eligibility shared by the in-memory stores.
pub fn is_training_eligible(trade: &TradeRecord) -> bool {
    trade.trade_date.is_some()
        && !trade.ticker.trim().is_empty()
        && matches!(trade.trade_type, TradeType::Buy | TradeType::Sell)
}
