//! In-Memory Trade Store
//!
//! Thread-safe, in-memory implementation of `domain::repositories::TradeStore`.
//!
//! # Features
//!
//! - **Thread-safe**: Uses `Arc<RwLock>` for concurrent access
//! - **Testing**: Ideal for unit tests and development
//! - **Offline training**: Backs the CSV loader
//!
//! # Limitations
//!
//! - Data is lost on application restart
//! - Limited by available RAM

use crate::domain::repositories::{
    TradeQuery, TradeStore, is_training_eligible, sort_newest_first,
};
use crate::domain::trade::TradeRecord;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct InMemoryTradeStore {
    trades: Arc<RwLock<Vec<TradeRecord>>>,
}

impl InMemoryTradeStore {
    pub fn new(trades: Vec<TradeRecord>) -> Self {
        Self {
            trades: Arc::new(RwLock::new(trades)),
        }
    }

    pub async fn push(&self, trade: TradeRecord) {
        self.trades.write().await.push(trade);
    }

    pub async fn len(&self) -> usize {
        self.trades.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.trades.read().await.is_empty()
    }
}

#[async_trait]
impl TradeStore for InMemoryTradeStore {
    async fn query_trades(&self, query: &TradeQuery) -> Result<Vec<TradeRecord>> {
        let mut matched: Vec<TradeRecord> = self
            .trades
            .read()
            .await
            .iter()
            .filter(|t| query.matches(t))
            .cloned()
            .collect();
        sort_newest_first(&mut matched);
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn load_training_trades(&self, limit: Option<usize>) -> Result<Vec<TradeRecord>> {
        let mut eligible: Vec<TradeRecord> = self
            .trades
            .read()
            .await
            .iter()
            .filter(|t| is_training_eligible(t))
            .cloned()
            .collect();
        sort_newest_first(&mut eligible);
        if let Some(limit) = limit {
            eligible.truncate(limit);
        }
        Ok(eligible)
    }
}
