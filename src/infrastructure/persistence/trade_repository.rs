use crate::domain::repositories::{TradeQuery, TradeStore};
use crate::domain::trade::{TradeRecord, TradeType, parse_filing_date, parse_trade_date};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::{debug, info};

// Integer columns are cast so every numeric field decodes as f64.
const SELECT_TRADES: &str = r#"
    SELECT trade_flag, filing_date, trade_date, ticker, company_name, insider_name, title,
           trade_type, price, CAST(qty AS REAL) AS qty, CAST(owned AS REAL) AS owned,
           CAST(delta_own AS REAL) AS delta_own, value,
           performance_1d, performance_1w, performance_1m, performance_6m
    FROM insider_trades
    WHERE 1=1"#;

const FILING_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TRADE_DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteTradeStore {
    pool: SqlitePool,
}

impl SqliteTradeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts `trades`, silently skipping exact duplicates. Returns the number of new rows.
    pub async fn insert_trades(&self, trades: &[TradeRecord]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for trade in trades {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO insider_trades
                (trade_flag, filing_date, trade_date, ticker, company_name, insider_name, title,
                 trade_type, price, qty, owned, delta_own, value,
                 performance_1d, performance_1w, performance_1m, performance_6m)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&trade.trade_flag)
            .bind(trade.filing_date.map(|d| d.format(FILING_DATE_FORMAT).to_string()))
            .bind(trade.trade_date.map(|d| d.format(TRADE_DATE_FORMAT).to_string()))
            .bind(&trade.ticker)
            .bind(&trade.company_name)
            .bind(&trade.insider_name)
            .bind(&trade.title)
            .bind(trade.trade_type.as_str())
            .bind(trade.price)
            .bind(trade.qty)
            .bind(trade.owned)
            .bind(trade.delta_own)
            .bind(trade.value)
            .bind(trade.performance_1d)
            .bind(trade.performance_1w)
            .bind(trade.performance_1m)
            .bind(trade.performance_6m)
            .execute(&mut *tx)
            .await
            .context("Failed to insert insider trade")?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        info!(
            "Inserted {} new trades ({} duplicates skipped)",
            inserted,
            trades.len() as u64 - inserted
        );
        Ok(inserted)
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM insider_trades")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}

fn map_row(row: &SqliteRow) -> Result<TradeRecord> {
    let trade_type: Option<String> = row.try_get("trade_type")?;
    let filing_date: Option<String> = row.try_get("filing_date")?;
    let trade_date: Option<String> = row.try_get("trade_date")?;
    let ticker: Option<String> = row.try_get("ticker")?;
    let insider_name: Option<String> = row.try_get("insider_name")?;

    Ok(TradeRecord {
        ticker: ticker.unwrap_or_default(),
        company_name: row.try_get("company_name")?,
        insider_name: insider_name.unwrap_or_default(),
        title: row.try_get("title")?,
        trade_type: trade_type
            .as_deref()
            .unwrap_or_default()
            .parse()
            .unwrap_or(TradeType::Other),
        trade_flag: row.try_get("trade_flag")?,
        price: row.try_get("price")?,
        qty: row.try_get("qty")?,
        value: row.try_get("value")?,
        filing_date: filing_date.as_deref().and_then(parse_filing_date),
        trade_date: trade_date.as_deref().and_then(parse_trade_date),
        owned: row.try_get("owned")?,
        delta_own: row.try_get("delta_own")?,
        performance_1d: row.try_get("performance_1d")?,
        performance_1w: row.try_get("performance_1w")?,
        performance_1m: row.try_get("performance_1m")?,
        performance_6m: row.try_get("performance_6m")?,
    })
}

#[async_trait]
impl TradeStore for SqliteTradeStore {
    async fn query_trades(&self, query: &TradeQuery) -> Result<Vec<TradeRecord>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_TRADES);

        if let Some(ticker) = &query.ticker {
            builder.push(" AND ticker = ").push_bind(ticker.clone());
        }
        if let Some(name) = &query.insider_name {
            builder
                .push(" AND insider_name LIKE ")
                .push_bind(format!("%{}%", name));
        }
        if let Some(trade_type) = query.trade_type {
            builder
                .push(" AND trade_type = ")
                .push_bind(trade_type.as_str());
        }
        if let Some(flag) = &query.trade_flag {
            builder.push(" AND trade_flag = ").push_bind(flag.clone());
        }
        if let Some(start) = query.start_date {
            builder
                .push(" AND trade_date >= ")
                .push_bind(start.format(TRADE_DATE_FORMAT).to_string());
        }
        if let Some(end) = query.end_date {
            builder
                .push(" AND trade_date <= ")
                .push_bind(end.format(TRADE_DATE_FORMAT).to_string());
        }
        builder.push(" ORDER BY trade_date DESC");
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to query insider trades")?;
        debug!("Trade query {:?} returned {} rows", query, rows.len());

        rows.iter().map(map_row).collect()
    }

    async fn load_training_trades(&self, limit: Option<usize>) -> Result<Vec<TradeRecord>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_TRADES);
        builder.push(
            " AND trade_date IS NOT NULL AND ticker IS NOT NULL AND ticker != ''
              AND trade_type IN ('Buy', 'Sell')
              ORDER BY trade_date DESC",
        );
        if let Some(limit) = limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to load training trades")?;

        rows.iter().map(map_row).collect()
    }
}
