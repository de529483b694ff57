use anyhow::{Context, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

const INDEXES: &[(&str, &str)] = &[
    ("idx_ticker", "ticker"),
    ("idx_filing_date", "filing_date"),
    ("idx_trade_date", "trade_date"),
    ("idx_insider_name", "insider_name"),
    ("idx_trade_type", "trade_type"),
    ("idx_trade_flag", "trade_flag"),
];

/// Shared SQLite pool holding the `insider_trades` table
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        // Ensure the directory exists if it's a file path
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal); // Better for concurrency

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Connected to database: {}", db_url);

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// Private in-memory database. A single connection keeps every query on the same data.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to open in-memory SQLite database")?;

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        // Rows are de-duplicated on the full filing content, so re-ingesting a scrape is a no-op.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS insider_trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                trade_flag TEXT,
                filing_date TEXT,
                trade_date TEXT,
                ticker TEXT,
                company_name TEXT,
                insider_name TEXT,
                title TEXT,
                trade_type TEXT,
                price REAL,
                qty INTEGER,
                owned INTEGER,
                delta_own INTEGER,
                value REAL,
                performance_1d REAL,
                performance_1w REAL,
                performance_1m REAL,
                performance_6m REAL,
                scraped_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(trade_flag, filing_date, trade_date, ticker, company_name, insider_name,
                       title, trade_type, price, qty, owned, delta_own, value,
                       performance_1d, performance_1w, performance_1m, performance_6m)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create insider_trades table")?;

        for (name, column) in INDEXES {
            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS {} ON insider_trades ({})",
                name, column
            ))
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to create index {}", name))?;
        }

        info!("Database schema initialized.");
        Ok(())
    }
}
