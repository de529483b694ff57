use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use insidex::application::signals::SignalService;
use insidex::config::Config;
use insidex::infrastructure::{ArtifactStore, Database, SqliteTradeStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::prelude::*;

/// Score recent insider buys and print ranked signals as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Trade database URL (defaults to DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    /// Artifact directory (defaults to ML_ARTIFACTS_DIR)
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,

    /// Lookback window in days
    #[arg(long)]
    window_days: Option<u32>,

    /// Maximum number of signals
    #[arg(long)]
    limit: Option<usize>,

    /// Score a single ticker instead of the whole market
    #[arg(long)]
    ticker: Option<String>,

    /// Print the loaded model's diagnostics and exit
    #[arg(long)]
    model_info: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays valid JSON.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let artifacts = ArtifactStore::new(args.artifacts_dir.unwrap_or(config.artifacts_dir));
    let url = args.database_url.unwrap_or(config.database_url);
    let db = Database::new(&url).await?;
    let store = Arc::new(SqliteTradeStore::new(db.pool));
    let service = SignalService::new(store, artifacts, config.scoring.clone());

    let now = Utc::now();
    let output = if args.model_info {
        serde_json::to_string_pretty(&service.model_info())?
    } else if let Some(ticker) = &args.ticker {
        let lookback = args.window_days.unwrap_or(config.scoring.ticker_lookback_days);
        let mut signals = service.score_for_ticker(ticker, lookback, now).await?;
        if let Some(limit) = args.limit {
            signals.truncate(limit);
        }
        serde_json::to_string_pretty(&signals)?
    } else {
        let window = args.window_days.unwrap_or(config.scoring.window_days);
        let limit = args.limit.unwrap_or(config.scoring.limit);
        let batch = service.generate_signals(window, limit, now).await?;
        serde_json::to_string_pretty(&batch)?
    };

    println!("{}", output);
    Ok(())
}
