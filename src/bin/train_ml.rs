use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use insidex::application::ml::{ModelTrainer, SplitStrategy};
use insidex::config::Config;
use insidex::domain::ml::artifact::ModelKind;
use insidex::domain::repositories::TradeStore;
use insidex::infrastructure::{ArtifactStore, CsvTradeStore, Database, SqliteTradeStore};
use std::path::PathBuf;
use tracing::{Level, error, info};
use tracing_subscriber::prelude::*;

/// Train the insider-signal classifier and publish a new artifact bundle.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Trade database URL (defaults to DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    /// Train from a CSV export instead of the database
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Artifact directory (defaults to ML_ARTIFACTS_DIR)
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,

    /// random_forest or logistic_regression
    #[arg(long)]
    model_type: Option<ModelKind>,

    /// Label horizon in days (<= 30 uses 1-month performance, else 6-month)
    #[arg(long)]
    horizon_days: Option<u32>,

    /// Label threshold in percent
    #[arg(long)]
    threshold_pct: Option<f64>,

    /// Maximum number of (most recent) trades to train on
    #[arg(long)]
    limit: Option<usize>,

    /// Seed for the split and importance shuffles
    #[arg(long)]
    seed: Option<u64>,

    /// Held-out share of rows
    #[arg(long)]
    test_fraction: Option<f64>,

    /// temporal or stratified
    #[arg(long)]
    split: Option<SplitStrategy>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let mut options = config.training.options();
    if let Some(kind) = args.model_type {
        options.model_kind = kind;
    }
    if let Some(days) = args.horizon_days {
        options.horizon_days = days;
    }
    if let Some(pct) = args.threshold_pct {
        options.threshold_pct = pct;
    }
    if let Some(limit) = args.limit {
        options.limit = Some(limit);
    }
    if let Some(seed) = args.seed {
        options.seed = seed;
    }
    if let Some(fraction) = args.test_fraction {
        options.test_fraction = fraction;
    }
    if let Some(split) = args.split {
        options.split = split;
    }

    let store: Box<dyn TradeStore> = match &args.csv {
        Some(path) => Box::new(CsvTradeStore::from_path(path)?),
        None => {
            let url = args.database_url.unwrap_or(config.database_url);
            let db = Database::new(&url).await?;
            Box::new(SqliteTradeStore::new(db.pool))
        }
    };

    let artifacts_dir = args.artifacts_dir.unwrap_or(config.artifacts_dir);
    info!(
        "Training {} (horizon {}d, threshold {}%, {} split) into {:?}",
        options.model_kind, options.horizon_days, options.threshold_pct, options.split, artifacts_dir
    );

    let mut trainer = ModelTrainer::new(ArtifactStore::new(artifacts_dir));
    match trainer.run(store.as_ref(), &options, Utc::now()).await {
        Ok(report) => {
            info!(
                "Published model {} ({} train / {} test rows, AUC {:.4})",
                report.metadata.timestamp,
                report.train_rows,
                report.test_rows,
                report.metadata.metrics.auc
            );
            for path in &report.published {
                info!("  wrote {:?}", path);
            }
        }
        // Training aborts are reported, not fatal: the previous latest bundle stays in place.
        Err(e) => error!("Training aborted, no artifact written: {:#}", e),
    }

    Ok(())
}
