//! Offline training: historical trades in, versioned artifact bundle out.
//!
//! A run either publishes a complete bundle or writes nothing. Aborts (empty feature
//! table, single-class labels, degenerate split) leave the previous latest bundle in place.

use super::classifier::FittedModel;
use super::feature_engineer::FeatureEngineer;
use super::metrics;
use crate::domain::errors::TrainingError;
use crate::domain::ml::artifact::{ModelKind, ModelMetadata, ModelMetrics};
use crate::domain::ml::feature_registry::canonical_subset;
use crate::domain::repositories::TradeStore;
use crate::domain::trade::TradeRecord;
use crate::infrastructure::artifact_store::{ArtifactStore, TIMESTAMP_FORMAT};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

/// Below this many rows the evaluation is too noisy to trust.
const MIN_RELIABLE_ROWS: usize = 100;
const TOP_IMPORTANCES_LOGGED: usize = 10;

/// How the held-out set is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    /// Newest rows by trade date are held out.
    Temporal,
    /// Seeded random split preserving the class ratio.
    Stratified,
}

impl fmt::Display for SplitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitStrategy::Temporal => write!(f, "temporal"),
            SplitStrategy::Stratified => write!(f, "stratified"),
        }
    }
}

impl FromStr for SplitStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "temporal" => Ok(SplitStrategy::Temporal),
            "stratified" => Ok(SplitStrategy::Stratified),
            other => Err(format!(
                "Unknown split strategy '{}'. Must be 'temporal' or 'stratified'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainingOptions {
    pub model_kind: ModelKind,
    pub horizon_days: u32,
    pub threshold_pct: f64,
    pub test_fraction: f64,
    pub seed: u64,
    pub split: SplitStrategy,
    pub limit: Option<usize>,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            model_kind: ModelKind::RandomForest,
            horizon_days: 20,
            threshold_pct: 5.0,
            test_fraction: 0.2,
            seed: 42,
            split: SplitStrategy::Temporal,
            limit: None,
        }
    }
}

/// Labelled design matrix in `feature_names` column order.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub x: Vec<Vec<f64>>,
    pub y: Vec<u8>,
    pub feature_names: Vec<String>,
    pub trade_dates: Vec<Option<NaiveDate>>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.y.iter().filter(|&&v| v == 1).count()
    }
}

#[derive(Debug, Clone)]
pub struct SplitData {
    pub x_train: Vec<Vec<f64>>,
    pub y_train: Vec<u8>,
    pub x_test: Vec<Vec<f64>>,
    pub y_test: Vec<u8>,
}

impl SplitData {
    fn from_indices(set: &TrainingSet, train: &[usize], test: &[usize]) -> Result<Self, TrainingError> {
        if train.is_empty() || test.is_empty() {
            return Err(TrainingError::EmptySplit {
                reason: format!("{} train rows, {} test rows", train.len(), test.len()),
            });
        }
        let pick_x = |idx: &[usize]| idx.iter().map(|&i| set.x[i].clone()).collect();
        let pick_y = |idx: &[usize]| idx.iter().map(|&i| set.y[i]).collect();
        Ok(Self {
            x_train: pick_x(train),
            y_train: pick_y(train),
            x_test: pick_x(test),
            y_test: pick_y(test),
        })
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub metadata: ModelMetadata,
    pub feature_importance: Vec<(String, f64)>,
    pub train_rows: usize,
    pub test_rows: usize,
    pub published: Vec<PathBuf>,
}

pub struct ModelTrainer {
    engineer: FeatureEngineer,
    artifacts: ArtifactStore,
    model: Option<FittedModel>,
    feature_names: Vec<String>,
    metrics: Option<ModelMetrics>,
}

impl ModelTrainer {
    pub fn new(artifacts: ArtifactStore) -> Self {
        Self {
            engineer: FeatureEngineer::new(),
            artifacts,
            model: None,
            feature_names: Vec::new(),
            metrics: None,
        }
    }

    /// Declared feature set from the last `prepare` call.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn metrics(&self) -> Option<&ModelMetrics> {
        self.metrics.as_ref()
    }

    /// Historical trades eligible for training, newest first.
    pub async fn load_training_set(
        &self,
        store: &dyn TradeStore,
        limit: Option<usize>,
    ) -> Result<Vec<TradeRecord>> {
        let trades = store.load_training_trades(limit).await?;
        info!("Loaded {} historical trades for training", trades.len());
        Ok(trades)
    }

    /// Transforms `data` over the whole training corpus and labels each row.
    /// The declared feature set is the canonical names present in the table.
    pub fn prepare(
        &mut self,
        data: &[TradeRecord],
        horizon_days: u32,
        threshold_pct: f64,
        now: DateTime<Utc>,
    ) -> Result<TrainingSet, TrainingError> {
        // Group aggregates span the whole training corpus.
        let table = self.engineer.transform(data, now);
        if table.is_empty() {
            return Err(TrainingError::EmptyFeatureTable);
        }

        let feature_names = canonical_subset(table.names().iter().map(String::as_str));
        if feature_names.is_empty() {
            return Err(TrainingError::EmptyFeatureTable);
        }

        let set = TrainingSet {
            x: table.matrix(&feature_names),
            y: self.engineer.label_for(data, horizon_days, threshold_pct),
            feature_names: feature_names.clone(),
            trade_dates: data.iter().map(|t| t.trade_date).collect(),
        };
        self.feature_names = feature_names;

        info!(
            "Prepared {} rows x {} features ({} positive, {:.1}% positive rate)",
            set.len(),
            set.feature_names.len(),
            set.positives(),
            100.0 * set.positives() as f64 / set.len() as f64
        );
        Ok(set)
    }

    /// Seeded random split, stratified by label when both classes are present.
    ///
    /// Rows are time-ordered, so a random split lets the model see trades that happened
    /// after some of its test rows. Prefer `split_temporal` unless comparing against
    /// older runs.
    pub fn split(
        &self,
        set: &TrainingSet,
        test_fraction: f64,
        seed: u64,
    ) -> Result<SplitData, TrainingError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let positives: Vec<usize> = (0..set.len()).filter(|&i| set.y[i] == 1).collect();
        let negatives: Vec<usize> = (0..set.len()).filter(|&i| set.y[i] == 0).collect();

        let mut train = Vec::new();
        let mut test = Vec::new();
        if positives.is_empty() || negatives.is_empty() {
            let mut all: Vec<usize> = (0..set.len()).collect();
            all.shuffle(&mut rng);
            let n_test = ((test_fraction * all.len() as f64).ceil() as usize)
                .min(all.len().saturating_sub(1));
            test.extend_from_slice(&all[..n_test]);
            train.extend_from_slice(&all[n_test..]);
        } else {
            for mut class in [negatives, positives] {
                class.shuffle(&mut rng);
                // Keep at least one training row of each class.
                let n_test = ((test_fraction * class.len() as f64).round() as usize)
                    .min(class.len() - 1);
                test.extend_from_slice(&class[..n_test]);
                train.extend_from_slice(&class[n_test..]);
            }
        }
        train.sort_unstable();
        test.sort_unstable();

        SplitData::from_indices(set, &train, &test)
    }

    /// Holds out the newest `test_fraction` of rows by trade date.
    pub fn split_temporal(
        &self,
        set: &TrainingSet,
        test_fraction: f64,
    ) -> Result<SplitData, TrainingError> {
        let mut order: Vec<usize> = (0..set.len()).collect();
        // Stable: rows on the same date keep their input order.
        order.sort_by_key(|&i| set.trade_dates[i]);

        let n_test = ((test_fraction * order.len() as f64).ceil() as usize).min(order.len());
        let (train, test) = order.split_at(order.len() - n_test);
        SplitData::from_indices(set, train, test)
    }

    pub fn fit(
        &mut self,
        x_train: &[Vec<f64>],
        y_train: &[u8],
        kind: ModelKind,
        seed: u64,
    ) -> Result<(), TrainingError> {
        if x_train.is_empty() {
            return Err(TrainingError::EmptyFeatureTable);
        }
        if let Some(&first) = y_train.first()
            && y_train.iter().all(|&v| v == first)
        {
            return Err(TrainingError::SingleClass { class: first });
        }

        info!("Fitting {} on {} rows", kind, x_train.len());
        self.model = Some(FittedModel::fit(kind, x_train, y_train, seed)?);
        Ok(())
    }

    pub fn evaluate(
        &mut self,
        x_test: &[Vec<f64>],
        y_test: &[u8],
    ) -> Result<ModelMetrics, TrainingError> {
        let model = self
            .model
            .as_ref()
            .ok_or(TrainingError::NotFitted { operation: "evaluate" })?;
        let probabilities = model
            .predict_proba(x_test)
            .map_err(|reason| TrainingError::Fit { reason })?;

        let metrics = metrics::evaluate(y_test, &probabilities);
        info!(
            "Evaluation: AUC={:.4} PR-AUC={:.4} accuracy={:.4} precision={:.4} recall={:.4} f1={:.4} support={}/{}",
            metrics.auc,
            metrics.pr_auc,
            metrics.accuracy,
            metrics.precision,
            metrics.recall,
            metrics.f1,
            metrics.support.negative,
            metrics.support.positive
        );
        self.metrics = Some(metrics.clone());
        Ok(metrics)
    }

    /// Publishes the fitted model as a new bundle stamped with `now`.
    pub fn persist(&self, now: DateTime<Utc>) -> Result<(ModelMetadata, Vec<PathBuf>), TrainingError> {
        let model = self
            .model
            .as_ref()
            .ok_or(TrainingError::NotFitted { operation: "persist" })?;
        let metrics = self
            .metrics
            .clone()
            .ok_or(TrainingError::NotFitted { operation: "persist" })?;

        let metadata = ModelMetadata {
            timestamp: now.format(TIMESTAMP_FORMAT).to_string(),
            model_type: model.classifier.kind(),
            feature_names: self.feature_names.clone(),
            n_features: self.feature_names.len(),
            metrics,
            scaler_used: model.scaler.is_some(),
        };
        let published =
            self.artifacts
                .publish(&model.classifier, model.scaler.as_ref(), &metadata)?;
        Ok((metadata, published))
    }

    /// (feature, importance) sorted by importance descending. Empty before `fit`.
    pub fn feature_importance(&self) -> Vec<(String, f64)> {
        let Some(model) = &self.model else {
            return Vec::new();
        };
        let importances = model.classifier.importances();
        if importances.len() != self.feature_names.len() {
            return Vec::new();
        }

        let mut ranked: Vec<(String, f64)> = self
            .feature_names
            .iter()
            .cloned()
            .zip(importances)
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    /// Full pipeline over an already loaded training set: prepare, split, fit, evaluate, publish.
    pub fn train(
        &mut self,
        data: &[TradeRecord],
        options: &TrainingOptions,
        now: DateTime<Utc>,
    ) -> Result<TrainingReport, TrainingError> {
        if data.len() < MIN_RELIABLE_ROWS {
            warn!(
                "Only {} training rows (< {}); metrics will be unreliable",
                data.len(),
                MIN_RELIABLE_ROWS
            );
        }

        let set = self.prepare(data, options.horizon_days, options.threshold_pct, now)?;
        let positives = set.positives();
        if positives == 0 || positives == set.len() {
            return Err(TrainingError::SingleClass {
                class: u8::from(positives > 0),
            });
        }

        let split = match options.split {
            SplitStrategy::Temporal => self.split_temporal(&set, options.test_fraction)?,
            SplitStrategy::Stratified => self.split(&set, options.test_fraction, options.seed)?,
        };
        info!(
            "{} split: {} train / {} test rows",
            options.split,
            split.y_train.len(),
            split.y_test.len()
        );

        self.fit(&split.x_train, &split.y_train, options.model_kind, options.seed)?;
        self.evaluate(&split.x_test, &split.y_test)?;

        let feature_importance = self.feature_importance();
        for (rank, (name, value)) in feature_importance
            .iter()
            .take(TOP_IMPORTANCES_LOGGED)
            .enumerate()
        {
            info!("  #{:<2} {:<32} {:.4}", rank + 1, name, value);
        }

        let (metadata, published) = self.persist(now)?;
        Ok(TrainingReport {
            metadata,
            feature_importance,
            train_rows: split.y_train.len(),
            test_rows: split.y_test.len(),
            published,
        })
    }

    /// Loads from `store` and trains. Store failures are errors; training aborts are
    /// returned as `TrainingError` inside the `anyhow` chain.
    pub async fn run(
        &mut self,
        store: &dyn TradeStore,
        options: &TrainingOptions,
        now: DateTime<Utc>,
    ) -> Result<TrainingReport> {
        let data = self.load_training_set(store, options.limit).await?;
        Ok(self.train(&data, options, now)?)
    }
}
