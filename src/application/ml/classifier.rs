use crate::domain::errors::TrainingError;
use crate::domain::ml::artifact::ModelKind;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use statrs::statistics::Statistics;
use tracing::debug;

pub type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Tree ensemble hyperparameters. Fixed so retraining on the same data is reproducible.
const N_TREES: usize = 100;
/// The trees are grown in this many independently seeded shards, in parallel.
const FOREST_SHARDS: usize = 4;
const MAX_DEPTH: u16 = 10;
const MIN_SAMPLES_SPLIT: usize = 5;
const MIN_SAMPLES_LEAF: usize = 2;

/// Rows used when measuring permutation importance.
const IMPORTANCE_SAMPLE_ROWS: usize = 2_000;

/// Per-column standardization retained for the linear model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl FeatureScaler {
    /// Population mean/std per column; constant columns get scale 1.
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let n_features = rows.first().map_or(0, Vec::len);
        let mut means = Vec::with_capacity(n_features);
        let mut scales = Vec::with_capacity(n_features);
        for j in 0..n_features {
            let column: Vec<f64> = rows.iter().map(|r| r[j]).collect();
            let std = (&column).population_std_dev();
            means.push((&column).mean());
            scales.push(if std.is_finite() && std > 0.0 { std } else { 1.0 });
        }
        Self { means, scales }
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter()
            .map(|row| {
                row.iter()
                    .zip(self.means.iter().zip(&self.scales))
                    .map(|(v, (m, s))| (v - m) / s)
                    .collect()
            })
            .collect()
    }
}

/// Gradient descent settings for the logistic model.
#[derive(Debug, Clone, Copy)]
pub struct LogisticParams {
    pub max_iter: usize,
    pub learning_rate: f64,
    /// Inverse regularization strength, as in the usual `C` parameter.
    pub c: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            max_iter: 1_000,
            learning_rate: 0.1,
            c: 1.0,
        }
    }
}

/// L2-regularized logistic regression on standardized inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &LogisticParams) -> Self {
        let n = x.len();
        let n_features = x.first().map_or(0, Vec::len);
        let mut coefficients = vec![0.0; n_features];
        let mut intercept = 0.0;
        if n == 0 {
            return Self {
                coefficients,
                intercept,
            };
        }

        let lambda = 1.0 / (params.c * n as f64);
        for _ in 0..params.max_iter {
            let mut grad_coef = vec![0.0; n_features];
            let mut grad_intercept = 0.0;

            for (row, &label) in x.iter().zip(y) {
                let error = sigmoid(dot(&coefficients, row) + intercept) - label;
                grad_intercept += error;
                for (g, v) in grad_coef.iter_mut().zip(row) {
                    *g += error * v;
                }
            }

            intercept -= params.learning_rate * grad_intercept / n as f64;
            for (w, g) in coefficients.iter_mut().zip(&grad_coef) {
                *w -= params.learning_rate * (g / n as f64 + lambda * *w);
            }
        }

        Self {
            coefficients,
            intercept,
        }
    }

    pub fn predict_proba(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter()
            .map(|row| sigmoid(dot(&self.coefficients, row) + self.intercept))
            .collect()
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// A fitted binary classifier producing positive-class probabilities.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classifier {
    /// Regression forest on 0/1 targets: the prediction is the mean leaf class frequency.
    RandomForest {
        /// Equal-sized tree shards; their mean prediction is the forest's.
        shards: Vec<Forest>,
        /// Input width the forest was trained on.
        n_features: usize,
        /// Normalized permutation importance, in feature order.
        importances: Vec<f64>,
    },
    LogisticRegression(LinearModel),
}

impl Classifier {
    pub fn kind(&self) -> ModelKind {
        match self {
            Classifier::RandomForest { .. } => ModelKind::RandomForest,
            Classifier::LogisticRegression(_) => ModelKind::LogisticRegression,
        }
    }

    /// Number of input columns the classifier expects.
    pub fn n_features(&self) -> usize {
        match self {
            Classifier::RandomForest { n_features, .. } => *n_features,
            Classifier::LogisticRegression(model) => model.coefficients.len(),
        }
    }

    /// Positive-class probability per row, clamped to [0, 1].
    /// Rows must already be scaled when the model was trained with a scaler.
    pub fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, String> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let width = self.n_features();
        if let Some(row) = rows.iter().find(|r| r.len() != width) {
            return Err(format!("Expected {} features, got {}", width, row.len()));
        }
        let raw = match self {
            Classifier::RandomForest {
                shards, n_features, ..
            } => forest_predict(shards, *n_features, rows)?,
            Classifier::LogisticRegression(model) => model.predict_proba(rows),
        };
        Ok(raw.into_iter().map(|p| p.clamp(0.0, 1.0)).collect())
    }

    /// Importance per feature: permutation importance for the forest, |coefficient| for the linear model.
    pub fn importances(&self) -> Vec<f64> {
        match self {
            Classifier::RandomForest { importances, .. } => importances.clone(),
            Classifier::LogisticRegression(model) => {
                model.coefficients.iter().map(|c| c.abs()).collect()
            }
        }
    }
}

/// Mean of the shard predictions. smartcore panics on a column it does not have,
/// so the row width is checked first.
fn forest_predict(shards: &[Forest], n_features: usize, rows: &[Vec<f64>]) -> Result<Vec<f64>, String> {
    if let Some(row) = rows.iter().find(|r| r.len() != n_features) {
        return Err(format!(
            "Expected {} features, got {}",
            n_features,
            row.len()
        ));
    }
    if shards.is_empty() {
        return Err("Forest has no trees".to_string());
    }

    let matrix =
        DenseMatrix::from_2d_vec(&rows.to_vec()).map_err(|e| format!("Matrix error: {}", e))?;
    let mut sum = vec![0.0; rows.len()];
    for forest in shards {
        let predictions = forest
            .predict(&matrix)
            .map_err(|e| format!("Predict error: {}", e))?;
        for (acc, p) in sum.iter_mut().zip(predictions) {
            *acc += p;
        }
    }
    let n = shards.len() as f64;
    Ok(sum.into_iter().map(|v| v / n).collect())
}

/// Grows `FOREST_SHARDS` forests of `N_TREES / FOREST_SHARDS` trees each on the rayon pool.
/// Shard `k` is seeded with `seed + k`, so the result does not depend on scheduling.
fn fit_forest(x: &[Vec<f64>], targets: &[f64], seed: u64) -> Result<Vec<Forest>, TrainingError> {
    let x_matrix = DenseMatrix::from_2d_vec(&x.to_vec()).map_err(|e| TrainingError::Fit {
        reason: format!("Matrix error: {}", e),
    })?;
    let targets = targets.to_vec();

    (0..FOREST_SHARDS)
        .into_par_iter()
        .map(|shard| {
            let params = RandomForestRegressorParameters::default()
                .with_n_trees(N_TREES / FOREST_SHARDS)
                .with_max_depth(MAX_DEPTH)
                .with_min_samples_split(MIN_SAMPLES_SPLIT)
                .with_min_samples_leaf(MIN_SAMPLES_LEAF)
                .with_seed(seed.wrapping_add(shard as u64));
            RandomForestRegressor::fit(&x_matrix, &targets, params).map_err(|e| {
                TrainingError::Fit {
                    reason: format!("Training error: {}", e),
                }
            })
        })
        .collect()
}

/// Classifier plus the scaler its inputs need, if any.
pub struct FittedModel {
    pub classifier: Classifier,
    pub scaler: Option<FeatureScaler>,
}

impl FittedModel {
    /// Fits `kind` on `x`/`y`. Only the logistic path standardizes and keeps a scaler.
    pub fn fit(kind: ModelKind, x: &[Vec<f64>], y: &[u8], seed: u64) -> Result<Self, TrainingError> {
        if x.is_empty() || x[0].is_empty() {
            return Err(TrainingError::EmptyFeatureTable);
        }
        let targets: Vec<f64> = y.iter().map(|&v| f64::from(v)).collect();

        match kind {
            ModelKind::RandomForest => {
                let shards = fit_forest(x, &targets, seed)?;
                let importances = permutation_importance(&shards, x, &targets, seed);
                Ok(Self {
                    classifier: Classifier::RandomForest {
                        shards,
                        n_features: x[0].len(),
                        importances,
                    },
                    scaler: None,
                })
            }
            ModelKind::LogisticRegression => {
                let scaler = FeatureScaler::fit(x);
                let scaled = scaler.transform(x);
                let model = LinearModel::fit(&scaled, &targets, &LogisticParams::default());
                Ok(Self {
                    classifier: Classifier::LogisticRegression(model),
                    scaler: Some(scaler),
                })
            }
        }
    }

    /// Probabilities for unscaled rows.
    pub fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, String> {
        match &self.scaler {
            Some(scaler) => self.classifier.predict_proba(&scaler.transform(rows)),
            None => self.classifier.predict_proba(rows),
        }
    }
}

fn brier(predictions: &[f64], targets: &[f64]) -> f64 {
    let n = predictions.len().max(1) as f64;
    predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (p - t).powi(2))
        .sum::<f64>()
        / n
}

/// Increase in Brier score when each column is shuffled, normalized to sum 1.
/// Columns are evaluated in parallel; each uses its own seeded shuffle.
fn permutation_importance(shards: &[Forest], x: &[Vec<f64>], y: &[f64], seed: u64) -> Vec<f64> {
    let rows = x.len().min(IMPORTANCE_SAMPLE_ROWS);
    let (x, y) = (&x[..rows], &y[..rows]);
    let n_features = x[0].len();

    let Ok(baseline) = forest_predict(shards, n_features, x).map(|p| brier(&p, y)) else {
        return vec![0.0; n_features];
    };

    let raw: Vec<f64> = (0..n_features)
        .into_par_iter()
        .map(|j| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(j as u64));
            let mut column: Vec<f64> = x.iter().map(|r| r[j]).collect();
            column.shuffle(&mut rng);

            let permuted: Vec<Vec<f64>> = x
                .iter()
                .zip(&column)
                .map(|(row, &v)| {
                    let mut row = row.clone();
                    row[j] = v;
                    row
                })
                .collect();

            match forest_predict(shards, n_features, &permuted) {
                Ok(p) => (brier(&p, y) - baseline).max(0.0),
                Err(e) => {
                    debug!("Permutation importance skipped feature {}: {}", j, e);
                    0.0
                }
            }
        })
        .collect();

    let total: f64 = raw.iter().sum();
    if total > 0.0 {
        raw.iter().map(|v| v / total).collect()
    } else {
        raw
    }
}
