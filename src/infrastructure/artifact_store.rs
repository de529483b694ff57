use crate::application::ml::classifier::{Classifier, FeatureScaler};
use crate::domain::errors::ArtifactError;
use crate::domain::ml::artifact::ModelMetadata;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const MODEL_FILE: &str = "model.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const METADATA_FILE: &str = "metadata.json";

/// Format of bundle timestamps, also used in historical file names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Serialize)]
struct StampedRef<'a, T> {
    timestamp: &'a str,
    #[serde(flatten)]
    body: &'a T,
}

#[derive(Deserialize)]
struct ModelFile {
    timestamp: String,
    classifier: Classifier,
}

#[derive(Deserialize)]
struct ScalerFile {
    timestamp: String,
    scaler: FeatureScaler,
}

#[derive(Serialize)]
struct ModelBody<'a> {
    classifier: &'a Classifier,
}

#[derive(Serialize)]
struct ScalerBody<'a> {
    scaler: &'a FeatureScaler,
}

/// A loaded artifact bundle. Read-only once loaded.
pub struct ModelArtifact {
    pub classifier: Classifier,
    pub scaler: Option<FeatureScaler>,
    pub metadata: ModelMetadata,
}

impl ModelArtifact {
    /// Positive-class probabilities for rows in `metadata.feature_names` order.
    pub fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, String> {
        match &self.scaler {
            Some(scaler) => self.classifier.predict_proba(&scaler.transform(rows)),
            None => self.classifier.predict_proba(rows),
        }
    }
}

/// File-based home of the latest bundle and every historical one.
///
/// Layout:
/// - `model.json`, `scaler.json` (only when a scaler is used), `metadata.json`: the latest bundle
/// - `model_<ts>.json`, `scaler_<ts>.json`, `metadata_<ts>.json`: historical copies, never deleted
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes the historical copies, then replaces the latest files one by one
    /// (temp file + rename), metadata last. Returns every path written.
    pub fn publish(
        &self,
        classifier: &Classifier,
        scaler: Option<&FeatureScaler>,
        metadata: &ModelMetadata,
    ) -> Result<Vec<PathBuf>, ArtifactError> {
        fs::create_dir_all(&self.dir).map_err(|source| ArtifactError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let ts = metadata.timestamp.as_str();
        let model_json = to_json(
            &StampedRef {
                timestamp: ts,
                body: &ModelBody { classifier },
            },
            &self.dir.join(MODEL_FILE),
        )?;
        let scaler_json = scaler
            .map(|scaler| {
                to_json(
                    &StampedRef {
                        timestamp: ts,
                        body: &ScalerBody { scaler },
                    },
                    &self.dir.join(SCALER_FILE),
                )
            })
            .transpose()?;
        let metadata_json = to_json(metadata, &self.dir.join(METADATA_FILE))?;

        let mut written = Vec::new();

        // Historical copies are write-once. The model copy goes first, so an existing
        // version is detected before anything of the new bundle lands on disk.
        let mut historical = vec![(format!("model_{}.json", ts), &model_json)];
        if let Some(json) = &scaler_json {
            historical.push((format!("scaler_{}.json", ts), json));
        }
        historical.push((format!("metadata_{}.json", ts), &metadata_json));
        for (name, bytes) in historical {
            let path = self.dir.join(name);
            write_new(&path, bytes, ts)?;
            written.push(path);
        }

        let model_path = self.dir.join(MODEL_FILE);
        write_atomic(&model_path, &model_json)?;
        written.push(model_path);

        let scaler_path = self.dir.join(SCALER_FILE);
        match &scaler_json {
            Some(json) => {
                write_atomic(&scaler_path, json)?;
                written.push(scaler_path);
            }
            None => remove_stale(&scaler_path)?,
        }

        let metadata_path = self.dir.join(METADATA_FILE);
        write_atomic(&metadata_path, &metadata_json)?;
        written.push(metadata_path);

        info!(
            "Published {} bundle {} to {:?}",
            metadata.model_type, ts, self.dir
        );
        Ok(written)
    }

    /// Loads the latest bundle. `Ok(None)` when no bundle has been published.
    pub fn load_latest(&self) -> Result<Option<ModelArtifact>, ArtifactError> {
        let metadata_path = self.dir.join(METADATA_FILE);
        if !metadata_path.exists() {
            debug!("No artifact metadata at {:?}", metadata_path);
            return Ok(None);
        }

        let metadata: ModelMetadata = read_json(&metadata_path)?;
        let model: ModelFile = read_json(&self.dir.join(MODEL_FILE))?;
        check_timestamp(&metadata.timestamp, &model.timestamp)?;

        let width = metadata.feature_names.len();
        check_width("metadata n_features", width, metadata.n_features)?;
        check_width("classifier inputs", width, model.classifier.n_features())?;

        let scaler = if metadata.scaler_used {
            let file: ScalerFile = read_json(&self.dir.join(SCALER_FILE))?;
            check_timestamp(&metadata.timestamp, &file.timestamp)?;
            check_width("scaler means", width, file.scaler.means.len())?;
            check_width("scaler scales", width, file.scaler.scales.len())?;
            Some(file.scaler)
        } else {
            None
        };

        Ok(Some(ModelArtifact {
            classifier: model.classifier,
            scaler,
            metadata,
        }))
    }

    /// Timestamps of every historical bundle, oldest first.
    pub fn versions(&self) -> Result<Vec<String>, ArtifactError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ArtifactError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut versions: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                name.strip_prefix("metadata_")
                    .and_then(|rest| rest.strip_suffix(".json"))
                    .map(str::to_string)
            })
            .collect();
        versions.sort();
        Ok(versions)
    }
}

fn check_timestamp(expected: &str, found: &str) -> Result<(), ArtifactError> {
    if expected == found {
        Ok(())
    } else {
        Err(ArtifactError::Inconsistent {
            expected: format!("timestamp {}", expected),
            found: format!("file timestamp {}", found),
        })
    }
}

/// Every part of a bundle must agree with the declared feature list.
fn check_width(part: &str, expected: usize, found: usize) -> Result<(), ArtifactError> {
    if expected == found {
        Ok(())
    } else {
        Err(ArtifactError::Inconsistent {
            expected: format!("{} features", expected),
            found: format!("{} {}", found, part),
        })
    }
}

fn to_json<T: Serialize>(value: &T, path: &Path) -> Result<Vec<u8>, ArtifactError> {
    serde_json::to_vec_pretty(value).map_err(|source| ArtifactError::Serde {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Serde {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    fs::write(path, bytes).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_new(path: &Path, bytes: &[u8], timestamp: &str) -> Result<(), ArtifactError> {
    let io_error = |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(ArtifactError::VersionExists {
                timestamp: timestamp.to_string(),
            });
        }
        Err(e) => return Err(io_error(e)),
    };
    file.write_all(bytes).map_err(io_error)
}

// Readers never see a half-written latest file: write beside it, then rename over it.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    let temp_path = path.with_extension("json.tmp");
    write_file(&temp_path, bytes)?;
    fs::rename(&temp_path, path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn remove_stale(path: &Path) -> Result<(), ArtifactError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
