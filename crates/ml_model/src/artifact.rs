//! The serialized model artifact: fitted preprocessing plus classifier.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use features::{FEATURE_NAMES, FeatureRow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::inference::{InferenceError, ProbabilityModel};
use crate::metrics::EvaluationReport;
use crate::preprocess::Preprocessor;

/// Version of the on-disk artifact layout.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Errors raised while saving or loading an artifact.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact I/O failed at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact at {} is not valid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to move artifact into place: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("unsupported artifact format version {0}")]
    UnsupportedVersion(u32),

    #[error("artifact was fitted on features {found:?}, expected {expected:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("artifact contains non-finite parameters")]
    Corrupt,
}

/// Coefficients of a fitted logistic regression on standardized features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticCoefficients {
    pub weights: FeatureRow,
    pub intercept: f64,
}

impl LogisticCoefficients {
    /// Returns P(outcome = 1) for an already standardized row.
    #[must_use]
    pub fn probability(&self, standardized: &FeatureRow) -> f64 {
        let logit = self
            .weights
            .iter()
            .zip(standardized)
            .fold(self.intercept, |acc, (w, x)| w.mul_add(*x, acc));
        sigmoid(logit)
    }

    fn is_finite(&self) -> bool {
        self.intercept.is_finite() && self.weights.iter().all(|w| w.is_finite())
    }
}

/// Numerically stable logistic function.
#[must_use]
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// How the artifact was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub trained_at: DateTime<Utc>,
    pub dataset_path: Option<PathBuf>,
    pub dataset_rows: usize,
    pub skipped_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub seed: u64,
    pub test_size: f64,
    pub iterations: usize,
    pub final_loss: f64,
    pub evaluation: EvaluationReport,
}

/// A fitted preprocessing + classifier pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub feature_names: Vec<String>,
    pub preprocessor: Preprocessor,
    pub classifier: LogisticCoefficients,
    pub metadata: TrainingMetadata,
}

impl ModelArtifact {
    /// Assembles an artifact for the current feature contract.
    #[must_use]
    pub fn new(
        preprocessor: Preprocessor,
        classifier: LogisticCoefficients,
        metadata: TrainingMetadata,
    ) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            feature_names: FEATURE_NAMES.iter().map(ToString::to_string).collect(),
            preprocessor,
            classifier,
            metadata,
        }
    }

    /// Returns P(outcome = 1) for a complete row in contract order.
    #[must_use]
    pub fn probability(&self, row: &FeatureRow) -> f64 {
        self.classifier
            .probability(&self.preprocessor.standardize(row))
    }

    /// Checks the artifact matches this build's feature contract.
    ///
    /// # Errors
    ///
    /// Returns an error on a version, feature-list or parameter mismatch.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedVersion(self.format_version));
        }

        if self.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES) {
            return Err(ArtifactError::FeatureMismatch {
                expected: FEATURE_NAMES.iter().map(ToString::to_string).collect(),
                found: self.feature_names.clone(),
            });
        }

        if !self.classifier.is_finite() || !self.preprocessor.is_well_formed() {
            return Err(ArtifactError::Corrupt);
        }

        Ok(())
    }

    /// Writes the artifact to `path` atomically, creating parent directories.
    ///
    /// The JSON is written to a temporary file in the target directory and
    /// renamed over `path`, so readers never observe a partial file.
    ///
    /// # Errors
    ///
    /// Returns an error if any filesystem operation fails.
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let io_err = |source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        };

        fs::create_dir_all(dir).map_err(io_err)?;

        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, self).map_err(|source| {
                ArtifactError::Json {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            writer.flush().map_err(io_err)?;
        }
        temp.as_file().sync_all().map_err(io_err)?;
        temp.persist(path)?;

        info!(path = %path.display(), "Model artifact saved");
        Ok(())
    }

    /// Loads an artifact if one exists at `path`.
    ///
    /// Returns `Ok(None)` when the file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or
    /// validated.
    pub fn load(path: &Path) -> Result<Option<Self>, ArtifactError> {
        if !path.exists() {
            debug!(path = %path.display(), "No model artifact on disk");
            return Ok(None);
        }

        let bytes = fs::read(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let artifact: Self = serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        artifact.validate()?;
        Ok(Some(artifact))
    }
}

impl ProbabilityModel for ModelArtifact {
    fn predict_proba(&self, row: &FeatureRow) -> Result<f64, InferenceError> {
        Ok(self.probability(row))
    }
}
