use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use agrirec_helpers::{LabelEncoder, ProbabilisticClassifier};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Model;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("cannot access artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed artifact {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid artifact: {0}")]
    Invalid(String),
    #[error(transparent)]
    Layout(#[from] crate::features::LayoutError),
}

/// A categorical model input: the `feature_order` column it fills, the
/// request field it reads, and the encoder for its values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalSlot {
    pub slot: String,
    pub field: String,
    pub encoder: LabelEncoder,
}

/// Reference growing conditions for one crop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropProfile {
    pub temperature: f64,
    pub humidity: f64,
    pub rainfall: f64,
}

/// Everything needed to serve one model, as persisted by training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineArtifact<C = Model> {
    pub model: C,
    pub target: LabelEncoder,
    pub feature_order: Vec<String>,
    #[serde(default)]
    pub categorical: Vec<CategoricalSlot>,
    /// Keyed by target label.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profiles: BTreeMap<String, CropProfile>,
}

impl<C: ProbabilisticClassifier<f64>> PipelineArtifact<C> {
    /// Checks the record is internally consistent.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.feature_order.is_empty() {
            return Err(ArtifactError::Invalid("feature_order is empty".to_string()));
        }
        if self.target.is_empty() || !self.target.is_canonical() {
            return Err(ArtifactError::Invalid(
                "target classes must be non-empty, sorted and unique".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for cat in &self.categorical {
            if !self.feature_order.contains(&cat.slot) {
                return Err(ArtifactError::Invalid(format!(
                    "categorical slot '{}' is not in feature_order",
                    cat.slot
                )));
            }
            if !seen.insert(cat.slot.as_str()) {
                return Err(ArtifactError::Invalid(format!(
                    "categorical slot '{}' is declared twice",
                    cat.slot
                )));
            }
            if !cat.encoder.is_canonical() {
                return Err(ArtifactError::Invalid(format!(
                    "encoder for '{}' is not sorted and unique",
                    cat.slot
                )));
            }
        }

        self.model
            .validate()
            .map_err(|e| ArtifactError::Invalid(format!("model is inconsistent: {}", e)))?;
        if self.model.n_features() != self.feature_order.len() {
            return Err(ArtifactError::Invalid(format!(
                "model expects {} features but feature_order has {}",
                self.model.n_features(),
                self.feature_order.len()
            )));
        }
        if self.model.n_classes() != self.target.len() {
            return Err(ArtifactError::Invalid(format!(
                "model predicts {} classes but the target encoder has {}",
                self.model.n_classes(),
                self.target.len()
            )));
        }
        Ok(())
    }

    pub fn categorical_encoder(&self, slot: &str) -> Option<&LabelEncoder> {
        self.categorical
            .iter()
            .find(|c| c.slot == slot)
            .map(|c| &c.encoder)
    }
}

impl PipelineArtifact<Model> {
    /// Reads and validates an artifact file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact: Self = serde_json::from_reader(BufReader::new(file)).map_err(|source| {
            ArtifactError::Json { path: path.to_path_buf(), source }
        })?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Writes the artifact as JSON, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ArtifactError> {
        let path = path.as_ref();
        let io_err = |source| ArtifactError::Io { path: path.to_path_buf(), source };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
        serde_json::to_writer(&mut writer, self).map_err(|source| ArtifactError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        writer.flush().map_err(io_err)
    }
}
