//! Agricultural recommendations from tabular classifiers.
//!
//! Three independently trained pipelines sit behind [`PredictionService`]:
//! crop recommendation from soil nutrients and climate, fertilizer
//! recommendation from soil and crop type, and crop suitability from climate
//! alone. Each pipeline is a JSON [`PipelineArtifact`] holding the model,
//! its label encoders and the feature order it was trained with.

pub mod artifacts;
pub mod dataset;
pub mod error;
pub mod features;
pub mod lookup;
pub mod model;
pub mod service;
pub mod training;

pub use agrirec_helpers::{ClassificationReport, LabelEncoder, Metric, ProbabilisticClassifier};
pub use artifacts::{ArtifactError, CategoricalSlot, CropProfile, PipelineArtifact};
pub use dataset::{DatasetError, Table};
pub use error::ServiceError;
pub use features::{Concept, FeatureLayout, PredictionRequest, UnmatchedPolicy};
pub use lookup::{DistrictIndex, LookupError};
pub use model::{Model, ModelError};
pub use service::{
    ArtifactPaths, CropDetails, Meta, ModelKind, ModelStatus, Pipeline, PredictionService,
    RankedLabel, ServiceConfig, SuitabilityReport, DEFAULT_SUITABILITY_THRESHOLD, TOP_K,
};
pub use training::{Algorithm, TrainOptions, TrainingError, TrainingRun};
