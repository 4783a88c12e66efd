use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use agrirec_helpers::ProbabilisticClassifier;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::artifacts::{ArtifactError, PipelineArtifact};
use crate::error::ServiceError;
use crate::features::{FeatureLayout, PredictionRequest, UnmatchedPolicy};
use crate::model::Model;

/// Default probability a crop must exceed to count as suitable.
pub const DEFAULT_SUITABILITY_THRESHOLD: f64 = 0.05;

/// How many ranked crops a suitability report lists.
pub const TOP_K: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Crop,
    Fertilizer,
    Suitability,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::Crop, ModelKind::Fertilizer, ModelKind::Suitability];

    pub fn name(self) -> &'static str {
        match self {
            ModelKind::Crop => "crop",
            ModelKind::Fertilizer => "fertilizer",
            ModelKind::Suitability => "suitability",
        }
    }

    /// Artifact file name inside an artifacts directory.
    pub fn file_name(self) -> &'static str {
        match self {
            ModelKind::Crop => "crop.json",
            ModelKind::Fertilizer => "fertilizer.json",
            ModelKind::Suitability => "suitability.json",
        }
    }
}

impl Display for ModelKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated artifact with its feature layout resolved.
#[derive(Debug, Clone)]
pub struct Pipeline<C = Model> {
    artifact: PipelineArtifact<C>,
    layout: FeatureLayout,
}

impl<C: ProbabilisticClassifier<f64>> Pipeline<C> {
    pub fn new(artifact: PipelineArtifact<C>, policy: UnmatchedPolicy) -> Result<Self, ArtifactError> {
        artifact.validate()?;
        let reserved: Vec<&str> = artifact.categorical.iter().map(|c| c.slot.as_str()).collect();
        let layout = FeatureLayout::resolve(&artifact.feature_order, &reserved, policy)?;
        Ok(Self { artifact, layout })
    }

    pub fn artifact(&self) -> &PipelineArtifact<C> {
        &self.artifact
    }

    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    pub fn classes(&self) -> &[String] {
        self.artifact.target.classes()
    }

    /// Encodes every categorical field of `request`, in slot order.
    /// Values must match a trained class exactly (after trimming).
    pub fn encode_categoricals(&self, request: &PredictionRequest) -> Result<Vec<usize>, ServiceError> {
        self.artifact
            .categorical
            .iter()
            .map(|cat| {
                let value = request.text(&cat.field)?;
                cat.encoder.encode(value).ok_or_else(|| ServiceError::UnknownCategory {
                    field: cat.field.clone(),
                    value: value.to_string(),
                })
            })
            .collect()
    }

    pub fn assemble(&self, request: &PredictionRequest) -> Result<Array1<f64>, ServiceError> {
        let encoded = self.encode_categoricals(request)?;
        self.layout.assemble(request, &encoded)
    }

    pub fn predict_proba(&self, request: &PredictionRequest) -> Result<Array1<f64>, ServiceError> {
        let row = self.assemble(request)?;
        self.artifact
            .model
            .predict_proba(row.view())
            .map_err(|e| ServiceError::Internal(e.to_string()))
    }

    pub fn predict_label(&self, request: &PredictionRequest) -> Result<&str, ServiceError> {
        let row = self.assemble(request)?;
        let index = self
            .artifact
            .model
            .predict(row.view())
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        self.artifact
            .target
            .try_decode(index)
            .map_err(|e| ServiceError::Internal(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceConfig {
    /// A crop is suitable when its probability is strictly above this.
    pub suitability_threshold: f64,
    pub unmatched: UnmatchedPolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            suitability_threshold: DEFAULT_SUITABILITY_THRESHOLD,
            unmatched: UnmatchedPolicy::Zero,
        }
    }
}

/// Where each model's artifact lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub crop: PathBuf,
    pub fertilizer: PathBuf,
    pub suitability: PathBuf,
}

impl ArtifactPaths {
    /// The conventional file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            crop: dir.join(ModelKind::Crop.file_name()),
            fertilizer: dir.join(ModelKind::Fertilizer.file_name()),
            suitability: dir.join(ModelKind::Suitability.file_name()),
        }
    }

    pub fn get(&self, kind: ModelKind) -> &Path {
        match kind {
            ModelKind::Crop => &self.crop,
            ModelKind::Fertilizer => &self.fertilizer,
            ModelKind::Suitability => &self.suitability,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedLabel {
    pub crop: String,
    pub confidence: f64,
}

/// Reference conditions of the best-ranked crop; fields are null when the
/// artifact has no profile for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropDetails {
    pub best_crop: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub rainfall: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuitabilityReport {
    pub crop: String,
    #[serde(rename = "isSuitable")]
    pub is_suitable: bool,
    pub top_crops: Vec<RankedLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<CropDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl SuitabilityReport {
    /// Fixed answer served while no suitability model is loaded.
    pub fn mock(crop: &str) -> Self {
        Self {
            crop: crop.to_string(),
            is_suitable: true,
            top_crops: vec![
                RankedLabel { crop: "rice".to_string(), confidence: 0.85 },
                RankedLabel { crop: "maize".to_string(), confidence: 0.10 },
            ],
            details: None,
            note: Some("Mock Data".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub crop: bool,
    pub fertilizer: bool,
    pub suitability: bool,
}

/// Class lists a client needs to build its forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub crop_classes: Vec<String>,
    pub fert_crop_classes: Vec<String>,
    pub soil_types: Vec<String>,
    pub feature_order: Vec<String>,
    pub suitability_classes: Vec<String>,
}

/// The three prediction pipelines, each optional.
#[derive(Debug, Clone, Default)]
pub struct PredictionService {
    crop: Option<Pipeline>,
    fertilizer: Option<Pipeline>,
    suitability: Option<Pipeline>,
    config: ServiceConfig,
}

impl PredictionService {
    /// A service with no models loaded.
    pub fn new(config: ServiceConfig) -> Self {
        Self { config, ..Self::default() }
    }

    /// Loads whichever artifacts are present. Missing or invalid ones are
    /// logged and leave their endpoint without a model.
    pub fn load(paths: &ArtifactPaths, config: ServiceConfig) -> Self {
        let mut service = Self::new(config);
        for kind in ModelKind::ALL {
            if let Some(pipeline) = load_pipeline(kind, paths.get(kind), config.unmatched) {
                service = service.with_pipeline(kind, pipeline);
            }
        }
        service
    }

    pub fn with_pipeline(mut self, kind: ModelKind, pipeline: Pipeline) -> Self {
        *self.slot_mut(kind) = Some(pipeline);
        self
    }

    fn slot_mut(&mut self, kind: ModelKind) -> &mut Option<Pipeline> {
        match kind {
            ModelKind::Crop => &mut self.crop,
            ModelKind::Fertilizer => &mut self.fertilizer,
            ModelKind::Suitability => &mut self.suitability,
        }
    }

    pub fn pipeline(&self, kind: ModelKind) -> Option<&Pipeline> {
        match kind {
            ModelKind::Crop => self.crop.as_ref(),
            ModelKind::Fertilizer => self.fertilizer.as_ref(),
            ModelKind::Suitability => self.suitability.as_ref(),
        }
    }

    fn require(&self, kind: ModelKind) -> Result<&Pipeline, ServiceError> {
        self.pipeline(kind).ok_or(ServiceError::ModelUnavailable(kind))
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            crop: self.crop.is_some(),
            fertilizer: self.fertilizer.is_some(),
            suitability: self.suitability.is_some(),
        }
    }

    pub fn predict_crop(&self, request: &PredictionRequest) -> Result<String, ServiceError> {
        let label = self.require(ModelKind::Crop)?.predict_label(request)?;
        log::debug!("crop prediction: {}", label);
        Ok(label.to_string())
    }

    pub fn predict_fertilizer(&self, request: &PredictionRequest) -> Result<String, ServiceError> {
        let label = self.require(ModelKind::Fertilizer)?.predict_label(request)?;
        log::debug!("fertilizer prediction: {}", label);
        Ok(label.to_string())
    }

    /// Ranks crops for the request's climate and judges the requested crop.
    /// Falls back to [`SuitabilityReport::mock`] without a model.
    pub fn check_suitability(&self, request: &PredictionRequest) -> Result<SuitabilityReport, ServiceError> {
        let crop = match request.get("crop") {
            None | Some(Value::Null) => String::new(),
            Some(_) => request.text("crop")?.to_lowercase(),
        };

        let Some(pipeline) = self.suitability.as_ref() else {
            return Ok(SuitabilityReport::mock(&crop));
        };

        let proba = pipeline.predict_proba(request)?;
        let classes = pipeline.classes();
        if proba.len() != classes.len() {
            return Err(ServiceError::Internal(format!(
                "model returned {} probabilities for {} classes",
                proba.len(),
                classes.len()
            )));
        }

        let mut order: Vec<usize> = (0..proba.len()).collect();
        order.sort_by(|&a, &b| proba[b].partial_cmp(&proba[a]).unwrap_or(Ordering::Equal));
        let top_crops: Vec<RankedLabel> = order
            .iter()
            .take(TOP_K)
            .map(|&i| RankedLabel { crop: classes[i].clone(), confidence: proba[i] })
            .collect();

        let is_suitable = classes
            .iter()
            .position(|c| c.to_lowercase() == crop)
            .is_some_and(|i| proba[i] > self.config.suitability_threshold);

        let profiles = &pipeline.artifact().profiles;
        let details = match top_crops.first() {
            Some(best) if !profiles.is_empty() => {
                let profile = profiles.get(&best.crop);
                Some(CropDetails {
                    best_crop: best.crop.clone(),
                    temperature: profile.map(|p| p.temperature),
                    humidity: profile.map(|p| p.humidity),
                    rainfall: profile.map(|p| p.rainfall),
                })
            }
            _ => None,
        };

        Ok(SuitabilityReport { crop, is_suitable, top_crops, details, note: None })
    }

    pub fn meta(&self) -> Meta {
        let classes = |p: Option<&Pipeline>| p.map(|p| p.classes().to_vec()).unwrap_or_default();
        let fert_encoder = |slot: &str| {
            self.fertilizer
                .as_ref()
                .and_then(|p| p.artifact().categorical_encoder(slot))
                .map(|e| e.classes().to_vec())
                .unwrap_or_default()
        };
        Meta {
            crop_classes: classes(self.crop.as_ref()),
            fert_crop_classes: fert_encoder("crop_enc"),
            soil_types: fert_encoder("soil_enc"),
            feature_order: self
                .fertilizer
                .as_ref()
                .map(|p| p.artifact().feature_order.clone())
                .unwrap_or_default(),
            suitability_classes: classes(self.suitability.as_ref()),
        }
    }
}

fn load_pipeline(kind: ModelKind, path: &Path, policy: UnmatchedPolicy) -> Option<Pipeline> {
    if !path.exists() {
        if kind == ModelKind::Suitability {
            log::warn!("{} model not found at {}; serving mock data", kind, path.display());
        } else {
            log::warn!("{} model not found at {}; endpoint disabled", kind, path.display());
        }
        return None;
    }
    match PipelineArtifact::load(path).and_then(|artifact| Pipeline::new(artifact, policy)) {
        Ok(pipeline) => {
            log::info!(
                "loaded {} model ({}, {} classes) from {}",
                kind,
                pipeline.artifact().model.algorithm(),
                pipeline.classes().len(),
                path.display()
            );
            Some(pipeline)
        }
        Err(e) => {
            log::error!("failed to load {} model from {}: {}", kind, path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{CategoricalSlot, CropProfile};
    use agrirec_helpers::{DataPoint, LabelEncoder, Metric};
    use approx::assert_abs_diff_eq;
    use k_nn::KnnClassifier;
    use ndarray::{array, ArrayView1};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn knn(k: usize, data: Vec<DataPoint<usize, f64>>, n_classes: usize) -> Model {
        Model::Knn(KnnClassifier::new(k, data, n_classes, Metric::L2).unwrap())
    }

    fn crop_pipeline() -> Pipeline {
        let data = vec![
            DataPoint::new(array![90.0, 42.0, 43.0, 20.8, 82.0, 6.5, 202.9], 1),
            DataPoint::new(array![78.0, 48.0, 22.0, 22.6, 63.7, 6.2, 87.8], 0),
        ];
        let artifact = PipelineArtifact {
            model: knn(1, data, 2),
            target: LabelEncoder::fit(["rice", "maize"]),
            feature_order: strings(&["N", "P", "K", "temperature", "humidity", "ph", "rainfall"]),
            categorical: vec![],
            profiles: BTreeMap::new(),
        };
        Pipeline::new(artifact, UnmatchedPolicy::Reject).unwrap()
    }

    fn fertilizer_categoricals() -> Vec<CategoricalSlot> {
        vec![
            CategoricalSlot {
                slot: "soil_enc".into(),
                field: "soil_type".into(),
                encoder: LabelEncoder::fit(["Sandy", "Clayey"]),
            },
            CategoricalSlot {
                slot: "crop_enc".into(),
                field: "crop".into(),
                encoder: LabelEncoder::fit(["Paddy", "Cotton"]),
            },
        ]
    }

    fn fertilizer_order() -> Vec<String> {
        strings(&[
            "soil_enc", "crop_enc", "Moisture", "Nitrogen", "Phosphorous", "Potassium", "Temparature",
            "Humidity",
        ])
    }

    fn fertilizer_pipeline() -> Pipeline {
        let data = vec![
            DataPoint::new(array![1.0, 1.0, 38.0, 37.0, 0.0, 0.0, 26.0, 52.0], 1),
            DataPoint::new(array![0.0, 0.0, 45.0, 12.0, 36.0, 0.0, 29.0, 52.0], 0),
        ];
        let artifact = PipelineArtifact {
            model: knn(1, data, 2),
            target: LabelEncoder::fit(["Urea", "DAP"]),
            feature_order: fertilizer_order(),
            categorical: fertilizer_categoricals(),
            profiles: BTreeMap::new(),
        };
        Pipeline::new(artifact, UnmatchedPolicy::Reject).unwrap()
    }

    fn suitability_pipeline() -> Pipeline {
        // chickpea = 0, maize = 1, rice = 2
        let mut data = Vec::new();
        for d in [0.0, 0.5, 1.0] {
            data.push(DataPoint::new(array![20.8 + d, 82.0 + d, 202.9 + d], 2));
            data.push(DataPoint::new(array![22.6 + d, 63.7 + d, 87.8 + d], 1));
            data.push(DataPoint::new(array![18.8 + d, 16.9 + d, 80.0 + d], 0));
        }
        let artifact = PipelineArtifact {
            model: knn(3, data, 3),
            target: LabelEncoder::fit(["rice", "maize", "chickpea"]),
            feature_order: strings(&["temperature", "humidity", "rainfall"]),
            categorical: vec![],
            profiles: BTreeMap::from([(
                "rice".to_string(),
                CropProfile { temperature: 20.8, humidity: 82.0, rainfall: 202.9 },
            )]),
        };
        Pipeline::new(artifact, UnmatchedPolicy::Reject).unwrap()
    }

    fn service() -> PredictionService {
        PredictionService::new(ServiceConfig::default())
            .with_pipeline(ModelKind::Crop, crop_pipeline())
            .with_pipeline(ModelKind::Fertilizer, fertilizer_pipeline())
            .with_pipeline(ModelKind::Suitability, suitability_pipeline())
    }

    fn crop_request() -> PredictionRequest {
        PredictionRequest::new()
            .with("N", 90)
            .with("P", 42)
            .with("K", 43)
            .with("temperature", 20.8)
            .with("humidity", 82)
            .with("ph", 6.5)
            .with("rainfall", 202.9)
    }

    fn fertilizer_request(crop: &str) -> PredictionRequest {
        PredictionRequest::new()
            .with("crop", crop)
            .with("soil_type", "Sandy")
            .with("N", 37)
            .with("P", 0)
            .with("K", 0)
            .with("moisture", 38)
            .with("temperature", 26)
            .with("humidity", 52)
    }

    fn climate(crop: &str, t: f64, h: f64, r: f64) -> PredictionRequest {
        PredictionRequest::new()
            .with("crop", crop)
            .with("temperature", t)
            .with("humidity", h)
            .with("rainfall", r)
    }

    #[test]
    fn test_example_crop_request_returns_a_trained_label() {
        let service = service();
        let label = service.predict_crop(&crop_request()).unwrap();
        assert_eq!(label, "rice");
        let classes = service.pipeline(ModelKind::Crop).unwrap().classes();
        assert!(classes.contains(&label));
        assert_eq!(service.predict_crop(&crop_request()).unwrap(), label);
    }

    #[test]
    fn test_fertilizer_prediction() {
        let service = service();
        assert_eq!(service.predict_fertilizer(&fertilizer_request("Paddy")).unwrap(), "Urea");
    }

    #[test]
    fn test_unknown_crop_is_rejected_by_name() {
        let err = service()
            .predict_fertilizer(&fertilizer_request("Maize"))
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::UnknownCategory { field: "crop".into(), value: "Maize".into() }
        );
        assert!(err.to_string().contains("Maize"));
    }

    struct Spy {
        calls: AtomicUsize,
    }

    impl ProbabilisticClassifier<f64> for Spy {
        type Error = std::io::Error;

        fn n_features(&self) -> usize {
            8
        }

        fn n_classes(&self) -> usize {
            2
        }

        fn predict_proba(&self, _features: ArrayView1<f64>) -> Result<Array1<f64>, std::io::Error> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(array![0.25, 0.75])
        }
    }

    #[test]
    fn test_classifier_not_called_for_unknown_category() {
        let artifact = PipelineArtifact {
            model: Spy { calls: AtomicUsize::new(0) },
            target: LabelEncoder::fit(["DAP", "Urea"]),
            feature_order: fertilizer_order(),
            categorical: fertilizer_categoricals(),
            profiles: BTreeMap::new(),
        };
        let pipeline = Pipeline::new(artifact, UnmatchedPolicy::Zero).unwrap();

        assert!(pipeline.predict_label(&fertilizer_request("Maize")).is_err());
        let soil_typo = fertilizer_request("Paddy").with("soil_type", "Loamy");
        assert!(matches!(
            pipeline.predict_label(&soil_typo),
            Err(ServiceError::UnknownCategory { ref field, .. }) if field == "soil_type"
        ));
        assert_eq!(pipeline.artifact().model.calls.load(AtomicOrdering::SeqCst), 0);

        assert_eq!(pipeline.predict_label(&fertilizer_request("Paddy")).unwrap(), "Urea");
        assert_eq!(pipeline.artifact().model.calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn test_suitability_ranking() {
        let service = service();
        let report = service
            .check_suitability(&climate(" Rice ", 21.0, 82.5, 203.0))
            .unwrap();
        assert_eq!(report.crop, "rice");
        assert!(report.is_suitable);
        assert_eq!(report.top_crops.len(), TOP_K);
        assert_eq!(report.top_crops[0].crop, "rice");
        // Equal scores keep encoder order.
        assert_eq!(report.top_crops[1].crop, "chickpea");
        assert_eq!(report.top_crops[2].crop, "maize");
        for pair in report.top_crops.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        let details = report.details.unwrap();
        assert_eq!(details.best_crop, "rice");
        assert_eq!(details.rainfall, Some(202.9));
        assert!(report.note.is_none());

        let report = service
            .check_suitability(&climate("maize", 21.0, 82.5, 203.0))
            .unwrap();
        assert!(!report.is_suitable);
    }

    #[test]
    fn test_suitability_probabilities_sum_to_one() {
        let pipeline = suitability_pipeline();
        let proba = pipeline
            .predict_proba(&climate("rice", 22.0, 70.0, 120.0))
            .unwrap();
        assert_abs_diff_eq!(proba.sum(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_threshold_is_strict() {
        let config = ServiceConfig { suitability_threshold: 1.0, ..ServiceConfig::default() };
        let service = PredictionService::new(config)
            .with_pipeline(ModelKind::Suitability, suitability_pipeline());
        let report = service
            .check_suitability(&climate("rice", 21.0, 82.5, 203.0))
            .unwrap();
        assert_abs_diff_eq!(report.top_crops[0].confidence, 1.0);
        assert!(!report.is_suitable);
    }

    #[test]
    fn test_suitability_requires_numbers() {
        let request = PredictionRequest::new()
            .with("crop", "rice")
            .with("temperature", 21.0)
            .with("humidity", "humid");
        let err = service().check_suitability(&request).unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(err.to_string().contains("humidity"));
    }

    #[test]
    fn test_mock_without_model() {
        let service = PredictionService::new(ServiceConfig::default());
        let report = service
            .check_suitability(&PredictionRequest::new().with("crop", "Wheat"))
            .unwrap();
        assert_eq!(report, SuitabilityReport::mock("wheat"));
        assert_eq!(report.note.as_deref(), Some("Mock Data"));
        assert_eq!(
            service.predict_crop(&crop_request()).unwrap_err(),
            ServiceError::ModelUnavailable(ModelKind::Crop)
        );
    }

    #[test]
    fn test_meta_and_status() {
        let service = service();
        let meta = service.meta();
        assert_eq!(meta.crop_classes, strings(&["maize", "rice"]));
        assert_eq!(meta.fert_crop_classes, strings(&["Cotton", "Paddy"]));
        assert_eq!(meta.soil_types, strings(&["Clayey", "Sandy"]));
        assert_eq!(meta.feature_order, fertilizer_order());
        assert_eq!(meta.suitability_classes, strings(&["chickpea", "maize", "rice"]));
        assert_eq!(
            service.status(),
            ModelStatus { crop: true, fertilizer: true, suitability: true }
        );
    }

    #[test]
    fn test_load_tolerates_missing_and_broken_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        crop_pipeline().artifact().save(&paths.crop).unwrap();
        std::fs::write(&paths.fertilizer, "not json").unwrap();

        let service = PredictionService::load(&paths, ServiceConfig::default());
        assert_eq!(
            service.status(),
            ModelStatus { crop: true, fertilizer: false, suitability: false }
        );
        assert_eq!(service.predict_crop(&crop_request()).unwrap(), "rice");
    }

    #[test]
    fn test_load_rejects_knn_label_outside_target() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        suitability_pipeline().artifact().save(&paths.suitability).unwrap();

        let mut json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&paths.suitability).unwrap()).unwrap();
        json["model"]["training_data"][0]["label"] = serde_json::json!(5);
        std::fs::write(&paths.suitability, json.to_string()).unwrap();

        let service = PredictionService::load(&paths, ServiceConfig::default());
        assert!(!service.status().suitability);
        let request = PredictionRequest::new()
            .with("crop", "rice")
            .with("temperature", 20.8)
            .with("humidity", 82.0)
            .with("rainfall", 202.9);
        let report = service.check_suitability(&request).unwrap();
        assert_eq!(report.note.as_deref(), Some("Mock Data"));
    }
}
