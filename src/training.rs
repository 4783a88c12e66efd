//! Offline training of the three pipelines from their CSV datasets.

use std::collections::{BTreeMap, HashSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use agrirec_helpers::{
    train_test_split, ClassificationReport, DataPoint, LabelEncoder, Metric, ProbabilisticClassifier,
    SplitError,
};
use gradient_boosting::{BoostingParams, GradientBoostingClassifier};
use k_nn::KnnClassifier;
use ndarray::Array1;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use random_forest::{ForestParams, RandomForestClassifier};
use thiserror::Error;

use crate::artifacts::{CategoricalSlot, CropProfile, PipelineArtifact};
use crate::dataset::{DatasetError, Table};
use crate::model::{Model, ModelError};

const CROP_FEATURES: [&str; 7] = ["n", "p", "k", "temperature", "humidity", "ph", "rainfall"];
const CLIMATE_FEATURES: [&str; 3] = ["temperature", "humidity", "rainfall"];
/// Optional fertilizer inputs, in feature order after moisture.
const FERTILIZER_NUMERIC: [&str; 8] = [
    "Nitrogen",
    "Phosphorous",
    "Potassium",
    "N",
    "P",
    "K",
    "Temperature",
    "Humidity",
];

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("no usable rows in the {0} data")]
    NoRows(&'static str),
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error("training failed: {0}")]
    Model(String),
}

impl From<ModelError> for TrainingError {
    fn from(e: ModelError) -> Self {
        TrainingError::Model(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    GradientBoosting,
    RandomForest,
    Knn,
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "gradient-boosting" | "gbdt" => Ok(Algorithm::GradientBoosting),
            "random-forest" | "forest" => Ok(Algorithm::RandomForest),
            "knn" | "k-nn" => Ok(Algorithm::Knn),
            other => Err(format!(
                "unknown algorithm '{}'; expected gradient-boosting, random-forest or knn",
                other
            )),
        }
    }
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Algorithm::GradientBoosting => write!(f, "gradient-boosting"),
            Algorithm::RandomForest => write!(f, "random-forest"),
            Algorithm::Knn => write!(f, "knn"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainOptions {
    pub seed: u64,
    pub test_size: f64,
    /// Overrides the per-dataset default model family.
    pub algorithm: Option<Algorithm>,
    pub boosting: BoostingParams<f64>,
    pub forest_trees: usize,
    pub knn_k: usize,
    pub knn_metric: Metric,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            test_size: 0.2,
            algorithm: None,
            boosting: BoostingParams::default(),
            forest_trees: 200,
            knn_k: 5,
            knn_metric: Metric::L2,
        }
    }
}

/// A trained artifact with its held-out evaluation.
#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub artifact: PipelineArtifact,
    pub accuracy: f64,
    pub report: ClassificationReport,
    pub n_train: usize,
    pub n_test: usize,
}

impl TrainingRun {
    pub fn log_summary(&self, name: &str) {
        log::info!(
            "{} model ({}): accuracy {:.4} on {} held-out rows ({} for training)",
            name,
            self.artifact.model.algorithm(),
            self.accuracy,
            self.n_test,
            self.n_train
        );
        log::info!("{} classification report:\n{}", name, self.report.render(self.artifact.target.classes()));
    }
}

/// Crop recommendation: seven numeric columns plus `label`. Rows with a
/// non-numeric value or an empty label are dropped.
pub fn train_crop(table: &Table, opts: &TrainOptions) -> Result<TrainingRun, TrainingError> {
    let columns = CROP_FEATURES
        .iter()
        .map(|name| table.require(name))
        .collect::<Result<Vec<_>, _>>()?;
    let label_col = table.require("label")?;
    let feature_order: Vec<String> = columns.iter().map(|&c| table.headers()[c].clone()).collect();

    let (rows, labels) = numeric_rows(table, &columns, label_col, "crop");
    if rows.is_empty() {
        return Err(TrainingError::NoRows("crop"));
    }
    let target = LabelEncoder::fit(&labels);
    let data = to_points(rows, &labels, &target);

    let prepared = Prepared {
        data,
        target,
        feature_order,
        categorical: vec![],
        profiles: BTreeMap::new(),
    };
    fit_and_evaluate(prepared, opts.algorithm.unwrap_or(Algorithm::GradientBoosting), true, opts)
}

/// Fertilizer recommendation. `Temparature` is read as `Temperature`;
/// `Soil Type`, `Crop Type` and `Fertilizer Name` are required. Unparseable
/// numbers become 0 and rows without a fertilizer name are dropped.
pub fn train_fertilizer(table: &Table, opts: &TrainOptions) -> Result<TrainingRun, TrainingError> {
    let soil_col = table.require("Soil Type")?;
    let crop_col = table.require("Crop Type")?;
    let fert_col = table.require("Fertilizer Name")?;

    let column = |name: &str| {
        table.find_column(|h| {
            let h = if h.eq_ignore_ascii_case("temparature") { "Temperature" } else { h };
            h.eq_ignore_ascii_case(name)
        })
    };
    let mut feature_order = vec!["soil_enc".to_string(), "crop_enc".to_string()];
    let mut numeric = Vec::new();
    for name in std::iter::once("Moisture").chain(FERTILIZER_NUMERIC) {
        if let Some(c) = column(name) {
            feature_order.push(name.to_string());
            numeric.push(c);
        }
    }

    let rows: Vec<&Vec<String>> = table
        .rows()
        .iter()
        .filter(|r| !r[fert_col].is_empty())
        .collect();
    if rows.is_empty() {
        return Err(TrainingError::NoRows("fertilizer"));
    }
    let dropped = table.len() - rows.len();
    if dropped > 0 {
        log::warn!("dropped {} fertilizer rows without a fertilizer name", dropped);
    }

    let soil = LabelEncoder::fit(rows.iter().map(|r| r[soil_col].as_str()));
    let crop = LabelEncoder::fit(rows.iter().map(|r| r[crop_col].as_str()));
    let target = LabelEncoder::fit(rows.iter().map(|r| r[fert_col].as_str()));

    let mut data = Vec::with_capacity(rows.len());
    for r in &rows {
        let mut features = Vec::with_capacity(feature_order.len());
        features.push(encoded(&soil, &r[soil_col]));
        features.push(encoded(&crop, &r[crop_col]));
        features.extend(numeric.iter().map(|&c| r[c].parse::<f64>().unwrap_or(0.0)));
        let label = target.encode(&r[fert_col]).unwrap_or_default();
        data.push(DataPoint::new(Array1::from(features), label));
    }

    let categorical = vec![
        CategoricalSlot { slot: "soil_enc".to_string(), field: "soil_type".to_string(), encoder: soil },
        CategoricalSlot { slot: "crop_enc".to_string(), field: "crop".to_string(), encoder: crop },
    ];

    let prepared = Prepared { data, target, feature_order, categorical, profiles: BTreeMap::new() };
    fit_and_evaluate(prepared, opts.algorithm.unwrap_or(Algorithm::GradientBoosting), true, opts)
}

/// Crop suitability from climate alone. Profiles keep the first row seen
/// for every label.
pub fn train_suitability(table: &Table, opts: &TrainOptions) -> Result<TrainingRun, TrainingError> {
    let columns = CLIMATE_FEATURES
        .iter()
        .map(|name| table.require(name))
        .collect::<Result<Vec<_>, _>>()?;
    let label_col = table.require("label")?;
    let feature_order: Vec<String> = columns.iter().map(|&c| table.headers()[c].clone()).collect();

    let (rows, labels) = numeric_rows(table, &columns, label_col, "suitability");
    if rows.is_empty() {
        return Err(TrainingError::NoRows("suitability"));
    }

    let mut profiles = BTreeMap::new();
    for (row, label) in rows.iter().zip(&labels) {
        profiles.entry(label.clone()).or_insert(CropProfile {
            temperature: row[0],
            humidity: row[1],
            rainfall: row[2],
        });
    }

    let target = LabelEncoder::fit(&labels);
    let data = to_points(rows, &labels, &target);

    let prepared = Prepared { data, target, feature_order, categorical: vec![], profiles };
    fit_and_evaluate(prepared, opts.algorithm.unwrap_or(Algorithm::RandomForest), false, opts)
}

fn encoded(encoder: &LabelEncoder, value: &str) -> f64 {
    encoder.encode(value).map_or(0.0, |i| i as f64)
}

/// Rows whose `columns` all parse as finite numbers and whose label is set.
fn numeric_rows(
    table: &Table,
    columns: &[usize],
    label_col: usize,
    name: &str,
) -> (Vec<Vec<f64>>, Vec<String>) {
    let mut rows = Vec::new();
    let mut labels = Vec::new();
    for record in table.rows() {
        let label = record[label_col].as_str();
        let values: Option<Vec<f64>> = columns
            .iter()
            .map(|&c| record[c].parse::<f64>().ok().filter(|v| v.is_finite()))
            .collect();
        if let (Some(values), false) = (values, label.is_empty()) {
            rows.push(values);
            labels.push(label.to_string());
        }
    }
    let dropped = table.len() - rows.len();
    if dropped > 0 {
        log::warn!("dropped {} {} rows with missing or non-numeric values", dropped, name);
    }
    (rows, labels)
}

fn to_points(rows: Vec<Vec<f64>>, labels: &[String], target: &LabelEncoder) -> Vec<DataPoint<usize, f64>> {
    rows.into_iter()
        .zip(labels)
        .map(|(row, label)| DataPoint::new(Array1::from(row), target.encode(label).unwrap_or_default()))
        .collect()
}

/// A dataset turned into points, plus everything the artifact records
/// about how it was encoded.
struct Prepared {
    data: Vec<DataPoint<usize, f64>>,
    target: LabelEncoder,
    feature_order: Vec<String>,
    categorical: Vec<CategoricalSlot>,
    profiles: BTreeMap<String, CropProfile>,
}

fn fit_and_evaluate(
    prepared: Prepared,
    algorithm: Algorithm,
    stratify: bool,
    opts: &TrainOptions,
) -> Result<TrainingRun, TrainingError> {
    let Prepared { data, target, feature_order, categorical, profiles } = prepared;
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(opts.seed);
    let n_classes = target.len();
    let (train, test) = train_test_split(data, opts.test_size, stratify, &mut rng)?;
    log::info!(
        "training {} on {} rows, {} classes, {} features",
        algorithm,
        train.len(),
        n_classes,
        feature_order.len()
    );

    let model = fit_model(algorithm, &train, n_classes, opts, &mut rng)?;

    let y_true: Vec<usize> = test.iter().map(|dp| dp.label).collect();
    let y_pred = test
        .iter()
        .map(|dp| model.predict(dp.features.view()))
        .collect::<Result<Vec<_>, _>>()?;
    let report = ClassificationReport::new(&y_true, &y_pred, n_classes);

    let artifact = PipelineArtifact { model, target, feature_order, categorical, profiles };
    artifact
        .validate()
        .map_err(|e| TrainingError::Model(e.to_string()))?;

    Ok(TrainingRun {
        artifact,
        accuracy: report.accuracy,
        report,
        n_train: train.len(),
        n_test: test.len(),
    })
}

fn fit_model(
    algorithm: Algorithm,
    train: &[DataPoint<usize, f64>],
    n_classes: usize,
    opts: &TrainOptions,
    rng: &mut Xoshiro256PlusPlus,
) -> Result<Model, TrainingError> {
    let distinct: HashSet<usize> = train.iter().map(|dp| dp.label).collect();
    if distinct.len() < n_classes {
        log::warn!(
            "{} of {} classes have no training rows after the split",
            n_classes - distinct.len(),
            n_classes
        );
    }

    let model = match algorithm {
        Algorithm::GradientBoosting => Model::GradientBoosting(
            GradientBoostingClassifier::fit(&opts.boosting, train, n_classes)
                .map_err(ModelError::from)?,
        ),
        Algorithm::RandomForest => {
            let params = ForestParams { n_trees: opts.forest_trees, ..ForestParams::default() };
            Model::RandomForest(
                RandomForestClassifier::fit(&params, train, n_classes, rng).map_err(ModelError::from)?,
            )
        }
        Algorithm::Knn => Model::Knn(
            KnnClassifier::new(opts.knn_k, train.to_vec(), n_classes, opts.knn_metric)
                .map_err(ModelError::from)?,
        ),
    };
    Ok(model)
}
