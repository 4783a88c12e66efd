use agrirec_helpers::{Metric, ProbabilisticClassifier};
use gradient_boosting::{BoostingError, GradientBoostingClassifier};
use k_nn::{KnnClassifier, KnnError};
use ndarray::{Array1, ArrayView1};
use random_forest::{ForestError, RandomForestClassifier};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A trained classifier as stored in an artifact, tagged by `"algorithm"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum Model {
    GradientBoosting(GradientBoostingClassifier<f64>),
    RandomForest(RandomForestClassifier<f64>),
    Knn(KnnClassifier<f64, Metric>),
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Boosting(#[from] BoostingError),
    #[error(transparent)]
    Forest(#[from] ForestError),
    #[error(transparent)]
    Knn(#[from] KnnError),
}

impl Model {
    pub fn algorithm(&self) -> &'static str {
        match self {
            Model::GradientBoosting(_) => "gradient_boosting",
            Model::RandomForest(_) => "random_forest",
            Model::Knn(_) => "knn",
        }
    }
}

impl ProbabilisticClassifier<f64> for Model {
    type Error = ModelError;

    fn n_features(&self) -> usize {
        match self {
            Model::GradientBoosting(m) => m.n_features(),
            Model::RandomForest(m) => m.n_features(),
            Model::Knn(m) => m.n_features(),
        }
    }

    fn n_classes(&self) -> usize {
        match self {
            Model::GradientBoosting(m) => m.n_classes(),
            Model::RandomForest(m) => m.n_classes(),
            Model::Knn(m) => m.n_classes(),
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        match self {
            Model::GradientBoosting(m) => m.validate()?,
            Model::RandomForest(m) => m.validate()?,
            Model::Knn(m) => m.validate()?,
        }
        Ok(())
    }

    fn predict_proba(&self, features: ArrayView1<f64>) -> Result<Array1<f64>, ModelError> {
        Ok(match self {
            Model::GradientBoosting(m) => m.predict_proba(features)?,
            Model::RandomForest(m) => m.predict_proba(features)?,
            Model::Knn(m) => m.predict_proba(features)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrirec_helpers::DataPoint;
    use ndarray::array;

    fn knn() -> Model {
        let data = vec![
            DataPoint::new(array![0.0, 0.0], 0),
            DataPoint::new(array![10.0, 10.0], 1),
        ];
        Model::Knn(KnnClassifier::new(1, data, 2, Metric::L2).unwrap())
    }

    #[test]
    fn test_dispatch() {
        let model = knn();
        assert_eq!(model.algorithm(), "knn");
        assert_eq!(model.n_features(), 2);
        assert_eq!(model.n_classes(), 2);
        assert_eq!(model.predict(array![9.0, 9.0].view()).unwrap(), 1);
        assert!(matches!(
            model.predict(array![1.0].view()),
            Err(ModelError::Knn(KnnError::DimensionMismatch { expected: 2, got: 1 }))
        ));
    }

    #[test]
    fn test_json_is_tagged_by_algorithm() {
        let json = serde_json::to_value(knn()).unwrap();
        assert_eq!(json["algorithm"], "knn");
        let back: Model = serde_json::from_value(json).unwrap();
        assert_eq!(back, knn());
    }
}
