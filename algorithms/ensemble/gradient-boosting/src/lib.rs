//! Multiclass gradient boosting with a softmax objective.
//!
//! Every boosting round fits one [`RegressionTree`] per class to the
//! gradients of the cross-entropy loss, using the hessian approximation
//! `max(2 p (1 - p), eps)`. Scores are summed over rounds (scaled by the
//! learning rate) and turned into probabilities with a softmax.

use std::error::Error;
use std::fmt::{Display, Formatter};

use agrirec_helpers::{feature_width, DataPoint, Float, ProbabilisticClassifier};
use decision_tree::{RegressionParams, RegressionTree, TreeError};
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1};
use rayon::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub enum BoostingError {
    /// Softmax boosting needs at least two classes
    TooFewClasses(usize),
    /// Cannot train on an empty data set
    EmptyDataSet,
    /// Training points do not all have the same number of features
    MismatchedDimensions,
    /// A training label is not below the declared number of classes
    LabelOutOfRange { label: usize, n_classes: usize },
    /// A hyper-parameter is out of range
    InvalidParams(String),
    /// The query point does not have the training feature width
    DimensionMismatch { expected: usize, got: usize },
    /// Growing or querying a tree failed
    Tree(TreeError),
}

impl Display for BoostingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BoostingError::TooFewClasses(n) => {
                write!(f, "Gradient boosting needs at least 2 classes, got {}", n)
            }
            BoostingError::EmptyDataSet => write!(f, "Cannot train on an empty data set"),
            BoostingError::MismatchedDimensions => {
                write!(f, "Training points have differing feature counts")
            }
            BoostingError::LabelOutOfRange { label, n_classes } => {
                write!(f, "Label {} is out of range for {} classes", label, n_classes)
            }
            BoostingError::InvalidParams(msg) => write!(f, "Invalid boosting parameters: {}", msg),
            BoostingError::DimensionMismatch { expected, got } => {
                write!(f, "Expected {} features, got {}", expected, got)
            }
            BoostingError::Tree(e) => write!(f, "Tree error: {}", e),
        }
    }
}

impl Error for BoostingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BoostingError::Tree(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TreeError> for BoostingError {
    fn from(e: TreeError) -> Self {
        BoostingError::Tree(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct BoostingParams<F> {
    /// Number of boosting rounds.
    pub n_estimators: usize,
    pub learning_rate: F,
    pub tree: RegressionParams<F>,
}

impl<F: Float> Default for BoostingParams<F> {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: F::from_f64(0.3).unwrap_or_else(F::one),
            tree: RegressionParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct GradientBoostingClassifier<F> {
    n_features: usize,
    n_classes: usize,
    learning_rate: F,
    /// `rounds[r][k]` is the tree for class `k` in round `r`.
    rounds: Vec<Vec<RegressionTree<F>>>,
}

impl<F: Float> GradientBoostingClassifier<F> {
    pub fn fit(
        params: &BoostingParams<F>,
        data: &[DataPoint<usize, F>],
        n_classes: usize,
    ) -> Result<Self, BoostingError> {
        if n_classes < 2 {
            return Err(BoostingError::TooFewClasses(n_classes));
        }
        if params.n_estimators == 0 || !(params.learning_rate > F::zero()) {
            return Err(BoostingError::InvalidParams(
                "n_estimators and learning_rate must be positive".to_string(),
            ));
        }
        if data.is_empty() {
            return Err(BoostingError::EmptyDataSet);
        }
        let n_features = feature_width(data).ok_or(BoostingError::MismatchedDimensions)?;
        if let Some(dp) = data.iter().find(|dp| dp.label >= n_classes) {
            return Err(BoostingError::LabelOutOfRange { label: dp.label, n_classes });
        }

        let n = data.len();
        let eps = F::from_f64(1e-16).unwrap_or_else(F::epsilon);
        let mut margins = Array2::<F>::zeros((n, n_classes));
        let mut rounds = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let mut proba = margins.clone();
            for row in proba.rows_mut() {
                softmax_in_place(row);
            }

            let trees = (0..n_classes)
                .into_par_iter()
                .map(|k| {
                    let mut grad = Vec::with_capacity(n);
                    let mut hess = Vec::with_capacity(n);
                    for (i, dp) in data.iter().enumerate() {
                        let p = proba[[i, k]];
                        let y = if dp.label == k { F::one() } else { F::zero() };
                        grad.push(p - y);
                        hess.push((F::from_count(2) * p * (F::one() - p)).max(eps));
                    }
                    RegressionTree::fit(&params.tree, data, &grad, &hess)
                })
                .collect::<Result<Vec<_>, TreeError>>()?;

            for (k, tree) in trees.iter().enumerate() {
                for (i, dp) in data.iter().enumerate() {
                    margins[[i, k]] += params.learning_rate * tree.predict_value(dp.features.view())?;
                }
            }
            rounds.push(trees);
        }

        Ok(Self { n_features, n_classes, learning_rate: params.learning_rate, rounds })
    }

    pub fn n_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Raw per-class scores before the softmax.
    pub fn margins(&self, features: ArrayView1<F>) -> Result<Array1<F>, BoostingError> {
        if features.len() != self.n_features {
            return Err(BoostingError::DimensionMismatch {
                expected: self.n_features,
                got: features.len(),
            });
        }
        let mut margins = Array1::<F>::zeros(self.n_classes);
        for round in &self.rounds {
            if round.len() != self.n_classes {
                return Err(BoostingError::Tree(TreeError::MalformedTree));
            }
            for (k, tree) in round.iter().enumerate() {
                margins[k] += self.learning_rate * tree.predict_value(features)?;
            }
        }
        Ok(margins)
    }
}

impl<F: Float> ProbabilisticClassifier<F> for GradientBoostingClassifier<F> {
    type Error = BoostingError;

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn validate(&self) -> Result<(), BoostingError> {
        if self.n_classes < 2 {
            return Err(BoostingError::TooFewClasses(self.n_classes));
        }
        let consistent = self.rounds.iter().all(|round| {
            round.len() == self.n_classes && round.iter().all(|t| t.n_features() == self.n_features)
        });
        if !consistent {
            return Err(BoostingError::Tree(TreeError::MalformedTree));
        }
        Ok(())
    }

    fn predict_proba(&self, features: ArrayView1<F>) -> Result<Array1<F>, BoostingError> {
        let mut scores = self.margins(features)?;
        softmax_in_place(scores.view_mut());
        Ok(scores)
    }
}

fn softmax_in_place<F: Float>(mut values: ArrayViewMut1<F>) {
    let max = values.fold(F::neg_infinity(), |m, &v| m.max(v));
    values.mapv_inplace(|v| (v - max).exp());
    let total = values.sum();
    values /= total;
}
