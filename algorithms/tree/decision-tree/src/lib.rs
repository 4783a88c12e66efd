//! CART decision trees.
//!
//! Two growers share one node layout: [`DecisionTreeClassifier`] splits on
//! Gini impurity and stores a class distribution per leaf, while
//! [`RegressionTree`] splits on second-order gradient statistics and stores a
//! single weight per leaf, which is what gradient boosting needs.

use std::error::Error;
use std::fmt::{Display, Formatter};

use agrirec_helpers::Float;
use ndarray::ArrayView1;
use rand::Rng;

mod classifier;
mod regressor;

pub use classifier::DecisionTreeClassifier;
pub use regressor::{RegressionParams, RegressionTree};

/// Errors that can occur while growing or querying a tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeError {
    /// No samples to grow from.
    EmptyDataSet,
    /// Training points do not all have the same number of features.
    MismatchedDimensions,
    /// A training label is not below the declared number of classes.
    LabelOutOfRange { label: usize, n_classes: usize },
    /// A hyper-parameter is out of range.
    InvalidParams(String),
    /// The query point does not have the training feature width.
    DimensionMismatch { expected: usize, got: usize },
    /// Gradient or hessian slices do not cover the data set.
    GradientLength { expected: usize, got: usize },
    /// A node refers to a child that does not exist.
    MalformedTree,
}

impl Display for TreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TreeError::EmptyDataSet => write!(f, "Cannot grow a tree from an empty data set"),
            TreeError::MismatchedDimensions => {
                write!(f, "Training points have differing feature counts")
            }
            TreeError::LabelOutOfRange { label, n_classes } => {
                write!(f, "Label {} is out of range for {} classes", label, n_classes)
            }
            TreeError::InvalidParams(msg) => write!(f, "Invalid tree parameters: {}", msg),
            TreeError::DimensionMismatch { expected, got } => {
                write!(f, "Expected {} features, got {}", expected, got)
            }
            TreeError::GradientLength { expected, got } => {
                write!(f, "Expected {} gradient entries, got {}", expected, got)
            }
            TreeError::MalformedTree => write!(f, "Tree structure is malformed"),
        }
    }
}

impl Error for TreeError {}

/// How many features each split may look at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate", rename_all = "snake_case")
)]
pub enum MaxFeatures {
    #[default]
    All,
    Sqrt,
    Log2,
    Count(usize),
}

impl MaxFeatures {
    /// The concrete count for `n_features`, always in `1..=n_features`.
    pub fn resolve(self, n_features: usize) -> usize {
        let n = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt().round() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().round() as usize,
            MaxFeatures::Count(n) => n,
        };
        n.clamp(1, n_features.max(1))
    }
}

/// Growth limits for [`DecisionTreeClassifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct TreeParams {
    /// `None` grows until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
        }
    }
}

impl TreeParams {
    pub fn validate(&self) -> Result<(), TreeError> {
        if self.min_samples_split < 2 {
            return Err(TreeError::InvalidParams(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(TreeError::InvalidParams(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        if self.max_features == MaxFeatures::Count(0) {
            return Err(TreeError::InvalidParams("max_features cannot be 0".to_string()));
        }
        Ok(())
    }
}

/// Flat node storage; children always have larger indices than their parent.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate", rename_all = "snake_case")
)]
pub(crate) enum Node<F> {
    Leaf {
        value: Vec<F>,
    },
    Split {
        feature: usize,
        threshold: F,
        left: usize,
        right: usize,
    },
}

/// Walks from the root to the leaf `features` falls in. Values at or below a
/// threshold go left; NaN goes right.
pub(crate) fn leaf_value<'a, F: Float>(
    nodes: &'a [Node<F>],
    features: ArrayView1<F>,
) -> Result<&'a [F], TreeError> {
    let mut idx = 0;
    for _ in 0..nodes.len() {
        match nodes.get(idx) {
            Some(Node::Leaf { value }) => return Ok(value),
            Some(Node::Split { feature, threshold, left, right }) => {
                let x = features.get(*feature).ok_or(TreeError::MalformedTree)?;
                idx = if *x <= *threshold { *left } else { *right };
            }
            None => return Err(TreeError::MalformedTree),
        }
    }
    Err(TreeError::MalformedTree)
}

/// Picks the features a single split may consider.
pub(crate) fn candidate_features<R: Rng + ?Sized>(
    n_features: usize,
    max_features: usize,
    rng: &mut R,
) -> Vec<usize> {
    if max_features >= n_features {
        (0..n_features).collect()
    } else {
        rand::seq::index::sample(rng, n_features, max_features).into_vec()
    }
}

/// Moves every index satisfying `pred` to the front; returns how many did.
pub(crate) fn partition_in_place<P: Fn(usize) -> bool>(indices: &mut [usize], pred: P) -> usize {
    let mut mid = 0;
    for i in 0..indices.len() {
        if pred(indices[i]) {
            indices.swap(mid, i);
            mid += 1;
        }
    }
    mid
}

/// A threshold strictly between two sorted, distinct feature values.
pub(crate) fn midpoint<F: Float>(lo: F, hi: F) -> F {
    let mid = (lo + hi) / F::from_count(2);
    if mid < hi { mid } else { lo }
}
