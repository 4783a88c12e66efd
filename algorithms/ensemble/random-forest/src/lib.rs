use std::error::Error;
use std::fmt::{Display, Formatter};

use agrirec_helpers::{DataPoint, Float, ProbabilisticClassifier};
use decision_tree::{DecisionTreeClassifier, MaxFeatures, TreeError, TreeParams};
use ndarray::{Array1, ArrayView1};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;

/// Errors that can occur when training or querying a random forest.
#[derive(Debug, Clone, PartialEq)]
pub enum ForestError {
    /// A forest needs at least one tree
    InvalidTreeCount,
    /// A forest with no trees cannot predict
    EmptyForest,
    /// Growing or querying one of the trees failed
    Tree(TreeError),
}

impl Display for ForestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ForestError::InvalidTreeCount => write!(f, "A forest needs at least one tree"),
            ForestError::EmptyForest => write!(f, "Cannot predict with an empty forest"),
            ForestError::Tree(e) => write!(f, "Tree error: {}", e),
        }
    }
}

impl Error for ForestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ForestError::Tree(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TreeError> for ForestError {
    fn from(e: TreeError) -> Self {
        ForestError::Tree(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct ForestParams {
    pub n_trees: usize,
    pub tree: TreeParams,
    /// Grow each tree on a sample drawn with replacement.
    pub bootstrap: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            tree: TreeParams { max_features: MaxFeatures::Sqrt, ..TreeParams::default() },
            bootstrap: true,
        }
    }
}

/// A bagged ensemble of CART trees; class probabilities are the mean of
/// the per-tree leaf distributions.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct RandomForestClassifier<F> {
    n_features: usize,
    n_classes: usize,
    trees: Vec<DecisionTreeClassifier<F>>,
}

impl<F: Float> RandomForestClassifier<F> {
    /// Trains `params.n_trees` trees in parallel.
    ///
    /// One seed per tree is drawn from `rng` up front, so the result depends
    /// only on `rng` and not on how rayon schedules the work.
    pub fn fit<R: Rng + ?Sized>(
        params: &ForestParams,
        data: &[DataPoint<usize, F>],
        n_classes: usize,
        rng: &mut R,
    ) -> Result<Self, ForestError> {
        if params.n_trees == 0 {
            return Err(ForestError::InvalidTreeCount);
        }
        let seeds: Vec<u64> = (0..params.n_trees).map(|_| rng.random()).collect();

        let trees = seeds
            .into_par_iter()
            .map(|seed| {
                let mut tree_rng = Xoshiro256PlusPlus::seed_from_u64(seed);
                let indices: Vec<usize> = if params.bootstrap {
                    (0..data.len())
                        .map(|_| tree_rng.random_range(0..data.len()))
                        .collect()
                } else {
                    (0..data.len()).collect()
                };
                DecisionTreeClassifier::fit_indices(
                    &params.tree,
                    data,
                    &indices,
                    n_classes,
                    &mut tree_rng,
                )
            })
            .collect::<Result<Vec<_>, TreeError>>()?;

        let n_features = trees.first().map_or(0, |t| t.n_features());
        Ok(Self { n_features, n_classes, trees })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl<F: Float> ProbabilisticClassifier<F> for RandomForestClassifier<F> {
    type Error = ForestError;

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn validate(&self) -> Result<(), ForestError> {
        if self.trees.is_empty() {
            return Err(ForestError::EmptyForest);
        }
        let consistent = self
            .trees
            .iter()
            .all(|t| t.n_features() == self.n_features && t.n_classes() == self.n_classes);
        if !consistent {
            return Err(ForestError::Tree(TreeError::MalformedTree));
        }
        Ok(())
    }

    fn predict_proba(&self, features: ArrayView1<F>) -> Result<Array1<F>, ForestError> {
        if self.trees.is_empty() {
            return Err(ForestError::EmptyForest);
        }
        let mut total = Array1::<F>::zeros(self.n_classes);
        for tree in &self.trees {
            let proba = tree.predict_proba(features)?;
            if proba.len() != self.n_classes {
                return Err(ForestError::Tree(TreeError::MalformedTree));
            }
            total += &proba;
        }
        total /= F::from_count(self.trees.len());
        Ok(total)
    }
}
