use std::cmp::Ordering;

use agrirec_helpers::{feature_width, DataPoint, Float, ProbabilisticClassifier};
use ndarray::{Array1, ArrayView1};
use rand::Rng;

use crate::{
    candidate_features, leaf_value, midpoint, partition_in_place, Node, TreeError, TreeParams,
};

/// A CART classification tree grown on Gini impurity.
///
/// Leaves hold the class distribution of the training samples that reached
/// them, so `predict_proba` returns those fractions directly.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct DecisionTreeClassifier<F> {
    n_features: usize,
    n_classes: usize,
    nodes: Vec<Node<F>>,
}

impl<F: Float> DecisionTreeClassifier<F> {
    /// Grows a tree on every point in `data`.
    pub fn fit<R: Rng + ?Sized>(
        params: &TreeParams,
        data: &[DataPoint<usize, F>],
        n_classes: usize,
        rng: &mut R,
    ) -> Result<Self, TreeError> {
        let indices: Vec<usize> = (0..data.len()).collect();
        Self::fit_indices(params, data, &indices, n_classes, rng)
    }

    /// Grows a tree on the points of `data` named by `indices`. Indices may
    /// repeat, which is how bootstrap samples are passed in.
    pub fn fit_indices<R: Rng + ?Sized>(
        params: &TreeParams,
        data: &[DataPoint<usize, F>],
        indices: &[usize],
        n_classes: usize,
        rng: &mut R,
    ) -> Result<Self, TreeError> {
        params.validate()?;
        if indices.is_empty() || data.is_empty() {
            return Err(TreeError::EmptyDataSet);
        }
        let n_features = feature_width(data).ok_or(TreeError::MismatchedDimensions)?;
        if indices.iter().any(|&i| i >= data.len()) {
            return Err(TreeError::InvalidParams(
                "sample index outside the data set".to_string(),
            ));
        }
        if let Some(dp) = data.iter().find(|dp| dp.label >= n_classes) {
            return Err(TreeError::LabelOutOfRange { label: dp.label, n_classes });
        }

        let mut grower = Grower {
            params,
            data,
            n_classes,
            n_features,
            max_features: params.max_features.resolve(n_features),
            rng,
            nodes: Vec::new(),
        };
        let mut working = indices.to_vec();
        grower.grow(&mut working, 0);

        Ok(Self { n_features, n_classes, nodes: grower.nodes })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

impl<F: Float> ProbabilisticClassifier<F> for DecisionTreeClassifier<F> {
    type Error = TreeError;

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict_proba(&self, features: ArrayView1<F>) -> Result<Array1<F>, TreeError> {
        if features.len() != self.n_features {
            return Err(TreeError::DimensionMismatch {
                expected: self.n_features,
                got: features.len(),
            });
        }
        let value = leaf_value(&self.nodes, features)?;
        if value.len() != self.n_classes {
            return Err(TreeError::MalformedTree);
        }
        Ok(Array1::from(value.to_vec()))
    }
}

struct Grower<'a, F: Float, R: ?Sized> {
    params: &'a TreeParams,
    data: &'a [DataPoint<usize, F>],
    n_classes: usize,
    n_features: usize,
    max_features: usize,
    rng: &'a mut R,
    nodes: Vec<Node<F>>,
}

struct Candidate<F> {
    feature: usize,
    threshold: F,
    impurity: F,
}

impl<F: Float, R: Rng + ?Sized> Grower<'_, F, R> {
    fn grow(&mut self, indices: &mut [usize], depth: usize) -> usize {
        let counts = self.class_counts(indices);
        let n = indices.len();
        let splittable = n >= self.params.min_samples_split
            && self.params.max_depth.is_none_or(|d| depth < d)
            && counts.iter().filter(|&&c| c > 0).count() > 1;

        if splittable {
            if let Some(best) = self.best_split(indices, &counts) {
                let id = self.nodes.len();
                self.nodes.push(Node::Leaf { value: Vec::new() });

                let data = self.data;
                let mid = partition_in_place(indices, |i| {
                    data[i].features[best.feature] <= best.threshold
                });
                let (left_idx, right_idx) = indices.split_at_mut(mid);
                let left = self.grow(left_idx, depth + 1);
                let right = self.grow(right_idx, depth + 1);

                self.nodes[id] = Node::Split {
                    feature: best.feature,
                    threshold: best.threshold,
                    left,
                    right,
                };
                return id;
            }
        }

        let total = F::from_count(n);
        let value = counts.iter().map(|&c| F::from_count(c) / total).collect();
        self.nodes.push(Node::Leaf { value });
        self.nodes.len() - 1
    }

    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &i in indices {
            counts[self.data[i].label] += 1;
        }
        counts
    }

    /// Lowest weighted Gini over the candidate features, if any split
    /// improves on the parent.
    fn best_split(&mut self, indices: &[usize], counts: &[usize]) -> Option<Candidate<F>> {
        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf;
        let parent: F = weighted_gini(counts.iter().copied(), n);
        let features = candidate_features(self.n_features, self.max_features, &mut *self.rng);

        let mut best: Option<Candidate<F>> = None;
        let mut order = indices.to_vec();
        let mut left = vec![0usize; self.n_classes];

        for feature in features {
            let data = self.data;
            order.sort_by(|&a, &b| {
                data[a].features[feature]
                    .partial_cmp(&data[b].features[feature])
                    .unwrap_or(Ordering::Equal)
            });
            left.iter_mut().for_each(|c| *c = 0);

            for pos in 1..n {
                left[data[order[pos - 1]].label] += 1;
                if pos < min_leaf || n - pos < min_leaf {
                    continue;
                }
                let lo = data[order[pos - 1]].features[feature];
                let hi = data[order[pos]].features[feature];
                if !(lo < hi) {
                    continue;
                }
                let impurity: F = weighted_gini::<F, _>(left.iter().copied(), pos)
                    + weighted_gini::<F, _>(counts.iter().zip(&left).map(|(t, l)| t - l), n - pos);
                if best.as_ref().is_none_or(|b| impurity < b.impurity) {
                    best = Some(Candidate { feature, threshold: midpoint(lo, hi), impurity });
                }
            }
        }

        let tolerance = F::epsilon() * F::from_count(n);
        best.filter(|b| b.impurity < parent - tolerance)
    }
}

/// `n * gini`, i.e. `n - sum(c^2) / n`.
fn weighted_gini<F: Float, I: Iterator<Item = usize>>(counts: I, n: usize) -> F {
    if n == 0 {
        return F::zero();
    }
    let total = F::from_count(n);
    let squares: F = counts.map(|c| F::from_count(c) * F::from_count(c)).sum();
    total - squares / total
}
