use std::cmp::Ordering;
use std::fmt::Debug;
use std::hash::Hash;

use agrirec_helpers::{feature_width, DataPoint, Float};
use ndarray::ArrayView1;

use crate::{leaf_value, midpoint, partition_in_place, Node, TreeError};

/// Growth limits and regularisation for [`RegressionTree`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct RegressionParams<F> {
    pub max_depth: usize,
    /// Minimum hessian sum on each side of a split.
    pub min_child_weight: F,
    /// L2 penalty on leaf weights.
    pub lambda: F,
    /// Minimum gain for a split to be kept.
    pub gamma: F,
}

impl<F: Float> Default for RegressionParams<F> {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_child_weight: F::one(),
            lambda: F::one(),
            gamma: F::zero(),
        }
    }
}

/// A regression tree fitted to per-sample gradients and hessians.
///
/// Each leaf stores the weight `-G / (H + lambda)` over the samples it
/// holds, and splits maximise the matching second-order gain.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct RegressionTree<F> {
    n_features: usize,
    nodes: Vec<Node<F>>,
}

impl<F: Float> RegressionTree<F> {
    pub fn fit<L>(
        params: &RegressionParams<F>,
        data: &[DataPoint<L, F>],
        grad: &[F],
        hess: &[F],
    ) -> Result<Self, TreeError>
    where
        L: Clone + Eq + Hash + Debug,
    {
        if data.is_empty() {
            return Err(TreeError::EmptyDataSet);
        }
        if !(params.lambda >= F::zero()) || !(params.min_child_weight >= F::zero()) {
            return Err(TreeError::InvalidParams(
                "lambda and min_child_weight must be non-negative".to_string(),
            ));
        }
        for slice in [grad, hess] {
            if slice.len() != data.len() {
                return Err(TreeError::GradientLength { expected: data.len(), got: slice.len() });
            }
        }
        let n_features = feature_width(data).ok_or(TreeError::MismatchedDimensions)?;

        let mut grower = Grower { params, data, grad, hess, n_features, nodes: Vec::new() };
        let mut indices: Vec<usize> = (0..data.len()).collect();
        grower.grow(&mut indices, 0);
        Ok(Self { n_features, nodes: grower.nodes })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn predict_value(&self, features: ArrayView1<F>) -> Result<F, TreeError> {
        if features.len() != self.n_features {
            return Err(TreeError::DimensionMismatch {
                expected: self.n_features,
                got: features.len(),
            });
        }
        leaf_value(&self.nodes, features)?
            .first()
            .copied()
            .ok_or(TreeError::MalformedTree)
    }
}

struct Grower<'a, L: Clone + Eq + Hash + Debug, F: Float> {
    params: &'a RegressionParams<F>,
    data: &'a [DataPoint<L, F>],
    grad: &'a [F],
    hess: &'a [F],
    n_features: usize,
    nodes: Vec<Node<F>>,
}

impl<L: Clone + Eq + Hash + Debug, F: Float> Grower<'_, L, F> {
    fn grow(&mut self, indices: &mut [usize], depth: usize) -> usize {
        let g: F = indices.iter().map(|&i| self.grad[i]).sum();
        let h: F = indices.iter().map(|&i| self.hess[i]).sum();

        if depth < self.params.max_depth && indices.len() > 1 {
            if let Some((feature, threshold)) = self.best_split(indices, g, h) {
                let id = self.nodes.len();
                self.nodes.push(Node::Leaf { value: Vec::new() });

                let data = self.data;
                let mid = partition_in_place(indices, |i| data[i].features[feature] <= threshold);
                let (left_idx, right_idx) = indices.split_at_mut(mid);
                let left = self.grow(left_idx, depth + 1);
                let right = self.grow(right_idx, depth + 1);

                self.nodes[id] = Node::Split { feature, threshold, left, right };
                return id;
            }
        }

        let weight = -g / (h + self.params.lambda);
        self.nodes.push(Node::Leaf { value: vec![weight] });
        self.nodes.len() - 1
    }

    fn score(&self, g: F, h: F) -> F {
        g * g / (h + self.params.lambda)
    }

    fn best_split(&self, indices: &[usize], g: F, h: F) -> Option<(usize, F)> {
        let parent = self.score(g, h);
        let mcw = self.params.min_child_weight;
        let mut best: Option<(usize, F, F)> = None;
        let mut order = indices.to_vec();

        for feature in 0..self.n_features {
            let data = self.data;
            order.sort_by(|&a, &b| {
                data[a].features[feature]
                    .partial_cmp(&data[b].features[feature])
                    .unwrap_or(Ordering::Equal)
            });

            let mut gl = F::zero();
            let mut hl = F::zero();
            for pos in 1..order.len() {
                gl += self.grad[order[pos - 1]];
                hl += self.hess[order[pos - 1]];
                let lo = data[order[pos - 1]].features[feature];
                let hi = data[order[pos]].features[feature];
                if !(lo < hi) {
                    continue;
                }
                let (gr, hr) = (g - gl, h - hl);
                if hl < mcw || hr < mcw {
                    continue;
                }
                let gain = self.score(gl, hl) + self.score(gr, hr) - parent;
                if best.is_none_or(|(_, _, b)| gain > b) {
                    best = Some((feature, midpoint(lo, hi), gain));
                }
            }
        }

        best.filter(|&(_, _, gain)| gain > self.params.gamma && gain > F::epsilon())
            .map(|(feature, threshold, _)| (feature, threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn step_data() -> (Vec<DataPoint<(), f64>>, Vec<f64>, Vec<f64>) {
        let data: Vec<_> = [1.0, 2.0, 3.0, 10.0, 11.0, 12.0]
            .iter()
            .map(|&x| DataPoint::new(array![x], ()))
            .collect();
        // Squared-error gradients for targets 0 (left) and 6 (right) at prediction 0.
        let grad = vec![0.0, 0.0, 0.0, -6.0, -6.0, -6.0];
        let hess = vec![1.0; 6];
        (data, grad, hess)
    }

    #[test]
    fn test_learns_a_step() {
        let (data, grad, hess) = step_data();
        let params = RegressionParams { lambda: 0.0, ..RegressionParams::default() };
        let tree = RegressionTree::fit(&params, &data, &grad, &hess).unwrap();
        assert_abs_diff_eq!(tree.predict_value(array![2.0].view()).unwrap(), 0.0);
        assert_abs_diff_eq!(tree.predict_value(array![11.0].view()).unwrap(), 6.0);
        assert_abs_diff_eq!(tree.predict_value(array![6.0].view()).unwrap(), 0.0);
    }

    #[test]
    fn test_lambda_shrinks_leaf_weights() {
        let (data, grad, hess) = step_data();
        let tree = RegressionTree::fit(&RegressionParams::default(), &data, &grad, &hess).unwrap();
        // -(-18) / (3 + 1)
        assert_abs_diff_eq!(tree.predict_value(array![12.0].view()).unwrap(), 4.5);
    }

    #[test]
    fn test_depth_zero_is_a_single_leaf() {
        let (data, grad, hess) = step_data();
        let params = RegressionParams { max_depth: 0, lambda: 0.0, ..RegressionParams::default() };
        let tree = RegressionTree::fit(&params, &data, &grad, &hess).unwrap();
        assert_abs_diff_eq!(tree.predict_value(array![1.0].view()).unwrap(), 3.0);
    }

    #[test]
    fn test_min_child_weight_blocks_small_children() {
        let (data, grad, hess) = step_data();
        let params = RegressionParams {
            min_child_weight: 4.0,
            lambda: 0.0,
            ..RegressionParams::default()
        };
        let tree = RegressionTree::fit(&params, &data, &grad, &hess).unwrap();
        assert_abs_diff_eq!(tree.predict_value(array![12.0].view()).unwrap(), 3.0);
    }

    #[test]
    fn test_gradient_length_checked() {
        let (data, grad, _) = step_data();
        assert_eq!(
            RegressionTree::fit(&RegressionParams::default(), &data, &grad, &[1.0]).unwrap_err(),
            TreeError::GradientLength { expected: 6, got: 1 }
        );
    }
}
