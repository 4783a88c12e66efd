use ndarray::{Array1, ArrayView1, NdFloat, ScalarOperand};

use num_traits::{AsPrimitive, FromPrimitive, NumCast, Signed};
use rand::distr::uniform::SampleUniform;

use std::iter::Sum;
use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};

// Include submodules
mod common;
mod distance;
mod encoding;
mod metrics;
mod split;

// Re-export types from submodules
pub use common::{feature_width, DataPoint};
pub use distance::{Distance, L1Dist, L2Dist, LInfDist, Metric};
pub use encoding::{EncodingError, LabelEncoder};
pub use metrics::{accuracy, ClassMetrics, ClassificationReport};
pub use split::{train_test_split, SplitError};

pub trait Float:
    NdFloat
    + FromPrimitive
    + Default
    + Signed
    + Sum
    + AsPrimitive<usize>
    + for<'a> AddAssign<&'a Self>
    + for<'a> MulAssign<&'a Self>
    + for<'a> SubAssign<&'a Self>
    + for<'a> DivAssign<&'a Self>
    + num_traits::MulAdd<Output = Self>
    + SampleUniform
    + ScalarOperand
    + std::marker::Unpin
{
    fn cast<T: NumCast>(x: T) -> Option<Self> {
        NumCast::from(x)
    }

    /// Converts a sample or vote count. Counts always fit in `f32`/`f64`.
    fn from_count(n: usize) -> Self {
        <Self as NumCast>::from(n).unwrap_or_else(Self::max_value)
    }
}

impl Float for f32 {}

impl Float for f64 {}

/// A trained classifier that scores every known class.
///
/// Classes are identified by their index in `0..n_classes()`; mapping indices
/// back to human labels is the job of a [`LabelEncoder`].
pub trait ProbabilisticClassifier<F: Float> {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Width of the feature vector the classifier was trained on.
    fn n_features(&self) -> usize;

    fn n_classes(&self) -> usize;

    /// Re-checks the invariants the constructor enforces, for classifiers
    /// that were deserialized rather than trained.
    fn validate(&self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// One probability per class, summing to one.
    fn predict_proba(&self, features: ArrayView1<F>) -> Result<Array1<F>, Self::Error>;

    /// The most probable class. Ties go to the lowest class index.
    fn predict(&self, features: ArrayView1<F>) -> Result<usize, Self::Error> {
        let proba = self.predict_proba(features)?;
        Ok(argmax(proba.view()))
    }
}

/// Index of the largest value, preferring the earliest on ties. NaNs never win.
pub fn argmax<F: Float>(values: ArrayView1<F>) -> usize {
    let mut best = 0;
    let mut best_value = F::neg_infinity();
    for (i, &v) in values.iter().enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_argmax_prefers_first_on_ties() {
        assert_eq!(argmax(array![0.2, 0.4, 0.4].view()), 1);
        assert_eq!(argmax(array![f64::NAN, 0.1].view()), 1);
        assert_eq!(argmax(array![3.0_f32].view()), 0);
    }

    #[test]
    fn test_from_count() {
        assert_eq!(f64::from_count(7), 7.0);
        assert_eq!(f32::from_count(0), 0.0);
    }
}
