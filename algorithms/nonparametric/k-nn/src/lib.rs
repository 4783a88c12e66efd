use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
// These are the core components from our shared library.
use agrirec_helpers::{feature_width, DataPoint, Distance, ProbabilisticClassifier};

// ndarray and agrirec_helpers are used in the public function signatures.
use ndarray::{Array1, ArrayView1};
use agrirec_helpers::Float;
/// Errors that can occur when using the k-NN classifier.
#[derive(Debug, Clone, PartialEq)]
pub enum KnnError {
    /// k cannot be zero for a k-NN classifier
    InvalidK,
    /// Cannot predict with an empty training set
    EmptyTrainingSet,
    /// Invalid distance comparison (likely due to NaN values in data)
    InvalidDistance,
    /// Training points do not all have the same number of features
    MismatchedDimensions,
    /// A training label is not below the declared number of classes
    LabelOutOfRange { label: usize, n_classes: usize },
    /// The query point does not have the training feature width
    DimensionMismatch { expected: usize, got: usize },
}

impl Display for KnnError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            KnnError::InvalidK => write!(f, "k cannot be zero for a k-NN classifier"),
            KnnError::EmptyTrainingSet => write!(f, "Cannot predict with an empty training set"),
            KnnError::InvalidDistance => write!(
                f,
                "Invalid distance comparison (likely due to NaN values in data)"
            ),
            KnnError::MismatchedDimensions => {
                write!(f, "Training points have differing feature counts")
            }
            KnnError::LabelOutOfRange { label, n_classes } => {
                write!(f, "Label {} is out of range for {} classes", label, n_classes)
            }
            KnnError::DimensionMismatch { expected, got } => {
                write!(f, "Expected {} features, got {}", expected, got)
            }
        }
    }
}

impl Error for KnnError {}

/// A k-Nearest Neighbors (k-NN) classifier.
///
/// This classifier predicts the class of a new data point by finding the `k`
/// most similar points in its training set. The share of each class among
/// those neighbours is reported as its probability.
///
/// # Type Parameters
///
/// * `F`: The float type for the features (e.g., `f32`, `f64`).
/// * `D`: The distance metric, which must implement the `agrirec_helpers::Distance` trait.
///
/// Labels are class indices in `0..n_classes`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct KnnClassifier<F, D>
where
    F: Float,
    D: Distance<F>,
{
    k: usize,
    n_classes: usize,
    training_data: Vec<DataPoint<usize, F>>,
    distance: D,
}

impl<F, D> KnnClassifier<F, D>
where
    F: Float,
    D: Distance<F>,
{
    /// Creates a new k-NN classifier.
    ///
    /// # Arguments
    ///
    /// * `k`: The number of neighbors to consider for classification. Must be greater than 0.
    /// * `training_data`: A vector of `DataPoint`s that the classifier will learn from.
    /// * `n_classes`: The number of classes; every label must be below it.
    /// * `distance`: An instance of a struct that implements the `Distance` trait (e.g., `L2Dist`).
    ///
    /// # Errors
    ///
    /// Returns `KnnError::InvalidK` if `k` is 0, as this is not a valid configuration.
    /// Returns `KnnError::MismatchedDimensions` for ragged training data and
    /// `KnnError::LabelOutOfRange` for labels outside `0..n_classes`.
    pub fn new(
        k: usize,
        training_data: Vec<DataPoint<usize, F>>,
        n_classes: usize,
        distance: D,
    ) -> Result<Self, KnnError> {
        check(k, &training_data, n_classes)?;
        Ok(Self {
            k,
            n_classes,
            training_data,
            distance,
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn distance(&self) -> &D {
        &self.distance
    }

    /// Scores every class by its share of the `k` nearest neighbours.
    ///
    /// # Errors
    ///
    /// Returns `KnnError::EmptyTrainingSet` if the training data is empty.
    /// Returns `KnnError::DimensionMismatch` if `features` has the wrong width.
    /// Returns `KnnError::InvalidDistance` if a distance is NaN.
    pub fn vote_shares(&self, features: ArrayView1<F>) -> Result<Array1<F>, KnnError> {
        if self.k == 0 {
            return Err(KnnError::InvalidK);
        }
        let width = match self.training_data.first() {
            Some(dp) => dp.features.len(),
            None => return Err(KnnError::EmptyTrainingSet),
        };
        if features.len() != width {
            return Err(KnnError::DimensionMismatch { expected: width, got: features.len() });
        }

        // 1. Calculate the "relative distance" (e.g., squared Euclidean) from the new point
        //    to every point in the training set. This is faster than the true distance.
        let mut distances: Vec<(F, usize)> = Vec::with_capacity(self.training_data.len());
        for dp in &self.training_data {
            let dist = self.distance.rdistance(dp.features.view(), features);
            if dist.is_nan() {
                return Err(KnnError::InvalidDistance);
            }
            distances.push((dist, dp.label));
        }

        // 2. Sort by distance. The sort is stable, so equidistant points keep
        //    their training order and repeated calls pick the same neighbours.
        distances.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        // 3. Take the top `k` neighbors.
        //    We use `min` to handle cases where k is larger than the training set size.
        let num_neighbors = self.k.min(distances.len());

        // 4. Count the votes for each class among the neighbors.
        let mut votes = Array1::<F>::zeros(self.n_classes);
        for &(_, label) in &distances[..num_neighbors] {
            let slot = votes.get_mut(label).ok_or(KnnError::LabelOutOfRange {
                label,
                n_classes: self.n_classes,
            })?;
            *slot += F::one();
        }
        votes /= F::from_count(num_neighbors);
        Ok(votes)
    }
}

impl<F, D> ProbabilisticClassifier<F> for KnnClassifier<F, D>
where
    F: Float,
    D: Distance<F>,
{
    type Error = KnnError;

    fn n_features(&self) -> usize {
        self.training_data.first().map_or(0, |dp| dp.features.len())
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn validate(&self) -> Result<(), KnnError> {
        check(self.k, &self.training_data, self.n_classes)
    }

    fn predict_proba(&self, features: ArrayView1<F>) -> Result<Array1<F>, KnnError> {
        self.vote_shares(features)
    }
}

/// The constructor invariants: `k > 0`, one feature width, labels below `n_classes`.
fn check<F: Float>(
    k: usize,
    training_data: &[DataPoint<usize, F>],
    n_classes: usize,
) -> Result<(), KnnError> {
    if k == 0 {
        return Err(KnnError::InvalidK);
    }
    if !training_data.is_empty() && feature_width(training_data).is_none() {
        return Err(KnnError::MismatchedDimensions);
    }
    if let Some(dp) = training_data.iter().find(|dp| dp.label >= n_classes) {
        return Err(KnnError::LabelOutOfRange { label: dp.label, n_classes });
    }
    Ok(())
}
