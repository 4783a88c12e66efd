use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::hash::Hash;

use crate::{DataPoint, Float};

/// Errors that can occur while splitting a data set.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitError {
    /// The data set is empty.
    EmptyDataSet,
    /// The test fraction must lie strictly between 0 and 1.
    InvalidTestSize(f64),
}

impl Display for SplitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitError::EmptyDataSet => write!(f, "Cannot split an empty data set"),
            SplitError::InvalidTestSize(size) => {
                write!(f, "Test size must be in (0, 1), got {}", size)
            }
        }
    }
}

impl Error for SplitError {}

/// Shuffles `data` and splits it into `(train, test)`.
///
/// With `stratify`, every label keeps roughly the same share in both halves;
/// labels with a single sample always land in the training half. Without it,
/// the test half takes `round(len * test_size)` points.
pub fn train_test_split<L, F, R>(
    data: Vec<DataPoint<L, F>>,
    test_size: f64,
    stratify: bool,
    rng: &mut R,
) -> Result<(Vec<DataPoint<L, F>>, Vec<DataPoint<L, F>>), SplitError>
where
    L: Clone + Eq + Hash + Debug,
    F: Float,
    R: Rng + ?Sized,
{
    if data.is_empty() {
        return Err(SplitError::EmptyDataSet);
    }
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(SplitError::InvalidTestSize(test_size));
    }

    let mut test_idx: Vec<usize> = Vec::new();
    if stratify {
        // Group by label in first-seen order so the result only depends on the rng.
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut by_label: HashMap<&L, usize> = HashMap::new();
        for (i, dp) in data.iter().enumerate() {
            let g = *by_label.entry(&dp.label).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[g].push(i);
        }
        for mut group in groups {
            group.shuffle(rng);
            let n_test = if group.len() < 2 {
                0
            } else {
                ((group.len() as f64 * test_size).round() as usize).clamp(1, group.len() - 1)
            };
            test_idx.extend_from_slice(&group[..n_test]);
        }
    } else {
        let mut all: Vec<usize> = (0..data.len()).collect();
        all.shuffle(rng);
        let n_test = ((data.len() as f64 * test_size).round() as usize).min(data.len() - 1);
        test_idx.extend_from_slice(&all[..n_test]);
    }

    let mut is_test = vec![false; data.len()];
    for &i in &test_idx {
        is_test[i] = true;
    }

    let (test, train): (Vec<_>, Vec<_>) = data
        .into_iter()
        .zip(is_test)
        .partition(|(_, t)| *t);
    Ok((
        train.into_iter().map(|(dp, _)| dp).collect(),
        test.into_iter().map(|(dp, _)| dp).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn labelled(n_per_class: usize) -> Vec<DataPoint<usize, f64>> {
        (0..3usize)
            .flat_map(|c| {
                (0..n_per_class).map(move |i| DataPoint::new(array![i as f64, c as f64], c))
            })
            .collect()
    }

    #[test]
    fn test_stratified_split_keeps_class_shares() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let (train, test) = train_test_split(labelled(10), 0.2, true, &mut rng).unwrap();
        assert_eq!(train.len(), 24);
        assert_eq!(test.len(), 6);
        for c in 0..3 {
            assert_eq!(test.iter().filter(|dp| dp.label == c).count(), 2);
        }
    }

    #[test]
    fn test_plain_split_sizes_and_determinism() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let (train, test) = train_test_split(labelled(5), 0.2, false, &mut rng).unwrap();
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 12);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let (_, again) = train_test_split(labelled(5), 0.2, false, &mut rng).unwrap();
        assert_eq!(test, again);
    }

    #[test]
    fn test_split_errors() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let empty: Vec<DataPoint<usize, f64>> = vec![];
        assert_eq!(
            train_test_split(empty, 0.2, true, &mut rng).unwrap_err(),
            SplitError::EmptyDataSet
        );
        assert_eq!(
            train_test_split(labelled(2), 1.5, true, &mut rng).unwrap_err(),
            SplitError::InvalidTestSize(1.5)
        );
    }
}
