use std::fmt::{Display, Formatter};
use std::str::FromStr;

use ndarray::{ArrayView1, Zip};

use crate::Float;

/// A metric over feature vectors.
///
/// `rdistance` is a cheaper quantity with the same ordering as `distance`
/// (e.g. squared Euclidean). Neighbour searches only ever compare distances,
/// so they should call it instead.
pub trait Distance<F: Float> {
    fn distance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F;

    fn rdistance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        self.distance(a, b)
    }
}

/// Manhattan distance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct L1Dist;

impl<F: Float> Distance<F> for L1Dist {
    fn distance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        Zip::from(&a)
            .and(&b)
            .fold(F::zero(), |acc, &x, &y| acc + num_traits::Float::abs(x - y))
    }
}

/// Euclidean distance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct L2Dist;

impl<F: Float> Distance<F> for L2Dist {
    fn distance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        self.rdistance(a, b).sqrt()
    }

    fn rdistance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        Zip::from(&a).and(&b).fold(F::zero(), |acc, &x, &y| {
            let d = x - y;
            acc + d * d
        })
    }
}

/// Chebyshev distance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct LInfDist;

impl<F: Float> Distance<F> for LInfDist {
    fn distance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        Zip::from(&a)
            .and(&b)
            .fold(F::zero(), |acc, &x, &y| acc.max(num_traits::Float::abs(x - y)))
    }
}

/// Runtime-selectable metric, for models whose metric is chosen from
/// configuration and persisted alongside them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate", rename_all = "snake_case")
)]
pub enum Metric {
    L1,
    #[default]
    L2,
    LInf,
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l1" | "manhattan" => Ok(Metric::L1),
            "l2" | "euclidean" => Ok(Metric::L2),
            "linf" | "l_inf" | "chebyshev" => Ok(Metric::LInf),
            other => Err(format!("unknown metric '{}'; expected l1, l2 or linf", other)),
        }
    }
}

impl Display for Metric {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::L1 => write!(f, "l1"),
            Metric::L2 => write!(f, "l2"),
            Metric::LInf => write!(f, "linf"),
        }
    }
}

impl<F: Float> Distance<F> for Metric {
    fn distance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        match self {
            Metric::L1 => L1Dist.distance(a, b),
            Metric::L2 => L2Dist.distance(a, b),
            Metric::LInf => LInfDist.distance(a, b),
        }
    }

    fn rdistance(&self, a: ArrayView1<F>, b: ArrayView1<F>) -> F {
        match self {
            Metric::L1 => L1Dist.rdistance(a, b),
            Metric::L2 => L2Dist.rdistance(a, b),
            Metric::LInf => LInfDist.rdistance(a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_basic_metrics() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];
        assert_abs_diff_eq!(L1Dist.distance(a.view(), b.view()), 7.0);
        assert_abs_diff_eq!(L2Dist.distance(a.view(), b.view()), 5.0);
        assert_abs_diff_eq!(L2Dist.rdistance(a.view(), b.view()), 25.0);
        assert_abs_diff_eq!(LInfDist.distance(a.view(), b.view()), 4.0);
    }

    #[test]
    fn test_metric_enum_matches_structs() {
        let a = array![1.0, -2.0, 0.5];
        let b = array![-1.0, 2.0, 1.5];
        assert_abs_diff_eq!(
            Metric::L1.distance(a.view(), b.view()),
            L1Dist.distance(a.view(), b.view())
        );
        assert_abs_diff_eq!(
            Metric::L2.rdistance(a.view(), b.view()),
            L2Dist.rdistance(a.view(), b.view())
        );
        assert_abs_diff_eq!(
            Metric::LInf.distance(a.view(), b.view()),
            LInfDist.distance(a.view(), b.view())
        );
    }

    #[test]
    fn test_metric_names() {
        assert_eq!("Manhattan".parse::<Metric>(), Ok(Metric::L1));
        assert_eq!(" l2 ".parse::<Metric>(), Ok(Metric::L2));
        assert_eq!("chebyshev".parse::<Metric>(), Ok(Metric::LInf));
        assert!("cosine".parse::<Metric>().is_err());
        assert_eq!(Metric::LInf.to_string(), "linf");
    }
}
