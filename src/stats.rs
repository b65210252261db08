//! Running summary statistics over temperature values.
use std::ops::AddAssign;

use serde::{Serialize, Serializer};
use serde_derive::Serialize;

/// Count, range, mean and variance of a sequence of values,
/// updated one value at a time. Two summaries of disjoint
/// sequences merge into the summary of their union.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    count: usize,
    min: f64,
    max: f64,
    mean: f64,
    m2: f64,
}

impl Default for Stats {
    fn default() -> Self {
        Stats {
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            mean: 0.,
            m2: 0.,
        }
    }
}

impl Stats {
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then(|| self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then(|| self.max)
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.mean)
    }

    /// Population standard deviation.
    pub fn std_dev(&self) -> Option<f64> {
        (self.count > 0).then(|| (self.m2 / self.count as f64).sqrt())
    }
}

impl AddAssign<f64> for Stats {
    fn add_assign(&mut self, val: f64) {
        self.count += 1;
        self.min = self.min.min(val);
        self.max = self.max.max(val);

        let delta = val - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (val - self.mean);
    }
}

impl AddAssign<&Stats> for Stats {
    fn add_assign(&mut self, other: &Stats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }

        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let weight = other.count as f64 / count as f64;
        self.mean += delta * weight;
        self.m2 += other.m2 + delta * delta * self.count as f64 * weight;
        self.count = count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }
}

#[derive(Serialize)]
struct Summary {
    count: usize,
    min: Option<f64>,
    max: Option<f64>,
    mean: Option<f64>,
    std_dev: Option<f64>,
}

impl Serialize for Stats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Summary {
            count: self.count,
            min: self.min(),
            max: self.max(),
            mean: self.mean(),
            std_dev: self.std_dev(),
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn of(values: &[f64]) -> Stats {
        let mut stats = Stats::default();
        for &v in values {
            stats += v;
        }
        stats
    }

    #[test]
    fn empty_has_no_values() {
        let stats = Stats::default();
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.mean(), None);
        assert_eq!(
            serde_json::to_value(&stats).unwrap(),
            serde_json::json!({"count": 0, "min": null, "max": null, "mean": null, "std_dev": null})
        );
    }

    #[test]
    fn known_values() {
        let stats = of(&[2., 4., 4., 4., 5., 5., 7., 9.]);
        assert_eq!(stats.count(), 8);
        assert_eq!(stats.min(), Some(2.));
        assert_eq!(stats.max(), Some(9.));
        assert_eq!(stats.mean(), Some(5.));
        assert!((stats.std_dev().unwrap() - 2.).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn merge_matches_sequential(
            left in prop::collection::vec(-50f64..150., 0..40),
            right in prop::collection::vec(-50f64..150., 0..40),
        ) {
            let mut merged = of(&left);
            merged += &of(&right);
            let all: Vec<f64> = left.iter().chain(right.iter()).copied().collect();
            let direct = of(&all);

            prop_assert_eq!(merged.count(), direct.count());
            prop_assert_eq!(merged.min(), direct.min());
            prop_assert_eq!(merged.max(), direct.max());
            if let (Some(a), Some(b)) = (merged.mean(), direct.mean()) {
                prop_assert!((a - b).abs() < 1e-9);
            }
            if let (Some(a), Some(b)) = (merged.std_dev(), direct.std_dev()) {
                prop_assert!((a - b).abs() < 1e-6);
            }
        }
    }
}
