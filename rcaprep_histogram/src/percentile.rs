//! Percentile estimation from bucket histograms
//!
//! The estimator never sees raw samples. For a quantile it takes the tail
//! mass beyond that quantile -- 10% of all samples for P90 -- and walks the
//! buckets from the slowest downward, attributing as much of that tail to
//! each bucket as the bucket holds until the tail is exhausted. The result is
//! a [`QuantileContribution`]: the percentage of all samples each bucket
//! contributes to the tail.
//!
//! The contribution is then collapsed into one number by weighting each
//! bucket with its boundary latency and dividing by a per-quantile
//! calibration divisor. The divisors are empirical and reproduced exactly;
//! see [`Calibration`].

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::bucket::{BOUNDARY_WEIGHTS, BUCKET_COUNT};

/// The latency percentiles this crate estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantile {
    /// 90th percentile
    P90,
    /// 95th percentile
    P95,
    /// 99th percentile
    P99,
}

impl Quantile {
    /// Every supported quantile, in column order
    pub const ALL: [Quantile; 3] = [Quantile::P90, Quantile::P95, Quantile::P99];

    /// Fraction of samples lying above this percentile. This mapping is a
    /// fixed contract of the dataset format.
    #[must_use]
    pub fn tail_fraction(self) -> f64 {
        match self {
            Quantile::P90 => 0.10,
            Quantile::P95 => 0.05,
            Quantile::P99 => 0.01,
        }
    }
}

fn default_p90_divisor() -> f64 {
    10.0
}

fn default_p95_divisor() -> f64 {
    5.0
}

fn default_p99_divisor() -> f64 {
    1.0
}

/// Divisors applied after the weighted collapse, one per quantile.
///
/// These have no derivation from the percentile definition; they calibrate
/// the output against an RCA benchmark's expected values. Change them only
/// with that benchmark in hand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Calibration {
    /// Divisor for P90
    #[serde(default = "default_p90_divisor")]
    pub p90_divisor: f64,
    /// Divisor for P95
    #[serde(default = "default_p95_divisor")]
    pub p95_divisor: f64,
    /// Divisor for P99
    #[serde(default = "default_p99_divisor")]
    pub p99_divisor: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            p90_divisor: default_p90_divisor(),
            p95_divisor: default_p95_divisor(),
            p99_divisor: default_p99_divisor(),
        }
    }
}

impl Calibration {
    /// The divisor for `quantile`
    #[must_use]
    pub fn divisor(&self, quantile: Quantile) -> f64 {
        match quantile {
            Quantile::P90 => self.p90_divisor,
            Quantile::P95 => self.p95_divisor,
            Quantile::P99 => self.p99_divisor,
        }
    }

    /// Whether every divisor is usable, that is finite and non-zero.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        Quantile::ALL.iter().all(|q| {
            let d = self.divisor(*q);
            d.is_finite() && d != 0.0
        })
    }
}

/// Per-bucket percentages of all samples attributed to a quantile's tail.
///
/// Values are percentages (0-100), not fractions, and sum to the quantile's
/// tail fraction times 100.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantileContribution {
    percentages: Vec<f64>,
}

impl QuantileContribution {
    /// Attribute `tail_fraction` of the histogram's mass to its buckets, the
    /// slowest bucket first.
    ///
    /// Works the same on raw counts and on normalized fractions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyHistogram`] if the buckets sum to zero.
    pub fn from_buckets(buckets: &[f64], tail_fraction: f64) -> Result<Self, Error> {
        let total: f64 = buckets.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return Err(Error::EmptyHistogram);
        }
        let target = total * tail_fraction;

        let mut accumulated = 0.0;
        let mut percentages = vec![0.0; buckets.len()];
        for (idx, &current) in buckets.iter().enumerate().rev() {
            if accumulated >= target {
                break;
            }
            if accumulated + current >= target {
                let needed = target - accumulated;
                percentages[idx] = needed / total * 100.0;
                break;
            }
            percentages[idx] = current / total * 100.0;
            accumulated += current;
        }

        Ok(Self { percentages })
    }

    /// Percentages, smallest latency bucket first
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.percentages
    }

    /// Dot product of the percentages with [`BOUNDARY_WEIGHTS`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::BucketCount`] if there is not one percentage per
    /// boundary weight.
    pub fn weighted_sum(&self) -> Result<f64, Error> {
        if self.percentages.len() != BUCKET_COUNT {
            return Err(Error::BucketCount {
                expected: BUCKET_COUNT,
                found: self.percentages.len(),
            });
        }
        Ok(self
            .percentages
            .iter()
            .zip(BOUNDARY_WEIGHTS.iter())
            .map(|(pct, weight)| pct * weight)
            .sum())
    }
}

/// Estimate one quantile's latency from a bucket vector.
///
/// # Errors
///
/// Returns an error if the histogram is empty or has the wrong number of
/// buckets.
pub fn estimate(
    buckets: &[f64],
    quantile: Quantile,
    calibration: &Calibration,
) -> Result<f64, Error> {
    let contribution = QuantileContribution::from_buckets(buckets, quantile.tail_fraction())?;
    Ok(contribution.weighted_sum()? / calibration.divisor(quantile))
}

/// P90, P95 and P99 estimates of one histogram.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Estimate {
    /// 90th percentile estimate
    pub p90: f64,
    /// 95th percentile estimate
    pub p95: f64,
    /// 99th percentile estimate
    pub p99: f64,
}

impl Estimate {
    /// Estimate every supported quantile from `buckets`.
    ///
    /// # Errors
    ///
    /// See [`estimate`].
    pub fn from_buckets(buckets: &[f64], calibration: &Calibration) -> Result<Self, Error> {
        Ok(Self {
            p90: estimate(buckets, Quantile::P90, calibration)?,
            p95: estimate(buckets, Quantile::P95, calibration)?,
            p99: estimate(buckets, Quantile::P99, calibration)?,
        })
    }

    /// The estimate for `quantile`
    #[must_use]
    pub fn get(&self, quantile: Quantile) -> f64 {
        match quantile {
            Quantile::P90 => self.p90,
            Quantile::P95 => self.p95,
            Quantile::P99 => self.p99,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn single(idx: usize, value: f64) -> Vec<f64> {
        let mut buckets = vec![0.0; BUCKET_COUNT];
        buckets[idx] = value;
        buckets
    }

    #[test]
    fn top_bucket_takes_the_whole_tail() {
        let buckets = single(BUCKET_COUNT - 1, 10.0);
        let contribution =
            QuantileContribution::from_buckets(&buckets, Quantile::P90.tail_fraction())
                .expect("non-empty");
        assert_relative_eq!(contribution.as_slice()[BUCKET_COUNT - 1], 10.0);
        assert!(contribution.as_slice()[..BUCKET_COUNT - 1]
            .iter()
            .all(|p| *p == 0.0));

        let p90 = estimate(&buckets, Quantile::P90, &Calibration::default()).expect("non-empty");
        assert_relative_eq!(p90, 10.0);
    }

    #[test]
    fn lowest_bucket_only() {
        // Every empty bucket above is scanned and left at zero.
        let buckets = single(0, 10.0);
        let contribution = QuantileContribution::from_buckets(&buckets, 0.10).expect("non-empty");
        assert_relative_eq!(contribution.as_slice()[0], 10.0);

        let p90 = estimate(&buckets, Quantile::P90, &Calibration::default()).expect("non-empty");
        assert_relative_eq!(p90, 10.0 * 0.005 / 10.0);
    }

    #[test]
    fn tail_spans_several_buckets() {
        // total 100, P90 target 10: 4 from bucket 14, 5 from 13, 1 of 20 from 12.
        let mut buckets = vec![0.0; BUCKET_COUNT];
        buckets[0] = 71.0;
        buckets[12] = 20.0;
        buckets[13] = 5.0;
        buckets[14] = 4.0;
        let contribution = QuantileContribution::from_buckets(&buckets, 0.10).expect("non-empty");
        let pct = contribution.as_slice();
        assert_relative_eq!(pct[14], 4.0);
        assert_relative_eq!(pct[13], 5.0);
        assert_relative_eq!(pct[12], 1.0);
        assert_relative_eq!(pct[0], 0.0);

        let weighted = contribution.weighted_sum().expect("fifteen buckets");
        assert_relative_eq!(weighted, 4.0 * 10.0 + 5.0 * 10.0 + 1.0 * 7.5);

        let p99 = estimate(&buckets, Quantile::P99, &Calibration::default()).expect("non-empty");
        assert_relative_eq!(p99, 1.0 * 10.0);
    }

    #[test]
    fn raw_and_normalized_agree() {
        let raw = vec![
            5.0, 10.0, 30.0, 20.0, 10.0, 8.0, 6.0, 4.0, 3.0, 2.0, 1.0, 0.5, 0.3, 0.1, 0.1,
        ];
        let total: f64 = raw.iter().sum();
        let normalized: Vec<f64> = raw.iter().map(|v| v / total).collect();
        let calibration = Calibration::default();
        let a = Estimate::from_buckets(&raw, &calibration).expect("non-empty");
        let b = Estimate::from_buckets(&normalized, &calibration).expect("non-empty");
        for q in Quantile::ALL {
            assert_relative_eq!(a.get(q), b.get(q), max_relative = 1e-9);
        }
    }

    #[test]
    fn empty_histogram_is_an_error() {
        let buckets = vec![0.0; BUCKET_COUNT];
        assert_eq!(
            QuantileContribution::from_buckets(&buckets, 0.10),
            Err(Error::EmptyHistogram)
        );
        assert_eq!(
            estimate(&buckets, Quantile::P95, &Calibration::default()),
            Err(Error::EmptyHistogram)
        );
    }

    #[test]
    fn wrong_length_cannot_be_weighted() {
        let contribution = QuantileContribution::from_buckets(&[1.0, 2.0], 0.10).expect("non-empty");
        assert_eq!(
            contribution.weighted_sum(),
            Err(Error::BucketCount {
                expected: BUCKET_COUNT,
                found: 2
            })
        );
    }

    #[test]
    fn divisors_are_configurable() {
        let buckets = single(BUCKET_COUNT - 1, 1.0);
        let calibration = Calibration {
            p90_divisor: 1.0,
            ..Calibration::default()
        };
        let p90 = estimate(&buckets, Quantile::P90, &calibration).expect("non-empty");
        assert_relative_eq!(p90, 100.0);
        assert!(calibration.is_valid());
        assert!(
            !Calibration {
                p95_divisor: 0.0,
                ..Calibration::default()
            }
            .is_valid()
        );
    }

    fn histogram() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(0u32..100_000, BUCKET_COUNT)
            .prop_filter("must hold samples", |v| v.iter().any(|c| *c > 0))
            .prop_map(|v| v.into_iter().map(f64::from).collect())
    }

    proptest! {
        #[test]
        fn percentages_sum_to_tail(buckets in histogram()) {
            for q in Quantile::ALL {
                let contribution = QuantileContribution::from_buckets(&buckets, q.tail_fraction())
                    .expect("non-empty");
                let sum: f64 = contribution.as_slice().iter().sum();
                prop_assert!((sum - q.tail_fraction() * 100.0).abs() < 1e-9,
                    "sum {sum} for {q:?}");
                prop_assert!(contribution.as_slice().iter().all(|p| *p >= 0.0 && *p <= 100.0));
            }
        }

        #[test]
        fn single_populated_bucket_absorbs_tail(idx in 0..BUCKET_COUNT, count in 1u32..1_000_000) {
            let buckets = single(idx, f64::from(count));
            for q in Quantile::ALL {
                let contribution = QuantileContribution::from_buckets(&buckets, q.tail_fraction())
                    .expect("non-empty");
                for (i, pct) in contribution.as_slice().iter().enumerate() {
                    if i == idx {
                        prop_assert!((pct - q.tail_fraction() * 100.0).abs() < 1e-9);
                    } else {
                        prop_assert_eq!(*pct, 0.0);
                    }
                }
            }
        }

        #[test]
        fn estimates_are_bounded(buckets in histogram()) {
            let estimate = Estimate::from_buckets(&buckets, &Calibration::default())
                .expect("non-empty");
            // the weighted sum can be at most tail% times the largest weight
            prop_assert!(estimate.p90 >= 0.0 && estimate.p90 <= 10.0 * 10.0 / 10.0 + 1e-9);
            prop_assert!(estimate.p95 >= 0.0 && estimate.p95 <= 5.0 * 10.0 / 5.0 + 1e-9);
            prop_assert!(estimate.p99 >= 0.0 && estimate.p99 <= 1.0 * 10.0 + 1e-9);
        }
    }
}
