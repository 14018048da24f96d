//! Temporal aggregation of per-service series
//!
//! Resource samples arrive at a finer cadence than latency histograms and are
//! reduced by fixed-size row windows. Latency rows are reduced by exact
//! timestamp: a service exports one client and one server histogram per
//! instant, each of which populates only half of the latency columns, so the
//! zeros of the other half must not drag the mean down.

use std::num::NonZeroUsize;

use rcaprep_histogram::LatencyColumns;
use rustc_hash::FxHashMap;

use crate::records::{LatencySample, ResourceSample};
use crate::timestamp::Timestamp;

/// Default number of resource rows folded into one aggregate
pub const DEFAULT_WINDOW_SIZE: NonZeroUsize = match NonZeroUsize::new(12) {
    Some(size) => size,
    None => unreachable!(),
};

#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    n: u32,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.n += 1;
    }

    fn get(self) -> Option<f64> {
        (self.n > 0).then(|| self.sum / f64::from(self.n))
    }
}

/// Fold consecutive windows of `window` rows into one row each.
///
/// Each column is the mean of the values present in the window, absent if
/// the window has none. The row takes the first timestamp of its window. A
/// trailing window shorter than `window` is still aggregated.
#[must_use]
pub fn window_means(samples: &[ResourceSample], window: NonZeroUsize) -> Vec<ResourceSample> {
    samples
        .chunks(window.get())
        .filter_map(|chunk| {
            let first = chunk.first()?;
            let mut means = [Mean::default(); 6];
            for sample in chunk {
                for (mean, value) in means.iter_mut().zip(sample.values()) {
                    if let Some(value) = value {
                        mean.add(value);
                    }
                }
            }
            Some(ResourceSample::from_values(
                first.time_unix,
                means.map(Mean::get),
            ))
        })
        .collect()
}

/// Collapse rows sharing a timestamp into one row.
///
/// Each latency column is the mean of its non-zero values within the group,
/// or zero when the group has none. Groups are emitted in the order their
/// timestamp was first seen.
#[must_use]
pub fn latency_by_timestamp(samples: &[LatencySample]) -> Vec<LatencySample> {
    let mut index: FxHashMap<Timestamp, usize> = FxHashMap::default();
    let mut groups: Vec<(Timestamp, [Mean; 6])> = Vec::new();

    for sample in samples {
        let slot = *index.entry(sample.time_unix).or_insert_with(|| {
            groups.push((sample.time_unix, [Mean::default(); 6]));
            groups.len() - 1
        });
        let (_, means) = &mut groups[slot];
        for (mean, value) in means.iter_mut().zip(sample.columns().values()) {
            if value != 0.0 {
                mean.add(value);
            }
        }
    }

    groups
        .into_iter()
        .map(|(time_unix, means)| {
            let values = means.map(|mean| mean.get().unwrap_or(0.0));
            LatencySample::new(time_unix, LatencyColumns::from_values(values))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    use super::*;

    fn ts(second: u32) -> Timestamp {
        format!("2024-10-27 02:{:02}:{:02}", second / 60, second % 60)
            .parse()
            .expect("valid timestamp")
    }

    fn resource(second: u32, cpu: Option<f64>) -> ResourceSample {
        ResourceSample::from_values(ts(second), [cpu, Some(1.0), None, Some(0.0), None, None])
    }

    fn latency(second: u32, server_p90: f64) -> LatencySample {
        let mut values = [0.0; 6];
        values[3] = server_p90;
        LatencySample::new(ts(second), LatencyColumns::from_values(values))
    }

    #[test]
    fn fourteen_rows_make_two_windows() {
        let samples: Vec<_> = (0..14)
            .map(|i| resource(i * 5, Some(f64::from(i))))
            .collect();
        let windows = window_means(&samples, DEFAULT_WINDOW_SIZE);

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].time_unix, ts(0));
        assert_eq!(windows[1].time_unix, ts(60));
        // 0..=11 and 12..=13
        assert_relative_eq!(windows[0].cpu.expect("cpu"), 5.5);
        assert_relative_eq!(windows[1].cpu.expect("cpu"), 12.5);
        assert_relative_eq!(windows[0].memory.expect("memory"), 1.0);
        assert_eq!(windows[0].memory_limit_utilization, None);
    }

    #[test]
    fn absent_values_are_skipped() {
        let samples = [resource(0, Some(2.0)), resource(5, None), resource(10, Some(4.0))];
        let windows = window_means(&samples, DEFAULT_WINDOW_SIZE);
        assert_eq!(windows.len(), 1);
        assert_relative_eq!(windows[0].cpu.expect("cpu"), 3.0);
    }

    #[test]
    fn empty_input_has_no_windows() {
        assert!(window_means(&[], DEFAULT_WINDOW_SIZE).is_empty());
        assert!(latency_by_timestamp(&[]).is_empty());
    }

    #[test]
    fn zeros_do_not_count_toward_the_mean() {
        let samples = [latency(0, 0.0), latency(0, 4.0), latency(0, 6.0)];
        let grouped = latency_by_timestamp(&samples);
        assert_eq!(grouped.len(), 1);
        assert_relative_eq!(grouped[0].server_p90, 5.0);
        assert_relative_eq!(grouped[0].client_p90, 0.0);
    }

    #[test]
    fn client_and_server_rows_combine() {
        let client = LatencySample::new(
            ts(0),
            LatencyColumns::from_values([1.0, 2.0, 3.0, 0.0, 0.0, 0.0]),
        );
        let server = LatencySample::new(
            ts(0),
            LatencyColumns::from_values([0.0, 0.0, 0.0, 4.0, 5.0, 6.0]),
        );
        let grouped = latency_by_timestamp(&[client, server]);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].columns().values(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn groups_follow_first_seen_order() {
        let samples = [latency(30, 1.0), latency(0, 2.0), latency(30, 3.0)];
        let grouped = latency_by_timestamp(&samples);
        let order: Vec<_> = grouped.iter().map(|s| s.time_unix).collect();
        assert_eq!(order, vec![ts(30), ts(0)]);
        assert_relative_eq!(grouped[0].server_p90, 2.0);
    }

    proptest! {
        #[test]
        fn window_count_is_ceiling(rows in 0u32..200, window in 1usize..30) {
            let samples: Vec<_> = (0..rows).map(|i| resource(i, Some(1.0))).collect();
            let window = NonZeroUsize::new(window).expect("non-zero");
            let windows = window_means(&samples, window);
            prop_assert_eq!(windows.len(), (rows as usize).div_ceil(window.get()));
        }

        #[test]
        fn grouped_values_are_bounded(values in proptest::collection::vec(0.0f64..100.0, 1..20)) {
            let samples: Vec<_> = values.iter().map(|v| latency(0, *v)).collect();
            let grouped = latency_by_timestamp(&samples);
            prop_assert_eq!(grouped.len(), 1);
            let max = values.iter().copied().fold(0.0, f64::max);
            prop_assert!(grouped[0].server_p90 <= max + 1e-9);
            prop_assert!(grouped[0].server_p90 >= 0.0);
        }
    }
}
