//! Aligning a service's latency series with its resource series
//!
//! Latency series are named after the service that exported them, resource
//! series after the pod the service ran in. The two are paired by name
//! prefix: everything in the service name before the delimiter, `-service` by
//! default, must begin the resource file's name.
//!
//! Rows are then paired by position ([`Strategy::Positional`], the default)
//! or by timestamp ([`Strategy::Keyed`]). Latency rows carry the exporter's
//! timestamps and resource windows the time of their first sample, so the two
//! rarely coincide and keyed pairing only suits inputs sampled in lockstep.
//! Either way a series pair whose lengths differ is refused rather than
//! truncated to the shorter of the two.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::records::{LatencySample, MergedSample, ResourceSample};
use crate::timestamp::Timestamp;

fn default_prefix_delimiter() -> String {
    "-service".to_string()
}

/// Errors produced while aligning two series
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The two series do not have the same number of rows
    #[error("latency series has {latency} rows, resource series has {resource}")]
    RowCountMismatch {
        /// Rows in the latency series
        latency: usize,
        /// Rows in the resource series
        resource: usize,
    },
    /// A latency row has no resource row with the same timestamp
    #[error("no resource row at {0}")]
    UnmatchedTimestamp(Timestamp),
    /// The resource series has more than one row at a timestamp
    #[error("resource series has more than one row at {0}")]
    DuplicateTimestamp(Timestamp),
}

/// How rows of the two series are paired
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Pair the n-th row of each series
    #[default]
    Positional,
    /// Pair rows with equal timestamps
    Keyed,
}

/// Merge configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Row pairing strategy
    #[serde(default)]
    pub strategy: Strategy,
    /// Text ending a service's name prefix
    #[serde(default = "default_prefix_delimiter")]
    pub prefix_delimiter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            prefix_delimiter: default_prefix_delimiter(),
        }
    }
}

/// The part of `name` before the first `delimiter`, or all of `name` when
/// the delimiter does not occur.
#[must_use]
pub fn prefix<'a>(name: &'a str, delimiter: &str) -> &'a str {
    name.split_once(delimiter).map_or(name, |(head, _)| head)
}

/// The first of `candidates`, in sorted order, that begins with `prefix`.
#[must_use]
pub fn find_counterpart<'a, S: AsRef<str>>(prefix: &str, candidates: &'a [S]) -> Option<&'a str> {
    candidates
        .iter()
        .map(|candidate| candidate.as_ref())
        .filter(|candidate| candidate.starts_with(prefix))
        .min()
}

/// File name of the merged series for `prefix`
#[must_use]
pub fn merged_file_name(prefix: &str, delimiter: &str) -> String {
    format!("{prefix}{delimiter}.csv")
}

/// Combine `latency` and `resource` into one wide series.
///
/// The merged rows follow the latency series' order and take its
/// timestamps.
///
/// # Errors
///
/// Returns an error if the series differ in length or, when keyed, if a
/// latency timestamp has no unique resource row.
pub fn merge(
    latency: &[LatencySample],
    resource: &[ResourceSample],
    strategy: Strategy,
) -> Result<Vec<MergedSample>, Error> {
    if latency.len() != resource.len() {
        return Err(Error::RowCountMismatch {
            latency: latency.len(),
            resource: resource.len(),
        });
    }

    match strategy {
        Strategy::Positional => Ok(latency
            .iter()
            .zip(resource)
            .map(|(latency, resource)| MergedSample::new(latency, resource))
            .collect()),
        Strategy::Keyed => {
            let mut by_time: FxHashMap<Timestamp, &ResourceSample> = FxHashMap::default();
            for sample in resource {
                if by_time.insert(sample.time_unix, sample).is_some() {
                    return Err(Error::DuplicateTimestamp(sample.time_unix));
                }
            }
            latency
                .iter()
                .map(|latency| {
                    by_time
                        .get(&latency.time_unix)
                        .map(|resource| MergedSample::new(latency, resource))
                        .ok_or(Error::UnmatchedTimestamp(latency.time_unix))
                })
                .collect()
        }
    }
}
