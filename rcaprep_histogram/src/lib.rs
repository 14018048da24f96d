//! Latency estimation from cumulative bucket histograms
//!
//! This library turns the bucketed request-duration histograms emitted by an
//! OpenTelemetry collector into point-in-time P90/P95/P99 latency estimates,
//! then projects those estimates into client- and server-side columns. It has
//! no knowledge of files or tables; callers hand it one histogram at a time.

#![deny(clippy::all)]
#![deny(clippy::cargo)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_copy_implementations)]
#![deny(missing_debug_implementations)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::multiple_crate_versions)]

pub mod bucket;
pub mod latency;
pub mod percentile;

pub use bucket::{BOUNDARY_WEIGHTS, BUCKET_COUNT, BucketCounts, NormalizedHistogram};
pub use latency::{Direction, LatencyColumns};
pub use percentile::{Calibration, Estimate, Quantile};

/// Errors produced by this crate
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Bucket list could not be decoded
    #[error(transparent)]
    Parse(#[from] bucket::ParseError),
    /// A histogram cannot be normalized against a zero total
    #[error("histogram total count is zero or not finite: {total}")]
    ZeroCount {
        /// The offending total
        total: f64,
    },
    /// A histogram with no mass has no percentiles
    #[error("histogram holds no samples, percentile is undefined")]
    EmptyHistogram,
    /// Bucket vector does not line up with the boundary weights
    #[error("expected {expected} buckets, found {found}")]
    BucketCount {
        /// Number of boundary weights
        expected: usize,
        /// Number of buckets supplied
        found: usize,
    },
}
