//! Bucket counts and their normalization
//!
//! The collector stores request-duration histograms as a text-encoded list of
//! per-bucket counts, e.g. `[0, 12, 3, 0, 1]`, ordered from the smallest to
//! the largest latency bucket. This module decodes that column strictly and
//! converts counts into fractions of the histogram's total count.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::Error;

/// Number of buckets in every request-duration histogram.
pub const BUCKET_COUNT: usize = 15;

/// Latency, in seconds, that each bucket stands for. The final bucket is the
/// `+Inf` overflow bucket and shares its predecessor's weight.
pub const BOUNDARY_WEIGHTS: [f64; BUCKET_COUNT] = [
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0, 10.0,
];

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
/// Errors that can occur while decoding a bucket list
pub enum ParseError {
    /// Input does not open with `[`
    #[error("bucket list must start with '['")]
    MissingOpenBracket,
    /// Input does not close with `]`
    #[error("bucket list must end with ']'")]
    MissingCloseBracket,
    /// Two separators with nothing between them, or a trailing separator
    #[error("bucket {index} is empty")]
    EmptyItem {
        /// Zero-based position in the list
        index: usize,
    },
    /// Item is not a number
    #[error("bucket {index} is not a number: {value:?}")]
    InvalidNumber {
        /// Zero-based position in the list
        index: usize,
        /// Raw item text
        value: String,
    },
    /// Item is a number but not a usable count
    #[error("bucket {index} must be finite and non-negative, got {value}")]
    InvalidCount {
        /// Zero-based position in the list
        index: usize,
        /// Parsed value
        value: f64,
    },
}

/// Decode a bracketed, comma separated list of non-negative numbers.
///
/// Whitespace around items and brackets is ignored. `[]` decodes to an empty
/// list.
///
/// # Errors
///
/// Returns an error for anything that is not exactly such a list.
pub fn parse_list(input: &str) -> Result<Vec<f64>, ParseError> {
    let trimmed = input.trim();
    let inner = trimmed
        .strip_prefix('[')
        .ok_or(ParseError::MissingOpenBracket)?;
    let inner = inner
        .strip_suffix(']')
        .ok_or(ParseError::MissingCloseBracket)?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut values = Vec::with_capacity(BUCKET_COUNT);
    for (index, raw) in inner.split(',').enumerate() {
        let item = raw.trim();
        if item.is_empty() {
            return Err(ParseError::EmptyItem { index });
        }
        // f64's parser accepts "inf" and "NaN" spellings, rejected below.
        let value = f64::from_str(item).map_err(|_| ParseError::InvalidNumber {
            index,
            value: item.to_string(),
        })?;
        if !value.is_finite() || value < 0.0 {
            return Err(ParseError::InvalidCount { index, value });
        }
        values.push(value);
    }
    Ok(values)
}

/// Raw per-bucket sample counts of one histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketCounts {
    counts: Vec<f64>,
}

impl BucketCounts {
    /// Create a new instance of `BucketCounts`
    ///
    /// # Errors
    ///
    /// Returns [`Error::BucketCount`] unless exactly [`BUCKET_COUNT`] counts
    /// are given, and [`ParseError::InvalidCount`] for negative or non-finite
    /// counts.
    pub fn new(counts: Vec<f64>) -> Result<Self, Error> {
        if counts.len() != BUCKET_COUNT {
            return Err(Error::BucketCount {
                expected: BUCKET_COUNT,
                found: counts.len(),
            });
        }
        if let Some((index, &value)) = counts
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(ParseError::InvalidCount { index, value }.into());
        }
        Ok(Self { counts })
    }

    /// The counts, smallest latency bucket first
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.counts
    }

    /// Sum of all bucket counts
    #[must_use]
    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }

    /// Divide every bucket by `total_count`, usually the histogram's recorded
    /// `Count` column.
    ///
    /// # Errors
    ///
    /// See [`normalize`].
    pub fn normalize(&self, total_count: f64) -> Result<NormalizedHistogram, Error> {
        normalize(&self.counts, total_count)
    }
}

impl FromStr for BucketCounts {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(parse_list(s)?)
    }
}

impl<'de> Deserialize<'de> for BucketCounts {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for BucketCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (idx, count) in self.counts.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{count}")?;
        }
        write!(f, "]")
    }
}

/// Bucket counts expressed as a fraction of the histogram's total count. A
/// probability mass, not a count.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedHistogram {
    fractions: Vec<f64>,
}

impl NormalizedHistogram {
    /// Per-bucket fractions, smallest latency bucket first
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.fractions
    }
}

/// Convert bucket counts into fractions of `total_count`.
///
/// # Errors
///
/// Returns [`Error::ZeroCount`] when `total_count` is zero, negative or not
/// finite.
pub fn normalize(counts: &[f64], total_count: f64) -> Result<NormalizedHistogram, Error> {
    if !total_count.is_finite() || total_count <= 0.0 {
        return Err(Error::ZeroCount { total: total_count });
    }
    Ok(NormalizedHistogram {
        fractions: counts.iter().map(|count| count / total_count).collect(),
    })
}
