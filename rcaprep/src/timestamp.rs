//! Collector timestamps
//!
//! The collector exports times as zone-less `YYYY-MM-DD HH:MM:SS[.fraction]`
//! strings. [`Timestamp`] parses those strictly, compares by exact value and
//! renders back in the same shape, so a timestamp read from one file joins
//! against the same timestamp read from another.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid timestamp {0:?}, expected YYYY-MM-DD HH:MM:SS[.fraction]")]
/// Input is not a recognised timestamp
pub struct ParseError(pub String);

/// A zone-less point in time, treated as UTC where an epoch is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// Create a new instance of `Timestamp`
    #[must_use]
    pub fn new(inner: NaiveDateTime) -> Self {
        Self(inner)
    }

    /// Whole seconds since the Unix epoch, sub-second part discarded
    #[must_use]
    pub fn unix_seconds(&self) -> i64 {
        self.0.and_utc().timestamp()
    }
}

impl FromStr for Timestamp {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        for format in FORMATS {
            if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(Self(parsed));
            }
        }
        DateTime::parse_from_rfc3339(trimmed)
            .map(|parsed| Self(parsed.naive_utc()))
            .map_err(|_| ParseError(s.to_string()))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.nanosecond() == 0 {
            write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S"))
        } else {
            write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S%.9f"))
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_space_separated() {
        let ts: Timestamp = "2024-10-27 02:09:00".parse().expect("valid timestamp");
        assert_eq!(ts.to_string(), "2024-10-27 02:09:00");
        assert_eq!(ts.unix_seconds(), 1_729_994_940);
    }

    #[test]
    fn keeps_fraction() {
        let ts: Timestamp = "2024-10-27 02:09:00.25".parse().expect("valid timestamp");
        assert_eq!(ts.to_string(), "2024-10-27 02:09:00.250000000");
        assert_eq!(ts.unix_seconds(), 1_729_994_940);
    }

    #[test]
    fn accepts_t_separator_and_rfc3339() {
        let plain: Timestamp = "2024-10-27 02:09:00".parse().expect("valid timestamp");
        let t_sep: Timestamp = "2024-10-27T02:09:00".parse().expect("valid timestamp");
        let zoned: Timestamp = "2024-10-27T04:09:00+02:00".parse().expect("valid timestamp");
        assert_eq!(plain, t_sep);
        assert_eq!(plain, zoned);
    }

    #[test]
    fn rejects_garbage() {
        assert!("yesterday".parse::<Timestamp>().is_err());
        assert!("2024-13-01 00:00:00".parse::<Timestamp>().is_err());
        assert!("".parse::<Timestamp>().is_err());
    }

    #[test]
    fn equal_instants_compare_equal() {
        let a: Timestamp = "2024-10-27 02:09:00.000".parse().expect("valid timestamp");
        let b: Timestamp = "2024-10-27 02:09:00".parse().expect("valid timestamp");
        assert_eq!(a, b);
        assert!(a < "2024-10-27 02:09:01".parse().expect("valid timestamp"));
    }
}
