//! Reshaping collector spans into the dataset's trace schema

use crate::records::{TraceRow, TraceRecord};

const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_MICRO: i64 = 1_000;

/// Errors produced by [`transform`]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Start or end time does not fit in signed 64-bit nanoseconds
    #[error("span {span_id} time overflows 64-bit nanoseconds")]
    Overflow {
        /// Span whose time overflowed
        span_id: String,
    },
}

/// Convert one span.
///
/// The start time keeps whole seconds only; the sub-second part of the
/// collector timestamp is discarded. The end time is the start plus the
/// span's duration, given in microseconds.
///
/// # Errors
///
/// Returns an error if either time overflows `i64` nanoseconds.
pub fn transform(row: &TraceRow) -> Result<TraceRecord, Error> {
    let overflow = || Error::Overflow {
        span_id: row.span_id.clone(),
    };
    let start = row
        .timestamp
        .unix_seconds()
        .checked_mul(NANOS_PER_SECOND)
        .ok_or_else(overflow)?;
    let duration = i64::try_from(row.duration)
        .ok()
        .and_then(|micros| micros.checked_mul(NANOS_PER_MICRO))
        .ok_or_else(overflow)?;
    let end = start.checked_add(duration).ok_or_else(overflow)?;

    Ok(TraceRecord {
        trace_id: row.trace_id.clone(),
        span_id: row.span_id.clone(),
        parent_id: row.parent_span_id.clone(),
        pod_name: row.service_name.clone(),
        operation_name: row.span_name.clone(),
        start_time_unix_nano: start,
        end_time_unix_nano: end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(timestamp: &str, duration: u64) -> TraceRow {
        TraceRow {
            timestamp: timestamp.parse().expect("valid timestamp"),
            duration,
            trace_id: "t1".to_string(),
            span_id: "s2".to_string(),
            parent_span_id: "s1".to_string(),
            service_name: "cart-service".to_string(),
            span_name: "GET /cart".to_string(),
        }
    }

    #[test]
    fn times_are_epoch_nanoseconds() {
        let record = transform(&row("2024-10-27 02:09:00", 1_500)).expect("in range");
        assert_eq!(record.start_time_unix_nano, 1_729_994_940_000_000_000);
        assert_eq!(record.end_time_unix_nano, 1_729_994_940_001_500_000);
        assert_eq!(record.pod_name, "cart-service");
        assert_eq!(record.operation_name, "GET /cart");
        assert_eq!(record.parent_id, "s1");
    }

    #[test]
    fn fractional_seconds_are_dropped() {
        let whole = transform(&row("2024-10-27 02:09:00", 0)).expect("in range");
        let fraction = transform(&row("2024-10-27 02:09:00.987654", 0)).expect("in range");
        assert_eq!(whole.start_time_unix_nano, fraction.start_time_unix_nano);
    }

    #[test]
    fn huge_duration_overflows() {
        assert_eq!(
            transform(&row("2024-10-27 02:09:00", u64::MAX)),
            Err(Error::Overflow {
                span_id: "s2".to_string()
            })
        );
    }
}
