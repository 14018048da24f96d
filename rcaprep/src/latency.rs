//! Per-service latency series from request-duration histograms

use std::collections::BTreeMap;

use rcaprep_histogram::{Calibration, Direction, Estimate, LatencyColumns};
use tracing::debug;

use crate::aggregate;
use crate::records::{HistogramRow, LatencySample};
use crate::timestamp::Timestamp;

/// A histogram row whose percentiles could not be estimated
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{service} at {time_unix}: {source}")]
pub struct Error {
    /// Zero-based index of the row among the rows passed in
    pub row: usize,
    /// Service of the row
    pub service: String,
    /// Timestamp of the row
    pub time_unix: Timestamp,
    /// What went wrong
    #[source]
    pub source: rcaprep_histogram::Error,
}

/// Latency series of every service in one request-metrics file.
#[derive(Debug, Default)]
pub struct Series {
    /// One timestamp-aggregated series per service, ordered by service name
    pub by_service: BTreeMap<String, Vec<LatencySample>>,
    /// Rows left out of the series
    pub failures: Vec<Error>,
}

/// Estimate P90/P95/P99 of one histogram row and place them in the row's
/// direction columns.
///
/// The histogram is normalized by the row's `Count` before estimation. Rows
/// whose metric is neither the client nor the server request duration yield
/// all-zero columns.
///
/// # Errors
///
/// Returns an error if `Count` is not positive or the histogram holds no
/// mass.
pub fn estimate_row(
    row: &HistogramRow,
    calibration: &Calibration,
) -> Result<LatencySample, rcaprep_histogram::Error> {
    let normalized = row.bucket_counts.normalize(row.count)?;
    let estimate = Estimate::from_buckets(normalized.as_slice(), calibration)?;
    let direction = match row.metric_name.parse::<Direction>() {
        Ok(direction) => Some(direction),
        Err(err) => {
            debug!(service = %row.service_name, "{err}");
            None
        }
    };
    Ok(LatencySample::new(
        row.time_unix,
        LatencyColumns::split(direction, estimate),
    ))
}

/// Group rows by service, estimate each, and collapse every service's rows
/// by timestamp.
#[must_use]
pub fn by_service(rows: &[HistogramRow], calibration: &Calibration) -> Series {
    let mut raw: BTreeMap<String, Vec<LatencySample>> = BTreeMap::new();
    let mut failures = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        match estimate_row(row, calibration) {
            Ok(sample) => raw.entry(row.service_name.clone()).or_default().push(sample),
            Err(source) => failures.push(Error {
                row: index,
                service: row.service_name.clone(),
                time_unix: row.time_unix,
                source,
            }),
        }
    }

    let by_service = raw
        .into_iter()
        .map(|(service, samples)| {
            let grouped = aggregate::latency_by_timestamp(&samples);
            (service, grouped)
        })
        .collect();
    Series {
        by_service,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rcaprep_histogram::BucketCounts;

    use super::*;

    const SERVER: &str = "http.server.request.duration";
    const CLIENT: &str = "http.client.request.duration";

    fn row(service: &str, metric: &str, buckets: &str, count: f64, time: &str) -> HistogramRow {
        HistogramRow {
            service_name: service.to_string(),
            metric_name: metric.to_string(),
            bucket_counts: buckets.parse::<BucketCounts>().expect("valid buckets"),
            count,
            time_unix: time.parse().expect("valid timestamp"),
        }
    }

    const TOP: &str = "[0,0,0,0,0,0,0,0,0,0,0,0,0,0,4]";
    const LOW: &str = "[4,0,0,0,0,0,0,0,0,0,0,0,0,0,0]";

    #[test]
    fn server_row_fills_server_columns() {
        let sample = estimate_row(
            &row("cart-service", SERVER, TOP, 4.0, "2024-10-27 02:09:00"),
            &Calibration::default(),
        )
        .expect("estimable");
        // All mass in the overflow bucket: 10% tail at weight 10, divided by 10.
        assert_relative_eq!(sample.server_p90, 10.0, epsilon = 1e-12);
        assert_relative_eq!(sample.server_p95, 10.0, epsilon = 1e-12);
        assert_relative_eq!(sample.server_p99, 10.0, epsilon = 1e-12);
        assert_relative_eq!(sample.client_p90, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn client_row_fills_client_columns() {
        let sample = estimate_row(
            &row("cart-service", CLIENT, LOW, 4.0, "2024-10-27 02:09:00"),
            &Calibration::default(),
        )
        .expect("estimable");
        // 10% tail at weight 0.005, divided by 10.
        assert_relative_eq!(sample.client_p90, 0.005, epsilon = 1e-12);
        assert_relative_eq!(sample.server_p90, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn unknown_metric_is_all_zero() {
        let sample = estimate_row(
            &row("cart-service", "rpc.duration", TOP, 4.0, "2024-10-27 02:09:00"),
            &Calibration::default(),
        )
        .expect("estimable");
        assert_eq!(sample.columns().values(), [0.0; 6]);
    }

    #[test]
    fn zero_count_is_reported_not_nan() {
        let series = by_service(
            &[
                row("cart-service", SERVER, TOP, 0.0, "2024-10-27 02:09:00"),
                row("cart-service", SERVER, TOP, 4.0, "2024-10-27 02:10:00"),
            ],
            &Calibration::default(),
        );
        assert_eq!(series.failures.len(), 1);
        assert_eq!(series.failures[0].row, 0);
        assert!(matches!(
            series.failures[0].source,
            rcaprep_histogram::Error::ZeroCount { .. }
        ));
        assert_eq!(series.by_service["cart-service"].len(), 1);
    }

    #[test]
    fn services_are_grouped_and_collapsed() {
        let series = by_service(
            &[
                row("cart-service", SERVER, TOP, 4.0, "2024-10-27 02:09:00"),
                row("ad-service", SERVER, TOP, 4.0, "2024-10-27 02:09:00"),
                row("cart-service", CLIENT, LOW, 4.0, "2024-10-27 02:09:00"),
                row("cart-service", SERVER, TOP, 4.0, "2024-10-27 02:10:00"),
            ],
            &Calibration::default(),
        );
        assert!(series.failures.is_empty());
        let services: Vec<_> = series.by_service.keys().cloned().collect();
        assert_eq!(services, vec!["ad-service", "cart-service"]);

        let cart = &series.by_service["cart-service"];
        assert_eq!(cart.len(), 2);
        assert_relative_eq!(cart[0].server_p90, 10.0, epsilon = 1e-12);
        assert_relative_eq!(cart[0].client_p90, 0.005, epsilon = 1e-12);
        assert_relative_eq!(cart[1].client_p90, 0.0, epsilon = 1e-12);
    }
}
