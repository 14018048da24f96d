//! Client and server latency columns
//!
//! A request-duration histogram is recorded either by the calling side
//! (`http.client.request.duration`) or by the serving side
//! (`http.server.request.duration`). Downstream tables want both sides as
//! separate columns, so each row's estimate lands in one side's three columns
//! and the other side is zero.

use std::str::FromStr;

use crate::percentile::{Estimate, Quantile};

/// Metric name of server-side request durations
pub const SERVER_METRIC: &str = "http.server.request.duration";
/// Metric name of client-side request durations
pub const CLIENT_METRIC: &str = "http.client.request.duration";

/// Column names in [`LatencyColumns::values`] order.
pub const COLUMN_NAMES: [&str; 6] = [
    "client_P90",
    "client_P95",
    "client_P99",
    "server_P90",
    "server_P95",
    "server_P99",
];

/// Which side of a request recorded a histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Recorded by the caller
    Client,
    /// Recorded by the callee
    Server,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("not a request duration metric: {0}")]
/// Metric name is neither the client nor the server duration
pub struct UnknownMetric(pub String);

impl FromStr for Direction {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            SERVER_METRIC => Ok(Self::Server),
            CLIENT_METRIC => Ok(Self::Client),
            _ => Err(UnknownMetric(s.to_string())),
        }
    }
}

/// The six always-present latency columns of one row.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatencyColumns {
    /// Client-side P90
    pub client_p90: f64,
    /// Client-side P95
    pub client_p95: f64,
    /// Client-side P99
    pub client_p99: f64,
    /// Server-side P90
    pub server_p90: f64,
    /// Server-side P95
    pub server_p95: f64,
    /// Server-side P99
    pub server_p99: f64,
}

impl LatencyColumns {
    /// Place `estimate` in the columns of `direction`. With no direction
    /// every column is zero.
    #[must_use]
    pub fn split(direction: Option<Direction>, estimate: Estimate) -> Self {
        let mut columns = Self::default();
        if let Some(direction) = direction {
            for quantile in Quantile::ALL {
                *columns.slot_mut(direction, quantile) = estimate.get(quantile);
            }
        }
        columns
    }

    /// The value for one side and quantile
    #[must_use]
    pub fn get(&self, direction: Direction, quantile: Quantile) -> f64 {
        match (direction, quantile) {
            (Direction::Client, Quantile::P90) => self.client_p90,
            (Direction::Client, Quantile::P95) => self.client_p95,
            (Direction::Client, Quantile::P99) => self.client_p99,
            (Direction::Server, Quantile::P90) => self.server_p90,
            (Direction::Server, Quantile::P95) => self.server_p95,
            (Direction::Server, Quantile::P99) => self.server_p99,
        }
    }

    fn slot_mut(&mut self, direction: Direction, quantile: Quantile) -> &mut f64 {
        match (direction, quantile) {
            (Direction::Client, Quantile::P90) => &mut self.client_p90,
            (Direction::Client, Quantile::P95) => &mut self.client_p95,
            (Direction::Client, Quantile::P99) => &mut self.client_p99,
            (Direction::Server, Quantile::P90) => &mut self.server_p90,
            (Direction::Server, Quantile::P95) => &mut self.server_p95,
            (Direction::Server, Quantile::P99) => &mut self.server_p99,
        }
    }

    /// All six values in [`COLUMN_NAMES`] order
    #[must_use]
    pub fn values(&self) -> [f64; 6] {
        [
            self.client_p90,
            self.client_p95,
            self.client_p99,
            self.server_p90,
            self.server_p95,
            self.server_p99,
        ]
    }

    /// Inverse of [`LatencyColumns::values`]
    #[must_use]
    pub fn from_values(values: [f64; 6]) -> Self {
        let [
            client_p90,
            client_p95,
            client_p99,
            server_p90,
            server_p95,
            server_p99,
        ] = values;
        Self {
            client_p90,
            client_p95,
            client_p99,
            server_p90,
            server_p95,
            server_p99,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ESTIMATE: Estimate = Estimate {
        p90: 1.5,
        p95: 2.5,
        p99: 3.5,
    };

    #[test]
    fn direction_from_metric_name() {
        assert_eq!(SERVER_METRIC.parse(), Ok(Direction::Server));
        assert_eq!(CLIENT_METRIC.parse(), Ok(Direction::Client));
        assert_eq!(
            "rpc.server.duration".parse::<Direction>(),
            Err(UnknownMetric("rpc.server.duration".to_string()))
        );
    }

    #[test]
    fn server_rows_fill_server_columns_only() {
        let columns = LatencyColumns::split(Some(Direction::Server), ESTIMATE);
        assert_eq!(columns.values(), [0.0, 0.0, 0.0, 1.5, 2.5, 3.5]);
    }

    #[test]
    fn client_rows_fill_client_columns_only() {
        let columns = LatencyColumns::split(Some(Direction::Client), ESTIMATE);
        assert_eq!(columns.values(), [1.5, 2.5, 3.5, 0.0, 0.0, 0.0]);
        assert_eq!(columns.get(Direction::Client, Quantile::P95), 2.5);
        assert_eq!(columns.get(Direction::Server, Quantile::P95), 0.0);
    }

    #[test]
    fn unknown_direction_is_all_zero() {
        assert_eq!(LatencyColumns::split(None, ESTIMATE), LatencyColumns::default());
    }

    #[test]
    fn values_round_trip() {
        let columns = LatencyColumns::split(Some(Direction::Client), ESTIMATE);
        assert_eq!(LatencyColumns::from_values(columns.values()), columns);
    }
}
