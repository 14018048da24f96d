//! Row shapes of every table rcaprep reads or writes
//!
//! Field names follow the collector's column names on input and the RCA
//! dataset's column names on output; `serde(rename)` carries the mapping.
//! Input rows tolerate extra columns. The `*_COLUMNS` constants list what
//! must be present for a file to be read at all.

use rcaprep_histogram::{BucketCounts, LatencyColumns};
use serde::{Deserialize, Serialize};

use crate::timestamp::Timestamp;

/// Columns required of a request-metrics file
pub const HISTOGRAM_COLUMNS: [&str; 5] =
    ["ServiceName", "MetricName", "BucketCounts", "Count", "TimeUnix"];

/// Columns required of a pod resource-metrics file
pub const RESOURCE_COLUMNS: [&str; 7] = [
    "TimeUnix",
    "k8s.pod.cpu.usage",
    "k8s.pod.memory.usage",
    "k8s.pod.memory_limit_utilization",
    "k8s.pod.network.errors",
    "receive_bytes",
    "transmit_bytes",
];

/// Columns required of a trace file
pub const TRACE_COLUMNS: [&str; 7] = [
    "Timestamp",
    "Duration",
    "TraceId",
    "SpanId",
    "ParentSpanId",
    "ServiceName",
    "SpanName",
];

/// Columns required of a log file. Severity columns are dropped on output
/// but their absence marks the file as foreign.
pub const LOG_COLUMNS: [&str; 7] = [
    "ServiceName",
    "Body",
    "SpanId",
    "TraceId",
    "SeverityText",
    "SeverityNumber",
    "Timestamp",
];

/// Columns the wide export needs of a per-service metric file
pub const BARO_COLUMNS: [&str; 5] = [
    "TimeUnix",
    "CpuUsage(m)",
    "MemoryUsage(Mi)",
    "PodServerLatencyP90(s)",
    "PodServerLatencyP95(s)",
];

/// One request-duration histogram as exported by the collector.
#[derive(Debug, Clone, Deserialize)]
pub struct HistogramRow {
    /// Service that recorded the histogram
    #[serde(rename = "ServiceName")]
    pub service_name: String,
    /// Client or server request duration metric
    #[serde(rename = "MetricName")]
    pub metric_name: String,
    /// Per-bucket sample counts
    #[serde(rename = "BucketCounts")]
    pub bucket_counts: BucketCounts,
    /// Total number of samples
    #[serde(rename = "Count")]
    pub count: f64,
    /// Export time
    #[serde(rename = "TimeUnix")]
    pub time_unix: Timestamp,
}

/// One pod resource sample. Empty cells are `None`.
///
/// The same shape is used for window aggregates, so an aggregated file reads
/// back as a resource file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    /// Sample time
    #[serde(rename = "TimeUnix")]
    pub time_unix: Timestamp,
    /// CPU usage
    #[serde(rename = "k8s.pod.cpu.usage")]
    pub cpu: Option<f64>,
    /// Memory usage
    #[serde(rename = "k8s.pod.memory.usage")]
    pub memory: Option<f64>,
    /// Memory usage as a share of the pod's limit
    #[serde(rename = "k8s.pod.memory_limit_utilization")]
    pub memory_limit_utilization: Option<f64>,
    /// Network errors
    #[serde(rename = "k8s.pod.network.errors")]
    pub network_errors: Option<f64>,
    /// Bytes received
    #[serde(rename = "receive_bytes")]
    pub receive_bytes: Option<f64>,
    /// Bytes transmitted
    #[serde(rename = "transmit_bytes")]
    pub transmit_bytes: Option<f64>,
}

impl ResourceSample {
    /// The six numeric columns in input order
    #[must_use]
    pub fn values(&self) -> [Option<f64>; 6] {
        [
            self.cpu,
            self.memory,
            self.memory_limit_utilization,
            self.network_errors,
            self.receive_bytes,
            self.transmit_bytes,
        ]
    }

    /// Inverse of [`ResourceSample::values`]
    #[must_use]
    pub fn from_values(time_unix: Timestamp, values: [Option<f64>; 6]) -> Self {
        let [
            cpu,
            memory,
            memory_limit_utilization,
            network_errors,
            receive_bytes,
            transmit_bytes,
        ] = values;
        Self {
            time_unix,
            cpu,
            memory,
            memory_limit_utilization,
            network_errors,
            receive_bytes,
            transmit_bytes,
        }
    }
}

/// One row of a service's latency series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencySample {
    /// Sample time
    #[serde(rename = "TimeUnix")]
    pub time_unix: Timestamp,
    /// Client-side P90
    #[serde(rename = "client_P90")]
    pub client_p90: f64,
    /// Client-side P95
    #[serde(rename = "client_P95")]
    pub client_p95: f64,
    /// Client-side P99
    #[serde(rename = "client_P99")]
    pub client_p99: f64,
    /// Server-side P90
    #[serde(rename = "server_P90")]
    pub server_p90: f64,
    /// Server-side P95
    #[serde(rename = "server_P95")]
    pub server_p95: f64,
    /// Server-side P99
    #[serde(rename = "server_P99")]
    pub server_p99: f64,
}

impl LatencySample {
    /// Create a new instance of `LatencySample`
    #[must_use]
    pub fn new(time_unix: Timestamp, columns: LatencyColumns) -> Self {
        Self {
            time_unix,
            client_p90: columns.client_p90,
            client_p95: columns.client_p95,
            client_p99: columns.client_p99,
            server_p90: columns.server_p90,
            server_p95: columns.server_p95,
            server_p99: columns.server_p99,
        }
    }

    /// The six latency columns
    #[must_use]
    pub fn columns(&self) -> LatencyColumns {
        LatencyColumns {
            client_p90: self.client_p90,
            client_p95: self.client_p95,
            client_p99: self.client_p99,
            server_p90: self.server_p90,
            server_p95: self.server_p95,
            server_p99: self.server_p99,
        }
    }
}

/// A latency row and a resource row of the same service, side by side.
///
/// Column order is the latency series followed by the resource series
/// without its time column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MergedSample {
    /// Time, taken from the latency row
    #[serde(rename = "TimeUnix")]
    pub time_unix: Timestamp,
    /// Client-side P90
    #[serde(rename = "client_P90")]
    pub client_p90: f64,
    /// Client-side P95
    #[serde(rename = "client_P95")]
    pub client_p95: f64,
    /// Client-side P99
    #[serde(rename = "client_P99")]
    pub client_p99: f64,
    /// Server-side P90
    #[serde(rename = "server_P90")]
    pub server_p90: f64,
    /// Server-side P95
    #[serde(rename = "server_P95")]
    pub server_p95: f64,
    /// Server-side P99
    #[serde(rename = "server_P99")]
    pub server_p99: f64,
    /// CPU usage
    #[serde(rename = "k8s.pod.cpu.usage")]
    pub cpu: Option<f64>,
    /// Memory usage
    #[serde(rename = "k8s.pod.memory.usage")]
    pub memory: Option<f64>,
    /// Memory usage as a share of the pod's limit
    #[serde(rename = "k8s.pod.memory_limit_utilization")]
    pub memory_limit_utilization: Option<f64>,
    /// Network errors
    #[serde(rename = "k8s.pod.network.errors")]
    pub network_errors: Option<f64>,
    /// Bytes received
    #[serde(rename = "receive_bytes")]
    pub receive_bytes: Option<f64>,
    /// Bytes transmitted
    #[serde(rename = "transmit_bytes")]
    pub transmit_bytes: Option<f64>,
}

impl MergedSample {
    /// Combine a latency row with a resource row
    #[must_use]
    pub fn new(latency: &LatencySample, resource: &ResourceSample) -> Self {
        Self {
            time_unix: latency.time_unix,
            client_p90: latency.client_p90,
            client_p95: latency.client_p95,
            client_p99: latency.client_p99,
            server_p90: latency.server_p90,
            server_p95: latency.server_p95,
            server_p99: latency.server_p99,
            cpu: resource.cpu,
            memory: resource.memory,
            memory_limit_utilization: resource.memory_limit_utilization,
            network_errors: resource.network_errors,
            receive_bytes: resource.receive_bytes,
            transmit_bytes: resource.transmit_bytes,
        }
    }
}

/// A row of the final per-service metric file, in the dataset's column
/// names and order. Network errors are not part of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricRecord {
    /// Sample time
    #[serde(rename = "TimeUnix")]
    pub time_unix: Timestamp,
    /// CPU usage
    #[serde(rename = "CpuUsage(m)")]
    pub cpu_usage: Option<f64>,
    /// Memory usage
    #[serde(rename = "MemoryUsage(Mi)")]
    pub memory_usage: Option<f64>,
    /// Memory usage as a share of the pod's limit
    #[serde(rename = "MemoryUsageRate(%)")]
    pub memory_usage_rate: Option<f64>,
    /// Bytes received
    #[serde(rename = "NetworkReceiveBytes")]
    pub network_receive_bytes: Option<f64>,
    /// Bytes transmitted
    #[serde(rename = "NetworkTransmitBytes")]
    pub network_transmit_bytes: Option<f64>,
    /// Client-side P90
    #[serde(rename = "PodClientLatencyP90(s)")]
    pub client_latency_p90: f64,
    /// Server-side P90
    #[serde(rename = "PodServerLatencyP90(s)")]
    pub server_latency_p90: f64,
    /// Client-side P95
    #[serde(rename = "PodClientLatencyP95(s)")]
    pub client_latency_p95: f64,
    /// Server-side P95
    #[serde(rename = "PodServerLatencyP95(s)")]
    pub server_latency_p95: f64,
    /// Client-side P99
    #[serde(rename = "PodClientLatencyP99(s)")]
    pub client_latency_p99: f64,
    /// Server-side P99
    #[serde(rename = "PodServerLatencyP99(s)")]
    pub server_latency_p99: f64,
}

impl From<&MergedSample> for MetricRecord {
    fn from(merged: &MergedSample) -> Self {
        Self {
            time_unix: merged.time_unix,
            cpu_usage: merged.cpu,
            memory_usage: merged.memory,
            memory_usage_rate: merged.memory_limit_utilization,
            network_receive_bytes: merged.receive_bytes,
            network_transmit_bytes: merged.transmit_bytes,
            client_latency_p90: merged.client_p90,
            server_latency_p90: merged.server_p90,
            client_latency_p95: merged.client_p95,
            server_latency_p95: merged.server_p95,
            client_latency_p99: merged.client_p99,
            server_latency_p99: merged.server_p99,
        }
    }
}

/// The columns of a [`MetricRecord`] the wide export keeps, read back from
/// a per-service metric file.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BaroSample {
    /// Sample time
    #[serde(rename = "TimeUnix")]
    pub time_unix: Timestamp,
    /// CPU usage
    #[serde(rename = "CpuUsage(m)")]
    pub cpu: Option<f64>,
    /// Memory usage
    #[serde(rename = "MemoryUsage(Mi)")]
    pub mem: Option<f64>,
    /// Server-side P90
    #[serde(rename = "PodServerLatencyP90(s)")]
    pub latency_p90: Option<f64>,
    /// Server-side P95
    #[serde(rename = "PodServerLatencyP95(s)")]
    pub latency_p95: Option<f64>,
}

/// One span as exported by the collector.
#[derive(Debug, Clone, Deserialize)]
pub struct TraceRow {
    /// Span start
    #[serde(rename = "Timestamp")]
    pub timestamp: Timestamp,
    /// Span duration in microseconds
    #[serde(rename = "Duration")]
    pub duration: u64,
    /// Trace id
    #[serde(rename = "TraceId")]
    pub trace_id: String,
    /// Span id
    #[serde(rename = "SpanId")]
    pub span_id: String,
    /// Parent span id, empty for roots
    #[serde(rename = "ParentSpanId")]
    pub parent_span_id: String,
    /// Service that emitted the span
    #[serde(rename = "ServiceName")]
    pub service_name: String,
    /// Operation name
    #[serde(rename = "SpanName")]
    pub span_name: String,
}

/// One span in the dataset's trace schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceRecord {
    /// Trace id
    #[serde(rename = "TraceID")]
    pub trace_id: String,
    /// Span id
    #[serde(rename = "SpanID")]
    pub span_id: String,
    /// Parent span id
    #[serde(rename = "ParentID")]
    pub parent_id: String,
    /// Service that emitted the span
    #[serde(rename = "PodName")]
    pub pod_name: String,
    /// Operation name
    #[serde(rename = "OperationName")]
    pub operation_name: String,
    /// Span start, nanoseconds since the epoch
    #[serde(rename = "StartTimeUnixNano")]
    pub start_time_unix_nano: i64,
    /// Span end, nanoseconds since the epoch
    #[serde(rename = "EndTimeUnixNano")]
    pub end_time_unix_nano: i64,
}

/// One log line as exported by the collector.
#[derive(Debug, Clone, Deserialize)]
pub struct LogRow {
    /// Service that emitted the line
    #[serde(rename = "ServiceName")]
    pub service_name: String,
    /// Log message
    #[serde(rename = "Body")]
    pub body: String,
    /// Span id, may be empty
    #[serde(rename = "SpanId")]
    pub span_id: String,
    /// Trace id, may be empty
    #[serde(rename = "TraceId")]
    pub trace_id: String,
    /// Emission time, kept verbatim
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
}

/// One log line in the dataset's log schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    /// Emission time
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    /// Node name, unknown to the collector and left empty
    #[serde(rename = "Node")]
    pub node: String,
    /// Service that emitted the line
    #[serde(rename = "PodName")]
    pub pod_name: String,
    /// Container name
    #[serde(rename = "Container")]
    pub container: String,
    /// Trace id
    #[serde(rename = "TraceID")]
    pub trace_id: String,
    /// Span id
    #[serde(rename = "SpanID")]
    pub span_id: String,
    /// Log message
    #[serde(rename = "Log")]
    pub log: String,
}
