//! Reshaping collector log lines into the dataset's log schema
//!
//! The collector does not know the node a line came from, and every
//! instrumented workload runs as a single `server` container.

use crate::records::{LogRecord, LogRow};

/// Container name given to every log line
pub const CONTAINER: &str = "server";

impl From<LogRow> for LogRecord {
    fn from(row: LogRow) -> Self {
        Self {
            timestamp: row.timestamp,
            node: String::new(),
            pod_name: row.service_name,
            container: CONTAINER.to_string(),
            trace_id: row.trace_id,
            span_id: row.span_id,
            log: row.body,
        }
    }
}
