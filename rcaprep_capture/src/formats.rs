//! Output format abstraction for capture files
//!
//! This module provides a trait-based abstraction for capture output
//! formats. Rows are any `serde::Serialize` struct whose field names, after
//! `serde(rename)`, are the column names.

use serde::Serialize;

pub mod delimited;

/// Format operation errors
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Delimited text format errors
    #[error("CSV format error: {0}")]
    Delimited(#[from] delimited::Error),
    /// IO errors during write operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for output format implementations
///
/// Implementations handle the serialization and writing of rows to a
/// specific file format. Whether a header is emitted is decided when the
/// format is constructed, not per record.
pub trait OutputFormat {
    /// Write a single row to the output
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    fn write_record<R: Serialize>(&mut self, record: &R) -> Result<(), Error>;

    /// Flush any buffered data to the underlying writer
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    fn flush(&mut self) -> Result<(), Error>;

    /// Close and finalize the output format
    ///
    /// Consumes the format as it can no longer be used after closing.
    ///
    /// # Errors
    ///
    /// Returns an error if closing fails.
    fn close(self) -> Result<(), Error>;
}
