//! CSV format
//!
//! This format writes one comma separated row per record, optionally
//! preceded by a header row derived from the record's field names.

use std::io::Write;

use serde::Serialize;

/// CSV format errors
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// IO errors during write operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization errors
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),
}

/// CSV format writer
#[derive(Debug)]
pub struct Format<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> Format<W> {
    /// Create a new instance of `Format`. When `header` is true the first
    /// record written is preceded by a header row.
    #[must_use]
    pub fn new(writer: W, header: bool) -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(header)
            .from_writer(writer);
        Self { writer }
    }

    /// Write a single row to the output
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn write_record<R: Serialize>(&mut self, record: &R) -> Result<(), Error> {
        self.writer.serialize(record)?;
        Ok(())
    }

    /// Flush any buffered data to the underlying writer
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails
    pub fn flush(&mut self) -> Result<(), Error> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and give back the underlying writer
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails
    pub fn into_inner(self) -> Result<W, Error> {
        self.writer
            .into_inner()
            .map_err(|err| Error::Io(err.into_error()))
    }
}

impl<W: Write> crate::formats::OutputFormat for Format<W> {
    fn write_record<R: Serialize>(&mut self, record: &R) -> Result<(), crate::formats::Error> {
        self.write_record(record).map_err(Into::into)
    }

    fn flush(&mut self) -> Result<(), crate::formats::Error> {
        self.flush().map_err(Into::into)
    }

    fn close(self) -> Result<(), crate::formats::Error> {
        let mut inner = self.into_inner()?;
        inner.flush()?;
        Ok(())
    }
}
