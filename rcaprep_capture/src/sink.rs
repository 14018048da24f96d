//! File sinks for capture output
//!
//! A [`Sink`] binds a path to a CSV [`Format`] and decides, once, whether the
//! file gets a header:
//!
//! * [`Mode::Append`] -- a file that does not exist is created, along with
//!   any missing parent directories, and receives a header. A file that
//!   already exists is appended to without one. Running the same batch twice
//!   therefore yields one header and both batches' rows.
//! * [`Mode::Truncate`] -- the file is replaced and always receives a header.
//!
//! The file is opened on the first record. A sink that never sees a record
//! leaves the filesystem untouched, so a later append still starts the file
//! with a header.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::formats::{self, OutputFormat, delimited::Format};

/// Errors produced by [`Sink`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The target file or its parent directory could not be opened
    #[error("Failed to open {path:?} for writing: {source}")]
    Open {
        /// Target path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: Box<io::Error>,
    },
    /// Writing a record failed
    #[error("Failed to write to {path:?}: {source}")]
    Write {
        /// Target path
        path: PathBuf,
        /// Underlying format error
        #[source]
        source: Box<formats::Error>,
    },
}

/// How a [`Sink`] treats an existing file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Create with header if absent, else append without header
    Append,
    /// Replace any existing file, always with a header
    Truncate,
}

/// Builds the format a [`Sink`] writes through once its file is open. The
/// flag says whether the format must start with a header.
pub type Opener<F> = fn(BufWriter<File>, bool) -> F;

/// A lazily opened capture file, CSV unless built with [`Sink::with_format`].
#[derive(Debug)]
pub struct Sink<F: OutputFormat = Format<BufWriter<File>>> {
    path: PathBuf,
    mode: Mode,
    opener: Opener<F>,
    format: Option<F>,
    records: u64,
}

impl Sink {
    /// Create a new CSV instance of `Sink`. Nothing is touched on disk yet.
    #[must_use]
    pub fn new<P: Into<PathBuf>>(path: P, mode: Mode) -> Self {
        Self::with_format(path, mode, Format::new)
    }
}

impl<F: OutputFormat> Sink<F> {
    /// Create a new instance of `Sink` writing through the format `opener`
    /// builds. Nothing is touched on disk yet.
    #[must_use]
    pub fn with_format<P: Into<PathBuf>>(path: P, mode: Mode, opener: Opener<F>) -> Self {
        Self {
            path: path.into(),
            mode,
            opener,
            format: None,
            records: 0,
        }
    }

    /// The target path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_err(&self, source: formats::Error) -> Error {
        Error::Write {
            path: self.path.clone(),
            source: Box::new(source),
        }
    }

    fn open(&self) -> Result<F, Error> {
        let open_err = |source: io::Error| Error::Open {
            path: self.path.clone(),
            source: Box::new(source),
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(open_err)?;
        }

        let (file, header) = match self.mode {
            Mode::Append => {
                let exists = self.path.exists();
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
                    .map_err(open_err)?;
                (file, !exists)
            }
            Mode::Truncate => (File::create(&self.path).map_err(open_err)?, true),
        };
        debug!(
            path = %self.path.display(),
            mode = ?self.mode,
            header,
            "Opened capture sink"
        );
        Ok((self.opener)(BufWriter::new(file), header))
    }

    /// Write one row, opening the file first if this is the first row.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the row cannot be
    /// written.
    pub fn write_record<R: Serialize>(&mut self, record: &R) -> Result<(), Error> {
        let format = match self.format.take() {
            Some(format) => format,
            None => self.open()?,
        };
        let result = self.format.insert(format).write_record(record);
        result.map_err(|source| self.write_err(source))?;
        self.records += 1;
        Ok(())
    }

    /// Write every row of `records`.
    ///
    /// # Errors
    ///
    /// See [`Sink::write_record`].
    pub fn write_all<'a, R, I>(&mut self, records: I) -> Result<(), Error>
    where
        R: Serialize + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    /// Flush buffered rows to disk. A sink that has not been opened has
    /// nothing to flush.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<(), Error> {
        let result = match self.format.as_mut() {
            Some(format) => format.flush(),
            None => Ok(()),
        };
        result.map_err(|source| self.write_err(source))
    }

    /// Flush and close the file, returning the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn finish(mut self) -> Result<u64, Error> {
        if let Some(format) = self.format.take() {
            format.close().map_err(|source| self.write_err(source))?;
        }
        Ok(self.records)
    }
}

/// Append `records` to `path` under the [`Mode::Append`] contract.
///
/// # Errors
///
/// See [`Sink::write_record`] and [`Sink::finish`].
pub fn append<R: Serialize>(path: &Path, records: &[R]) -> Result<u64, Error> {
    let mut sink = Sink::new(path, Mode::Append);
    sink.write_all(records)?;
    sink.finish()
}

/// Replace `path` with `records` under the [`Mode::Truncate`] contract.
///
/// # Errors
///
/// See [`Sink::write_record`] and [`Sink::finish`].
pub fn replace<R: Serialize>(path: &Path, records: &[R]) -> Result<u64, Error> {
    let mut sink = Sink::new(path, Mode::Truncate);
    sink.write_all(records)?;
    sink.finish()
}
