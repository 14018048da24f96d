//! Reading collector CSV exports
//!
//! A file is read in two stages. The header is checked first: a file missing
//! any required column is rejected whole, as it is most likely not the kind of
//! file the caller thinks it is. Rows are then decoded one by one and a row
//! that fails to decode is set aside with its line number while the rest of
//! the file proceeds.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::debug;

/// Errors produced while opening or checking an input file
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The file could not be opened
    #[error("Failed to open {path:?}: {source}")]
    Open {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: Box<io::Error>,
    },
    /// The file lacks columns the caller requires
    #[error("{path:?} is missing required columns: {}", missing.join(", "))]
    SchemaMismatch {
        /// File path
        path: PathBuf,
        /// Required columns not found in the header
        missing: Vec<String>,
    },
    /// The file could not be read as CSV at all
    #[error("Failed to read {path:?}: {source}")]
    Csv {
        /// File path
        path: PathBuf,
        /// Underlying CSV error
        #[source]
        source: Box<csv::Error>,
    },
}

/// A row that could not be decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// One-based line number in the file, when known
    pub line: Option<u64>,
    /// What went wrong
    pub message: String,
}

/// The decoded rows of one file and the rows that were set aside.
#[derive(Debug)]
pub struct Table<T> {
    /// Decoded rows, in file order
    pub rows: Vec<T>,
    /// One-based line of each entry of `rows`, when known
    pub lines: Vec<Option<u64>>,
    /// Rows that failed to decode
    pub rejected: Vec<RowError>,
}

impl<T> Table<T> {
    /// Line of the `index`-th decoded row
    #[must_use]
    pub fn line(&self, index: usize) -> Option<u64> {
        self.lines.get(index).copied().flatten()
    }
}

/// Read every row of the CSV file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, its header cannot be
/// read, or the header lacks any of `required`.
pub fn read_path<T: DeserializeOwned>(path: &Path, required: &[&str]) -> Result<Table<T>, Error> {
    let file = File::open(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source: Box::new(source),
    })?;
    read(path, file, required)
}

/// Read every row of CSV text from `reader`. `path` only names the source in
/// errors.
///
/// # Errors
///
/// See [`read_path`].
pub fn read<T, R>(path: &Path, reader: R, required: &[&str]) -> Result<Table<T>, Error>
where
    T: DeserializeOwned,
    R: Read,
{
    let csv_err = |source: csv::Error| Error::Csv {
        path: path.to_path_buf(),
        source: Box::new(source),
    };

    let mut reader = csv::ReaderBuilder::new().from_reader(reader);
    let headers = reader.headers().map_err(csv_err)?.clone();

    let missing: Vec<String> = required
        .iter()
        .filter(|column| !headers.iter().any(|h| h == **column))
        .map(|column| (*column).to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Error::SchemaMismatch {
            path: path.to_path_buf(),
            missing,
        });
    }

    let mut rows = Vec::new();
    let mut lines = Vec::new();
    let mut rejected = Vec::new();
    let mut record = csv::StringRecord::new();
    loop {
        match reader.read_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {
                let line = record.position().map(csv::Position::line);
                match record.deserialize::<T>(Some(&headers)) {
                    Ok(row) => {
                        rows.push(row);
                        lines.push(line);
                    }
                    Err(err) => rejected.push(RowError {
                        line,
                        message: err.to_string(),
                    }),
                }
            }
            Err(err) if err.is_io_error() => return Err(csv_err(err)),
            Err(err) => rejected.push(RowError {
                line: err.position().map(csv::Position::line),
                message: err.to_string(),
            }),
        }
    }
    debug!(
        path = %path.display(),
        rows = rows.len(),
        rejected = rejected.len(),
        "Read input file"
    );

    Ok(Table {
        rows,
        lines,
        rejected,
    })
}

/// Names of the `.csv` files directly inside `dir`, sorted.
///
/// # Errors
///
/// Returns an error if `dir` cannot be listed.
pub fn csv_files(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_file() && name.ends_with(".csv") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
