//! Run diagnostics
//!
//! Nothing that goes wrong with a single file or row stops a run. Each
//! failure is recorded here as a [`Diagnostic`], logged at `warn`, and the
//! orchestrator moves on to the next unit of work. The [`Report`] is what a
//! caller inspects afterwards.

use std::fmt;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::{input, latency, merge, trace};

/// Broad class of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    /// Required columns are absent
    SchemaMismatch,
    /// A histogram cannot be normalized or estimated
    Arithmetic,
    /// A series has no counterpart to merge with
    Lookup,
    /// A value could not be decoded
    Parse,
    /// A file could not be read or written
    Io,
    /// Two series could not be aligned row for row
    Alignment,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::SchemaMismatch => "schema_mismatch",
            Kind::Arithmetic => "arithmetic",
            Kind::Lookup => "lookup",
            Kind::Parse => "parse",
            Kind::Io => "io",
            Kind::Alignment => "alignment",
        };
        f.write_str(name)
    }
}

/// One recorded failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// File the failure concerns
    pub path: PathBuf,
    /// One-based line within `path`, when the failure is a single row
    pub line: Option<u64>,
    /// Class of failure
    pub kind: Kind,
    /// Human readable detail
    pub message: String,
}

impl Diagnostic {
    /// Create a new instance of `Diagnostic`
    #[must_use]
    pub fn new<P: Into<PathBuf>>(path: P, kind: Kind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line: None,
            kind,
            message: message.into(),
        }
    }

    /// Attach a line number
    #[must_use]
    pub fn at_line(mut self, line: Option<u64>) -> Self {
        self.line = line;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.path.display())?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Error kinds a module's failures are reported under
pub trait Classify {
    /// The kind of this failure
    fn kind(&self) -> Kind;
}

impl Classify for input::Error {
    fn kind(&self) -> Kind {
        match self {
            input::Error::Open { .. } => Kind::Io,
            input::Error::SchemaMismatch { .. } => Kind::SchemaMismatch,
            input::Error::Csv { source, .. } if source.is_io_error() => Kind::Io,
            input::Error::Csv { .. } => Kind::Parse,
        }
    }
}

impl Classify for latency::Error {
    fn kind(&self) -> Kind {
        match self.source {
            rcaprep_histogram::Error::ZeroCount { .. }
            | rcaprep_histogram::Error::EmptyHistogram => Kind::Arithmetic,
            rcaprep_histogram::Error::Parse(_) | rcaprep_histogram::Error::BucketCount { .. } => {
                Kind::Parse
            }
        }
    }
}

impl Classify for merge::Error {
    fn kind(&self) -> Kind {
        Kind::Alignment
    }
}

impl Classify for trace::Error {
    fn kind(&self) -> Kind {
        Kind::Arithmetic
    }
}

impl Classify for rcaprep_capture::sink::Error {
    fn kind(&self) -> Kind {
        Kind::Io
    }
}

/// Every diagnostic of one run, in the order they occurred.
#[derive(Debug, Default)]
pub struct Report {
    diagnostics: Vec<Diagnostic>,
}

impl Report {
    /// Create a new, empty instance of `Report`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and log a diagnostic
    pub fn push(&mut self, diagnostic: Diagnostic) {
        warn!(
            path = %diagnostic.path.display(),
            line = diagnostic.line,
            kind = %diagnostic.kind,
            "{}",
            diagnostic.message
        );
        self.diagnostics.push(diagnostic);
    }

    /// Record a classified error against `path`
    pub fn error<E>(&mut self, path: &Path, err: &E)
    where
        E: Classify + fmt::Display,
    {
        self.error_at(path, None, err);
    }

    /// Record a classified error against one line of `path`
    pub fn error_at<E>(&mut self, path: &Path, line: Option<u64>, err: &E)
    where
        E: Classify + fmt::Display,
    {
        self.push(Diagnostic::new(path, err.kind(), err.to_string()).at_line(line));
    }

    /// Record the rows of an input file that were set aside
    pub fn rejected(&mut self, path: &Path, rejected: Vec<input::RowError>) {
        for row in rejected {
            self.push(Diagnostic::new(path, Kind::Parse, row.message).at_line(row.line));
        }
    }

    /// All diagnostics recorded so far
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Number of diagnostics per kind, ordered by kind
    #[must_use]
    pub fn counts(&self) -> Vec<(Kind, usize)> {
        let mut counts: FxHashMap<Kind, usize> = FxHashMap::default();
        for diagnostic in &self.diagnostics {
            *counts.entry(diagnostic.kind).or_default() += 1;
        }
        let mut counts: Vec<_> = counts.into_iter().collect();
        counts.sort_unstable();
        counts
    }

    /// Whether the run recorded no diagnostics
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_group_by_kind() {
        let mut report = Report::new();
        assert!(report.is_clean());

        report.push(Diagnostic::new("a.csv", Kind::Lookup, "no counterpart"));
        report.push(Diagnostic::new("b.csv", Kind::Parse, "bad row").at_line(Some(4)));
        report.push(Diagnostic::new("c.csv", Kind::Parse, "bad row"));

        assert!(!report.is_clean());
        assert_eq!(report.diagnostics().len(), 3);
        assert_eq!(report.counts(), vec![(Kind::Lookup, 1), (Kind::Parse, 2)]);
    }

    #[test]
    fn display_names_file_and_line() {
        let diagnostic = Diagnostic::new("b.csv", Kind::Parse, "bad row").at_line(Some(4));
        assert_eq!(diagnostic.to_string(), "[parse] b.csv:4: bad row");
    }

    #[test]
    fn merge_errors_are_alignment() {
        let mut report = Report::new();
        let err = merge::Error::RowCountMismatch {
            latency: 2,
            resource: 3,
        };
        report.error(Path::new("cart-service.csv"), &err);
        assert_eq!(report.diagnostics()[0].kind, Kind::Alignment);
    }

    #[test]
    fn rejected_rows_keep_line_numbers() {
        let mut report = Report::new();
        report.rejected(
            Path::new("traces.csv"),
            vec![input::RowError {
                line: Some(7),
                message: "invalid digit".to_string(),
            }],
        );
        assert_eq!(report.diagnostics()[0].line, Some(7));
        assert_eq!(report.diagnostics()[0].kind, Kind::Parse);
    }
}
