//! Wide-format export for BARO
//!
//! BARO reads one table holding every service side by side. This module
//! builds that table from the accumulated per-service metric files:
//!
//! ```text
//! <output_root>/metric/<prefix>-service.csv   (one per service)
//!     -> <output_root>/<file_name>
//!        TimeStamp,<p>_cpu,<p>_mem,<p>_latency-90,<p>_latency-95,<p>_error,...
//! ```
//!
//! `<p>` is the service's name prefix reduced to lowercase ASCII letters and
//! digits. Services are laid out in prefix order and rows are paired by
//! position. The time column holds Unix seconds, taken from the first service
//! that has the row. A service shorter than the table leaves its cells empty.
//! The `error` column marks a faulty sample and is always `0` here.

use std::collections::BTreeMap;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use rcaprep_capture::sink;
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config;
use crate::diagnostic::{Diagnostic, Kind, Report};
use crate::pipeline::METRIC_OUTPUT_DIR;
use crate::records::{BARO_COLUMNS, BaroSample};
use crate::{input, merge};

/// Name of the time column
pub const TIME_COLUMN: &str = "TimeStamp";

/// Per-service columns, each prefixed with `<p>_`
pub const SERIES_COLUMNS: [&str; 5] = ["cpu", "mem", "latency-90", "latency-95", "error"];

/// Rows kept by default
pub const DEFAULT_ROW_LIMIT: NonZeroUsize = match NonZeroUsize::new(80) {
    Some(n) => n,
    None => unreachable!(),
};

fn default_row_limit() -> NonZeroUsize {
    DEFAULT_ROW_LIMIT
}

fn default_file_name() -> String {
    "baro.csv".to_string()
}

/// Errors that stop an export
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The metric directory could not be listed
    #[error("Failed to list metric files in {path:?}: {source}")]
    ListSources {
        /// Metric directory
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: Box<io::Error>,
    },
    /// The wide table could not be written
    #[error(transparent)]
    Write(#[from] sink::Error),
}

/// Export configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Rows kept in the wide table
    #[serde(default = "default_row_limit")]
    pub row_limit: NonZeroUsize,
    /// File written under the output root
    #[serde(default = "default_file_name")]
    pub file_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            row_limit: default_row_limit(),
            file_name: default_file_name(),
        }
    }
}

/// Column prefix of the service whose metric file is named `file_name`.
#[must_use]
pub fn column_prefix(file_name: &str, delimiter: &str) -> String {
    let stem = file_name.strip_suffix(".csv").unwrap_or(file_name);
    merge::prefix(stem, delimiter)
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// One row of the wide table: a time and, per service, that service's
/// sample at the same position if it has one.
#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    /// Unix seconds
    pub timestamp: i64,
    /// One entry per service, in column order
    pub samples: Vec<Option<BaroSample>>,
}

/// Every service's metrics side by side.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WideTable {
    /// Header, time column first
    pub columns: Vec<String>,
    /// Rows in position order
    pub rows: Vec<WideRow>,
}

impl WideTable {
    /// Lay `series`, keyed by column prefix, side by side, keeping at most
    /// `row_limit` rows.
    #[must_use]
    pub fn build(series: &BTreeMap<String, Vec<BaroSample>>, row_limit: NonZeroUsize) -> Self {
        let mut columns = Vec::with_capacity(1 + series.len() * SERIES_COLUMNS.len());
        columns.push(TIME_COLUMN.to_string());
        for prefix in series.keys() {
            columns.extend(SERIES_COLUMNS.iter().map(|c| format!("{prefix}_{c}")));
        }

        let height = series
            .values()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .min(row_limit.get());
        let rows = (0..height)
            .filter_map(|i| {
                let samples: Vec<Option<BaroSample>> =
                    series.values().map(|s| s.get(i).copied()).collect();
                let first = samples.iter().flatten().next()?;
                Some(WideRow {
                    timestamp: first.time_unix.unix_seconds(),
                    samples,
                })
            })
            .collect();
        Self { columns, rows }
    }

    fn lines(&self) -> Vec<Line<'_>> {
        let mut lines = Vec::with_capacity(1 + self.rows.len());
        lines.push(Line::Header(&self.columns));
        lines.extend(self.rows.iter().map(Line::Row));
        lines
    }
}

/// A CSV line of the wide table. The column set is only known at run time,
/// so the header is written as an ordinary line ahead of the rows.
#[derive(Debug)]
enum Line<'a> {
    Header(&'a [String]),
    Row(&'a WideRow),
}

impl Serialize for Line<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Line::Header(columns) => serializer.collect_seq(columns.iter()),
            Line::Row(row) => {
                let mut seq =
                    serializer.serialize_seq(Some(1 + row.samples.len() * SERIES_COLUMNS.len()))?;
                seq.serialize_element(&row.timestamp)?;
                for sample in &row.samples {
                    match sample {
                        Some(sample) => {
                            seq.serialize_element(&sample.cpu)?;
                            seq.serialize_element(&sample.mem)?;
                            seq.serialize_element(&sample.latency_p90)?;
                            seq.serialize_element(&sample.latency_p95)?;
                            seq.serialize_element(&0u8)?;
                        }
                        None => {
                            for _ in SERIES_COLUMNS {
                                seq.serialize_element(&None::<f64>)?;
                            }
                        }
                    }
                }
                seq.end()
            }
        }
    }
}

/// Read every per-service metric file under `dir`, keyed by column prefix.
///
/// A file that cannot be read, has an undecodable row, or maps to a prefix
/// already taken is left out and recorded in `report`.
fn read_series(
    dir: &Path,
    delimiter: &str,
    report: &mut Report,
) -> Result<BTreeMap<String, Vec<BaroSample>>, Error> {
    let names = input::csv_files(dir).map_err(|source| Error::ListSources {
        path: dir.to_path_buf(),
        source: Box::new(source),
    })?;

    let mut series: BTreeMap<String, (String, Vec<BaroSample>)> = BTreeMap::new();
    for name in names {
        let path = dir.join(&name);
        let samples = match input::read_path::<BaroSample>(&path, &BARO_COLUMNS) {
            Ok(table) if table.rejected.is_empty() => table.rows,
            Ok(table) => {
                report.rejected(&path, table.rejected);
                continue;
            }
            Err(err) => {
                report.error(&path, &err);
                continue;
            }
        };
        let prefix = column_prefix(&name, delimiter);
        if let Some((taken, _)) = series.get(&prefix) {
            report.push(Diagnostic::new(
                &path,
                Kind::Alignment,
                format!("column prefix {prefix:?} is already taken by {taken}"),
            ));
            continue;
        }
        debug!(path = %path.display(), %prefix, rows = samples.len(), "Read metric series");
        series.insert(prefix, (name, samples));
    }
    Ok(series
        .into_iter()
        .map(|(prefix, (_, samples))| (prefix, samples))
        .collect())
}

/// Build the wide table from the metric files under the output root and
/// write it there, replacing any earlier export. Returns the rows written.
///
/// # Errors
///
/// Returns an error if the metric directory cannot be listed or the table
/// cannot be written. Failures of single metric files are recorded in
/// `report` instead.
pub fn export(config: &config::Config, report: &mut Report) -> Result<usize, Error> {
    let source = config.output_root.join(METRIC_OUTPUT_DIR);
    let series = read_series(&source, &config.merge.prefix_delimiter, report)?;
    let table = WideTable::build(&series, config.baro.row_limit);
    if table.rows.is_empty() {
        info!(path = %source.display(), "No metric rows to export");
        return Ok(0);
    }

    let target = config.output_root.join(&config.baro.file_name);
    sink::replace(&target, &table.lines())?;
    info!(
        path = %target.display(),
        services = series.len(),
        rows = table.rows.len(),
        "Exported wide table"
    );
    Ok(table.rows.len())
}
