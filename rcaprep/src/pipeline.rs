//! Orchestration of a whole run
//!
//! A run walks every case, a directory of raw exports captured for one fault
//! injection, and performs the configured steps on it:
//!
//! ```text
//! <input_root>/<case>/<phase>/logs.csv              -> <work_root>/<case>/log.csv
//! <input_root>/<case>/<phase>/traces.csv            -> <work_root>/<case>/trace.csv
//! <input_root>/<case>/<phase>/request_metrics.csv   -> <work_root>/<case>/latency/<service>.csv
//! <input_root>/<case>/<phase>/processed_metrics/*   -> <work_root>/<case>/resource/<pod>.csv
//!                             latency + resource    -> <work_root>/<case>/merged/<prefix>-service.csv
//! ```
//!
//! Per-case files are rewritten on every run. Each case's logs, traces and
//! merged metrics are also appended to the accumulated dataset under
//! `<output_root>`, which is only ever appended to.
//!
//! Failures are confined to the file or row they occur in. They are recorded
//! in the returned [`Report`] and the run carries on. Only an unreadable
//! input root stops a run, as there is then nothing to do.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rcaprep_capture::sink;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{Config, Step};
use crate::diagnostic::{Diagnostic, Kind, Report};
use crate::records::{
    HISTOGRAM_COLUMNS, HistogramRow, LOG_COLUMNS, LatencySample, LogRecord, LogRow,
    MetricRecord, RESOURCE_COLUMNS, ResourceSample, TRACE_COLUMNS, TraceRecord, TraceRow,
};
use crate::{aggregate, input, latency, merge, trace};

const LOGS_FILE: &str = "logs.csv";
const TRACES_FILE: &str = "traces.csv";
const REQUEST_METRICS_FILE: &str = "request_metrics.csv";
const RESOURCE_DIR: &str = "processed_metrics";

const LOG_OUTPUT: &str = "log.csv";
const TRACE_OUTPUT: &str = "trace.csv";
/// Directory under the output root holding one merged metric file per service
pub const METRIC_OUTPUT_DIR: &str = "metric";

/// Errors that stop a run
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The case list could not be discovered
    #[error("Failed to list cases in {path:?}: {source}")]
    ListCases {
        /// Input root
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: Box<io::Error>,
    },
}

/// Input and work locations of one case
#[derive(Debug, Clone)]
struct CasePaths {
    input: PathBuf,
    work: PathBuf,
}

impl CasePaths {
    fn input(&self, name: &str) -> PathBuf {
        self.input.join(name)
    }

    fn work(&self, name: &str) -> PathBuf {
        self.work.join(name)
    }
}

/// Runs the configured steps over every case.
#[derive(Debug)]
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    /// Create a new instance of `Pipeline`
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// The cases this run will process.
    ///
    /// The configured list when it is non-empty, otherwise every
    /// sub-directory of the input root, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the input root must be listed and cannot be.
    pub fn cases(&self) -> Result<Vec<String>, Error> {
        if !self.config.cases.is_empty() {
            return Ok(self.config.cases.clone());
        }
        let root = &self.config.input_root;
        let list_err = |source: io::Error| Error::ListCases {
            path: root.clone(),
            source: Box::new(source),
        };
        let mut cases = Vec::new();
        for entry in fs::read_dir(root).map_err(list_err)? {
            let entry = entry.map_err(list_err)?;
            if entry.file_type().map_err(list_err)?.is_dir() {
                cases.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        cases.sort();
        Ok(cases)
    }

    /// Process every case.
    ///
    /// # Errors
    ///
    /// Returns an error only if the case list cannot be determined. Every
    /// other failure is recorded in the returned [`Report`].
    pub fn run(&self) -> Result<Report, Error> {
        let cases = self.cases()?;
        info!(cases = cases.len(), "Starting run");

        let mut report = Report::new();
        for case in &cases {
            let paths = CasePaths {
                input: self.config.input_root.join(case).join(&self.config.phase),
                work: self.config.work_root.join(case),
            };
            info!(case = %case, "Processing case");
            if self.config.runs(Step::Logs) {
                self.logs(&paths, &mut report);
            }
            if self.config.runs(Step::Traces) {
                self.traces(&paths, &mut report);
            }
            if self.config.runs(Step::Metrics) {
                self.metrics(&paths, &mut report);
            }
        }

        info!(
            cases = cases.len(),
            diagnostics = report.diagnostics().len(),
            "Run complete"
        );
        Ok(report)
    }

    fn logs(&self, paths: &CasePaths, report: &mut Report) {
        let path = paths.input(LOGS_FILE);
        let Some(table) = read_table::<LogRow>(&path, &LOG_COLUMNS, report) else {
            return;
        };
        let records: Vec<LogRecord> = table.rows.into_iter().map(LogRecord::from).collect();
        self.publish(&records, &paths.work(LOG_OUTPUT), LOG_OUTPUT, report);
    }

    fn traces(&self, paths: &CasePaths, report: &mut Report) {
        let path = paths.input(TRACES_FILE);
        let Some(table) = read_table::<TraceRow>(&path, &TRACE_COLUMNS, report) else {
            return;
        };
        let mut records: Vec<TraceRecord> = Vec::with_capacity(table.rows.len());
        for (index, row) in table.rows.iter().enumerate() {
            match trace::transform(row) {
                Ok(record) => records.push(record),
                Err(err) => report.error_at(&path, table.line(index), &err),
            }
        }
        self.publish(&records, &paths.work(TRACE_OUTPUT), TRACE_OUTPUT, report);
    }

    /// Write `records` as the case's own file, then append them to the
    /// accumulated file `output` under the output root.
    fn publish<R: Serialize>(
        &self,
        records: &[R],
        case_file: &Path,
        output: &str,
        report: &mut Report,
    ) {
        if let Err(err) = sink::replace(case_file, records) {
            report.error(case_file, &err);
        }
        let accumulated = self.config.output_root.join(output);
        match sink::append(&accumulated, records) {
            Ok(written) => debug!(path = %accumulated.display(), written, "Appended records"),
            Err(err) => report.error(&accumulated, &err),
        }
    }

    fn metrics(&self, paths: &CasePaths, report: &mut Report) {
        let latency = self.latency_series(paths, report);
        let resources = self.resource_series(paths, report);
        self.merge_series(paths, &latency, &resources, report);
    }

    /// Estimate and aggregate the latency series of every service in the
    /// case's request metrics.
    fn latency_series(
        &self,
        paths: &CasePaths,
        report: &mut Report,
    ) -> BTreeMap<String, Vec<LatencySample>> {
        let path = paths.input(REQUEST_METRICS_FILE);
        let Some(table) = read_table::<HistogramRow>(&path, &HISTOGRAM_COLUMNS, report) else {
            return BTreeMap::new();
        };
        let series = latency::by_service(&table.rows, &self.config.calibration);
        for err in &series.failures {
            report.error_at(&path, table.line(err.row), err);
        }

        let dir = paths.work("latency");
        for (service, samples) in &series.by_service {
            let target = dir.join(format!("{service}.csv"));
            if let Err(err) = sink::replace(&target, samples) {
                report.error(&target, &err);
            }
        }
        info!(
            path = %path.display(),
            services = series.by_service.len(),
            "Estimated latency series"
        );
        series.by_service
    }

    /// Window-aggregate every resource file of the case. Files that could
    /// not be read are kept by name with no series so that prefix lookup
    /// still sees them.
    ///
    /// Windows are cut by row position, so a file with any undecodable row
    /// is left out whole rather than windowed with the row missing.
    fn resource_series(
        &self,
        paths: &CasePaths,
        report: &mut Report,
    ) -> BTreeMap<String, Option<Vec<ResourceSample>>> {
        let dir = paths.input(RESOURCE_DIR);
        let names = match input::csv_files(&dir) {
            Ok(names) => names,
            Err(err) => {
                report.push(Diagnostic::new(&dir, Kind::Io, err.to_string()));
                return BTreeMap::new();
            }
        };

        let out = paths.work("resource");
        let mut resources = BTreeMap::new();
        for name in names {
            let path = dir.join(&name);
            let series = match input::read_path::<ResourceSample>(&path, &RESOURCE_COLUMNS) {
                Ok(table) if table.rejected.is_empty() => {
                    let windows = aggregate::window_means(&table.rows, self.config.window_size);
                    let target = out.join(&name);
                    if let Err(err) = sink::replace(&target, &windows) {
                        report.error(&target, &err);
                    }
                    Some(windows)
                }
                Ok(table) => {
                    report.rejected(&path, table.rejected);
                    None
                }
                Err(err) => {
                    report.error(&path, &err);
                    None
                }
            };
            resources.insert(name, series);
        }
        resources
    }

    /// Pair each service's latency series with its pod's resource series and
    /// emit the merged rows.
    fn merge_series(
        &self,
        paths: &CasePaths,
        latency: &BTreeMap<String, Vec<LatencySample>>,
        resources: &BTreeMap<String, Option<Vec<ResourceSample>>>,
        report: &mut Report,
    ) {
        let merge::Config {
            strategy,
            prefix_delimiter,
        } = &self.config.merge;
        let names: Vec<&str> = resources.keys().map(String::as_str).collect();
        let latency_dir = paths.work("latency");
        let merged_dir = paths.work("merged");
        let metric_dir = self.config.output_root.join(METRIC_OUTPUT_DIR);

        for (service, samples) in latency {
            let source = latency_dir.join(format!("{service}.csv"));
            let prefix = merge::prefix(service, prefix_delimiter);
            let Some(counterpart) = merge::find_counterpart(prefix, names.as_slice()) else {
                report.push(Diagnostic::new(
                    &source,
                    Kind::Lookup,
                    format!("no resource file begins with {prefix:?}"),
                ));
                continue;
            };
            let Some(Some(resource)) = resources.get(counterpart) else {
                report.push(Diagnostic::new(
                    &source,
                    Kind::Lookup,
                    format!("resource file {counterpart} could not be read"),
                ));
                continue;
            };

            let merged = match merge::merge(samples, resource, *strategy) {
                Ok(merged) => merged,
                Err(err) => {
                    report.push(Diagnostic::new(
                        &source,
                        Kind::Alignment,
                        format!("cannot merge with {counterpart}: {err}"),
                    ));
                    continue;
                }
            };

            let file_name = merge::merged_file_name(prefix, prefix_delimiter);
            let merged_path = merged_dir.join(&file_name);
            if let Err(err) = sink::replace(&merged_path, &merged) {
                report.error(&merged_path, &err);
            }
            let records: Vec<MetricRecord> = merged.iter().map(MetricRecord::from).collect();
            let accumulated = metric_dir.join(&file_name);
            if let Err(err) = sink::append(&accumulated, &records) {
                report.error(&accumulated, &err);
            }
            info!(
                service = %service,
                counterpart,
                rows = records.len(),
                "Merged series"
            );
        }
    }
}

/// Read an input table, recording a whole-file failure or any rejected
/// rows. `None` when the file could not be read at all.
fn read_table<T: serde::de::DeserializeOwned>(
    path: &Path,
    required: &[&str],
    report: &mut Report,
) -> Option<input::Table<T>> {
    match input::read_path::<T>(path, required) {
        Ok(mut table) => {
            report.rejected(path, std::mem::take(&mut table.rejected));
            Some(table)
        }
        Err(err) => {
            report.error(path, &err);
            None
        }
    }
}
