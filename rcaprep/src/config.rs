//! This module controls configuration parsing from the end user. A config
//! that deserializes is further checked by [`Config::validate`] before a run
//! begins, so a bad value is caught before any file is touched.
use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use rcaprep_histogram::Calibration;
use serde::Deserialize;

use crate::{aggregate, baro, merge};

/// Errors produced by [`Config`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Error for a serde [`serde_yaml`].
    #[error("Failed to deserialize yaml: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),
    /// Error reading config file
    #[error("Failed to read config file {path:?}: {source}")]
    ReadFile {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: Box<std::io::Error>,
    },
    /// A root directory is empty
    #[error("{0} must not be empty")]
    EmptyRoot(&'static str),
    /// The prefix delimiter is empty
    #[error("merge.prefix_delimiter must not be empty")]
    EmptyDelimiter,
    /// A quantile divisor is zero or not finite
    #[error("calibration divisors must be finite and non-zero: {0:?}")]
    Calibration(Calibration),
    /// The phase directory name is empty
    #[error("phase must not be empty")]
    EmptyPhase,
    /// The wide export has no file name
    #[error("baro.file_name must not be empty")]
    EmptyFileName,
}

/// A unit of work performed for every case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Reshape log lines
    Logs,
    /// Reshape spans
    Traces,
    /// Estimate latency, aggregate resources and merge
    Metrics,
}

fn default_phase() -> String {
    "abnormal".to_string()
}

fn default_window_size() -> NonZeroUsize {
    aggregate::DEFAULT_WINDOW_SIZE
}

fn default_steps() -> Vec<Step> {
    vec![Step::Logs, Step::Traces, Step::Metrics]
}

/// Main configuration struct for this program
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory holding one sub-directory of raw exports per case
    pub input_root: PathBuf,
    /// Directory receiving per-case intermediate files
    pub work_root: PathBuf,
    /// Directory receiving the accumulated dataset
    pub output_root: PathBuf,
    /// Sub-directory of each case holding its exports
    #[serde(default = "default_phase")]
    pub phase: String,
    /// Cases to process. Empty means every sub-directory of `input_root`.
    #[serde(default)]
    pub cases: Vec<String>,
    /// Resource rows folded into one aggregate row
    #[serde(default = "default_window_size")]
    pub window_size: NonZeroUsize,
    /// Merge settings
    #[serde(default)]
    pub merge: merge::Config,
    /// Quantile divisors
    #[serde(default)]
    pub calibration: Calibration,
    /// Wide export settings
    #[serde(default)]
    pub baro: baro::Config,
    /// Steps to run for every case
    #[serde(default = "default_steps")]
    pub steps: Vec<Step>,
}

impl Config {
    /// Check the values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns an error if a root, the phase, the prefix delimiter or the
    /// export file name is empty, or if a calibration divisor is unusable.
    pub fn validate(&self) -> Result<(), Error> {
        for (name, root) in [
            ("input_root", &self.input_root),
            ("work_root", &self.work_root),
            ("output_root", &self.output_root),
        ] {
            if root.as_os_str().is_empty() {
                return Err(Error::EmptyRoot(name));
            }
        }
        if self.phase.is_empty() {
            return Err(Error::EmptyPhase);
        }
        if self.merge.prefix_delimiter.is_empty() {
            return Err(Error::EmptyDelimiter);
        }
        if !self.calibration.is_valid() {
            return Err(Error::Calibration(self.calibration));
        }
        if self.baro.file_name.is_empty() {
            return Err(Error::EmptyFileName);
        }
        Ok(())
    }

    /// Whether `step` is enabled
    #[must_use]
    pub fn runs(&self, step: Step) -> bool {
        self.steps.contains(&step)
    }
}

/// Parse and validate a config from YAML text
///
/// # Errors
///
/// Returns an error if the text is not a valid config.
pub fn parse(contents: &str) -> Result<Config, Error> {
    let config: Config = serde_yaml::from_str(contents)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file path
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid config.
pub fn load_config_from_path(path: &Path) -> Result<Config, Error> {
    let contents = fs::read_to_string(path).map_err(|source| Error::ReadFile {
        path: path.to_path_buf(),
        source: Box::new(source),
    })?;
    parse(&contents)
}
