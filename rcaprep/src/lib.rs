//! The rcaprep dataset preparation tool.
//!
//! This library supports the rcaprep binary found elsewhere in this project.
//! It reads the traces, logs and metrics an OpenTelemetry collector captured
//! for a set of fault-injection cases and reshapes them into a per-service,
//! time-aligned dataset for root-cause-analysis tooling. Percentile estimation
//! itself lives in `rcaprep-histogram`, file output in `rcaprep-capture`.

#![deny(clippy::all)]
#![deny(clippy::cargo)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_copy_implementations)]
#![deny(missing_debug_implementations)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::multiple_crate_versions)]

pub mod aggregate;
pub mod baro;
pub mod config;
pub mod diagnostic;
pub mod input;
pub mod latency;
pub mod log;
pub mod merge;
pub mod pipeline;
pub mod records;
pub mod timestamp;
pub mod trace;
