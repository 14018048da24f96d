//! Capture output for rcaprep
//!
//! Every table rcaprep produces is written through this crate. The
//! [`formats`] module holds the record serializers, [`sink`] owns the file
//! level contract: accumulation files are created with a header when absent
//! and appended to, header-less, otherwise.

#![deny(clippy::all)]
#![deny(clippy::cargo)]
#![deny(clippy::perf)]
#![deny(clippy::suspicious)]
#![deny(clippy::complexity)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![allow(clippy::multiple_crate_versions)]

pub mod formats;
pub mod sink;

#[cfg(test)]
pub(crate) mod test;

pub use formats::OutputFormat;
pub use sink::{Mode, Sink};
