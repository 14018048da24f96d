//! Test helpers

pub(crate) mod writer;
