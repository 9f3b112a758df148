//! partcat - concatenate partitioned Parquet part files into single files.
//!
//! The core is [`merge::concatenate`], which appends an ordered list of part
//! files under the first part's schema. [`splits::merge_splits`] drives it
//! over the split directories (`train_parts`, `test_parts`, ...) of an input
//! root.

// Allow large error types - rich diagnostic messages are more valuable on error paths.
#![allow(clippy::result_large_err)]

pub mod config;
pub mod discovery;
mod init;
pub mod merge;
pub mod space;
pub mod splits;

pub use init::init_tracing;
pub use merge::{concatenate, ConcatOptions, MergeError, MergeReport, Reconciliation};
pub use splits::{merge_splits, SplitOutcome, SplitStatus};
