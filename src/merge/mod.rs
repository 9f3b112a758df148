//! Parquet part concatenation.
//!
//! Merges an ordered list of part files into one output file under the first
//! part's schema, reconciling minor schema differences along the way.

mod concat;
mod encoding;
mod error;
mod reconcile;

pub use concat::{concatenate, ConcatOptions, MergeReport, PartReport};
pub use error::{ErrorCode, MergeError, Result};
pub use reconcile::{ReconciledPart, Reconciliation, SchemaReconciler};
