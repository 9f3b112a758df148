//! Free-space advisory run before a merge starts writing.

use crate::merge::{MergeError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpaceCheck {
    /// Total size of all input parts
    pub input_bytes: u64,
    /// Free space on the output volume, if it could be determined
    pub available_bytes: Option<u64>,
    /// Free space is below `input_bytes * ratio`
    pub low_space: bool,
}

/// Compare the total size of `parts` with free space under `output_dir`.
///
/// Never fails on a low-space condition: the merge is still attempted and the
/// storage layer reports an out-of-space error if it happens.
pub fn check(parts: &[PathBuf], output_dir: &Path, ratio: f64) -> Result<SpaceCheck> {
    let input_bytes = total_size(parts)?;

    let available_bytes = match fs2::available_space(output_dir) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(
                dir = %output_dir.display(),
                error = %e,
                "Could not determine free space on output volume"
            );
            None
        }
    };

    let low_space = available_bytes.is_some_and(|free| is_low(input_bytes, free, ratio));
    if low_space {
        warn!(
            input_bytes,
            available_bytes,
            "Low disk space; merging may fail if space runs out"
        );
    }

    Ok(SpaceCheck {
        input_bytes,
        available_bytes,
        low_space,
    })
}

fn total_size(parts: &[PathBuf]) -> Result<u64> {
    parts.iter().try_fold(0u64, |total, part| {
        let metadata = std::fs::metadata(part).map_err(|e| MergeError::read_failure(part, e))?;
        Ok(total + metadata.len())
    })
}

fn is_low(input_bytes: u64, available_bytes: u64, ratio: f64) -> bool {
    (available_bytes as f64) < (input_bytes as f64) * ratio
}
