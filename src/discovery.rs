//! Part file discovery.

use crate::merge::{MergeError, Result};
use std::path::{Path, PathBuf};

/// List the part files directly inside `dir` whose extension matches
/// `extension` (case-insensitive), sorted by file name.
pub fn list_parts(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(MergeError::input_not_found(dir));
    }

    let entries = std::fs::read_dir(dir).map_err(|e| MergeError::read_failure(dir, e))?;

    let mut parts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| MergeError::read_failure(dir, e))?;
        let path = entry.path();
        if path.is_file() && has_extension(&path, extension) {
            parts.push(path);
        }
    }

    parts.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(parts)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}
