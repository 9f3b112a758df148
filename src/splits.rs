//! Multi-split runner.
//!
//! Merges each configured split directory under an input root into its own
//! output file. Splits are independent: a split with no parts is skipped and a
//! failing split is reported, while the others still run.

use crate::config::{RuntimeConfig, SplitConfig};
use crate::discovery;
use crate::merge::{concatenate, ConcatOptions, MergeError, MergeReport, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SplitStatus {
    Merged { report: MergeReport },
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Serialize)]
pub struct SplitOutcome {
    pub name: String,
    pub source: PathBuf,
    pub destination: PathBuf,
    #[serde(flatten)]
    pub status: SplitStatus,
}

impl SplitOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, SplitStatus::Failed { .. })
    }
}

/// Merge every split configured in `config.merge.splits` found under `root`.
///
/// A missing `root` or an output directory that cannot be created aborts the
/// whole run; everything else is reported per split.
pub fn merge_splits(root: &Path, config: &RuntimeConfig) -> Result<Vec<SplitOutcome>> {
    if !root.is_dir() {
        error!(root = %root.display(), "Input directory not found");
        return Err(MergeError::input_not_found(root));
    }

    let output_dir = Path::new(&config.output.dir);
    if !output_dir.exists() {
        info!(dir = %output_dir.display(), "Creating output directory");
        std::fs::create_dir_all(output_dir)
            .map_err(|e| MergeError::write_failure(output_dir, e))?;
    }

    let options = ConcatOptions::from_config(config);
    let outcomes = config
        .merge
        .splits
        .iter()
        .map(|split| merge_split(root, output_dir, split, &config.merge.extension, &options))
        .collect();

    Ok(outcomes)
}

fn merge_split(
    root: &Path,
    output_dir: &Path,
    split: &SplitConfig,
    extension: &str,
    options: &ConcatOptions,
) -> SplitOutcome {
    let source = root.join(&split.dir);
    let destination = output_dir.join(&split.output);
    info!(
        split = %split.name,
        source = %source.display(),
        "Processing split"
    );

    let status = match discovery::list_parts(&source, extension) {
        Err(e) => {
            error!(split = %split.name, error = %e, "Split failed");
            SplitStatus::Failed {
                error: e.to_string(),
            }
        }
        Ok(parts) if parts.is_empty() => {
            warn!(
                split = %split.name,
                source = %source.display(),
                "No part files found, skipping"
            );
            SplitStatus::Skipped {
                reason: format!("no .{} files in {}", extension, source.display()),
            }
        }
        Ok(parts) => match concatenate(&parts, &destination, options) {
            Ok(report) => SplitStatus::Merged { report },
            Err(e) => {
                error!(split = %split.name, error = %e, "Split failed");
                SplitStatus::Failed {
                    error: e.to_string(),
                }
            }
        },
    };

    SplitOutcome {
        name: split.name.clone(),
        source,
        destination,
        status,
    }
}
