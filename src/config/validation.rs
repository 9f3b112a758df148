// Configuration validation
//
// Validates that required fields are present and values are sensible

use super::*;
use anyhow::{bail, Result};
use std::collections::HashSet;
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_merge_config(&config.merge)?;

    if config.output.dir.is_empty() {
        bail!(
            "Output directory is required\n\n\
            How to fix:\n\
              • CLI: --output /data/merged\n\
              • Environment: export {}OUTPUT_DIR=/data/merged\n\
              • TOML: [output]\n              dir = \"/data/merged\"\n",
            ENV_PREFIX
        );
    }

    validate_parquet_config(&config.parquet)?;

    Ok(())
}

fn validate_merge_config(config: &MergeConfig) -> Result<()> {
    if config.extension.is_empty() {
        bail!("merge.extension must not be empty");
    }

    if !config.low_space_ratio.is_finite() || config.low_space_ratio < 0.0 {
        bail!(
            "merge.low_space_ratio must be a non-negative number, got {}",
            config.low_space_ratio
        );
    }

    if config.batch_size == 0 {
        bail!("merge.batch_size must be greater than 0");
    }

    if let Some(column) = &config.provenance_column {
        if column.is_empty() {
            bail!("merge.provenance_column must not be empty when set");
        }
    }

    if config.splits.is_empty() {
        bail!("merge.splits must contain at least one split");
    }

    let mut names = HashSet::new();
    let mut outputs = HashSet::new();
    for split in &config.splits {
        if split.name.is_empty() || split.dir.is_empty() || split.output.is_empty() {
            bail!("merge.splits entries require non-empty name, dir and output");
        }
        if !names.insert(split.name.as_str()) {
            bail!("duplicate split name '{}'", split.name);
        }
        if !outputs.insert(split.output.as_str()) {
            bail!(
                "splits must write distinct output files, '{}' is used twice",
                split.output
            );
        }
    }

    Ok(())
}

fn validate_parquet_config(config: &ParquetConfig) -> Result<()> {
    if config.row_group_size == 0 {
        bail!("parquet.row_group_size must be greater than 0");
    }

    if config.row_group_size > 10_000_000 {
        warn!(
            row_group_size = config.row_group_size,
            "parquet.row_group_size is very large; may cause memory issues"
        );
    }

    Ok(())
}
