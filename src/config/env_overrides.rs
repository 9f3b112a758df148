use super::{LogFormat, ParquetCompression, RuntimeConfig};
use anyhow::{anyhow, Context, Result};

pub const ENV_PREFIX: &str = "PARTCAT_";

/// Abstraction over environment-variable lookups so tests can supply their
/// own source of overrides.
pub trait EnvSource {
    /// Get a variable by key, without the PARTCAT_ prefix.
    fn get(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Output
    if let Some(dir) = get_env_string(env, "OUTPUT_DIR") {
        config.output.dir = dir;
    }

    // Merge behavior
    if let Some(extension) = get_env_string(env, "EXTENSION") {
        config.merge.extension = normalize_extension(extension);
    }
    if let Some(val) = get_env_f64(env, "LOW_SPACE_RATIO")? {
        config.merge.low_space_ratio = val;
    }
    if let Some(val) = get_env_usize(env, "BATCH_SIZE")? {
        config.merge.batch_size = val;
    }
    if let Some(column) = get_env_string(env, "PROVENANCE_COLUMN") {
        config.merge.provenance_column = if column.is_empty() {
            None
        } else {
            Some(column)
        };
    }

    // Parquet encoding
    if let Some(compression) = get_env_string(env, "COMPRESSION") {
        config.parquet.compression = compression
            .parse::<ParquetCompression>()
            .context("Invalid PARTCAT_COMPRESSION value")?;
    }
    if let Some(val) = get_env_usize(env, "ROW_GROUP_SIZE")? {
        config.parquet.row_group_size = val;
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL") {
        config.log.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT") {
        config.log.format = format
            .parse::<LogFormat>()
            .context("Invalid PARTCAT_LOG_FORMAT value")?;
    }

    Ok(())
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Option<String> {
    env.get(key)
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_f64<E: EnvSource>(env: &E, key: &str) -> Result<Option<f64>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .parse::<f64>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Accept both `parquet` and `.parquet`.
pub(crate) fn normalize_extension(extension: String) -> String {
    match extension.strip_prefix('.') {
        Some(stripped) => stripped.to_string(),
        None => extension,
    }
}
