// partcat configuration
//
// Supports configuration from multiple sources:
// 1. CLI flags (highest priority, applied by the binary)
// 2. Environment variables (PARTCAT_* prefix)
// 3. Config file path from PARTCAT_CONFIG env var
// 4. Config file contents from PARTCAT_CONFIG_CONTENT env var
// 5. Default config file locations (./partcat.toml, ./.partcat.toml)
// 6. Built-in defaults (lowest priority)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, ENV_PREFIX};

/// Main runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub merge: MergeConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub parquet: ParquetConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// How part files are discovered and reconciled
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// File extension used to discover part files (without the dot)
    pub extension: String,
    /// Warn when free space on the output volume is below this fraction of the input size
    pub low_space_ratio: f64,
    /// Rows per record batch when reading parts
    pub batch_size: usize,
    /// Optional column recording the source part file of every row
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance_column: Option<String>,
    pub splits: Vec<SplitConfig>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            extension: "parquet".to_string(),
            low_space_ratio: 0.5,
            batch_size: 8192,
            provenance_column: None,
            splits: vec![
                SplitConfig::new("train", "train_parts", "train.parquet"),
                SplitConfig::new("test", "test_parts", "test.parquet"),
            ],
        }
    }
}

/// A subdirectory of part files merged into one output file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitConfig {
    pub name: String,
    /// Directory of part files, relative to the input root
    pub dir: String,
    /// Output file name, relative to the output directory
    pub output: String,
}

impl SplitConfig {
    pub fn new(name: &str, dir: &str, output: &str) -> Self {
        Self {
            name: name.to_string(),
            dir: dir.to_string(),
            output: output.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "./merged".to_string(),
        }
    }
}

/// Parquet encoding of merged output files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParquetConfig {
    pub compression: ParquetCompression,
    pub row_group_size: usize,
}

impl Default for ParquetConfig {
    fn default() -> Self {
        Self {
            compression: ParquetCompression::Snappy,
            row_group_size: default_row_group_size(),
        }
    }
}

fn default_row_group_size() -> usize {
    32 * 1024
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParquetCompression {
    Snappy,
    Zstd,
    Uncompressed,
}

impl std::fmt::Display for ParquetCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParquetCompression::Snappy => write!(f, "snappy"),
            ParquetCompression::Zstd => write!(f, "zstd"),
            ParquetCompression::Uncompressed => write!(f, "uncompressed"),
        }
    }
}

impl std::str::FromStr for ParquetCompression {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "snappy" => Ok(ParquetCompression::Snappy),
            "zstd" => Ok(ParquetCompression::Zstd),
            "uncompressed" | "none" => Ok(ParquetCompression::Uncompressed),
            _ => anyhow::bail!(
                "Unsupported compression: {}. Supported: snappy, zstd, uncompressed",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Unsupported log format: {}. Supported: text, json", s),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration from a specific file path (for CLI usage).
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Merge another config into this one (used for TOML layering).
    pub fn merge(&mut self, other: RuntimeConfig) {
        self.merge = other.merge;
        self.output = other.output;
        self.parquet = other.parquet;
        self.log = other.log;
    }

    /// Apply environment overrides from a custom source.
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Build a configuration from inline TOML plus overrides supplied by an
    /// `EnvSource`, without touching the host environment or filesystem.
    pub fn load_with_env<E: EnvSource>(inline_config: Option<&str>, env: &E) -> Result<Self> {
        let mut config = RuntimeConfig::default();

        if let Some(inline) = inline_config {
            let file_config: RuntimeConfig =
                toml::from_str(inline).context("Failed to parse inline config content")?;
            config.merge(file_config);
        }

        config.apply_env_overrides_from(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}
