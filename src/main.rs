use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use partcat::config::{LogFormat, RuntimeConfig};
use partcat::{MergeReport, SplitOutcome, SplitStatus};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

/// Exit code when the run completed but at least one split failed.
const EXIT_SPLIT_FAILED: u8 = 2;

/// Concatenate Parquet part files into single output files
#[derive(Parser)]
#[command(name = "partcat")]
#[command(version)]
#[command(about = "Concatenate Parquet part files into single output files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Output directory for merged files (overrides config file)
    #[arg(short, long, value_name = "DIR", global = true)]
    output: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Log format: text or json
    #[arg(long, value_name = "FORMAT", global = true)]
    log_format: Option<String>,

    /// Add a column with each row's source part file name
    #[arg(long, value_name = "COLUMN", global = true)]
    provenance: Option<String>,

    /// Print merge reports as JSON on stdout
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge every configured split directory found under ROOT
    Merge {
        /// Directory containing the split subdirectories
        root: PathBuf,
    },
    /// Concatenate the given part files, in order, into one file
    Concat {
        /// Destination file
        #[arg(short, long, value_name = "FILE")]
        dest: PathBuf,

        /// Part files, in output order
        parts: Vec<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Step 1: Load base configuration
    let mut config = if let Some(config_path) = &cli.config {
        RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RuntimeConfig::load().context("Failed to load configuration")?
    };

    // Step 2: Apply CLI overrides (highest priority)
    apply_cli_overrides(&mut config, &cli)?;
    config.validate().context("Invalid configuration")?;

    // Step 3: Initialize tracing
    partcat::init_tracing(&config.log);

    match &cli.command {
        Commands::Merge { root } => run_merge(root, &config, cli.json),
        Commands::Concat { dest, parts } => run_concat(dest, parts, &config, cli.json),
    }
}

fn apply_cli_overrides(config: &mut RuntimeConfig, cli: &Cli) -> Result<()> {
    if let Some(output) = &cli.output {
        config.output.dir = output.to_string_lossy().to_string();
    }

    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }

    if let Some(format) = &cli.log_format {
        config.log.format = format
            .parse::<LogFormat>()
            .context("Invalid --log-format value")?;
    }

    if let Some(column) = &cli.provenance {
        config.merge.provenance_column = Some(column.clone());
    }

    Ok(())
}

fn run_merge(root: &Path, config: &RuntimeConfig, json: bool) -> Result<ExitCode> {
    display_startup_info(root, config);

    let outcomes = partcat::merge_splits(root, config)
        .with_context(|| format!("Failed to merge parts under {}", root.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    }
    display_summary(&outcomes);

    if outcomes.iter().any(SplitOutcome::is_failed) {
        return Ok(ExitCode::from(EXIT_SPLIT_FAILED));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_concat(
    dest: &Path,
    parts: &[PathBuf],
    config: &RuntimeConfig,
    json: bool,
) -> Result<ExitCode> {
    let options = partcat::ConcatOptions::from_config(config);
    let report = partcat::concatenate(parts, dest, &options)
        .with_context(|| format!("Failed to concatenate into {}", dest.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    log_report(&report);
    Ok(ExitCode::SUCCESS)
}

fn display_startup_info(root: &Path, config: &RuntimeConfig) {
    info!("╭─────────────────────────────────────────────────");
    info!("│ partcat v{}", env!("CARGO_PKG_VERSION"));
    info!("├─────────────────────────────────────────────────");
    info!("│ Input root: {}", root.display());
    info!("│ Output directory: {}", config.output.dir);
    for split in &config.merge.splits {
        info!("│   - {}: {} -> {}", split.name, split.dir, split.output);
    }
    info!("│ Compression: {}", config.parquet.compression);
    if let Some(column) = &config.merge.provenance_column {
        info!("│ Provenance column: {}", column);
    }
    info!("╰─────────────────────────────────────────────────");
}

fn display_summary(outcomes: &[SplitOutcome]) {
    for outcome in outcomes {
        match &outcome.status {
            SplitStatus::Merged { report } => log_report(report),
            SplitStatus::Skipped { reason } => {
                warn!("Skipped split '{}': {}", outcome.name, reason)
            }
            SplitStatus::Failed { error } => {
                warn!("Split '{}' failed: {}", outcome.name, error)
            }
        }
    }

    let produced: Vec<_> = outcomes
        .iter()
        .filter(|o| matches!(o.status, SplitStatus::Merged { .. }))
        .map(|o| o.destination.display().to_string())
        .collect();
    info!("All merges complete. Produced {} file(s):", produced.len());
    for path in produced {
        info!("   - {}", path);
    }
}

fn log_report(report: &MergeReport) {
    info!(
        rows = report.rows_written,
        bytes = report.bytes_written,
        blake3 = %report.content_hash,
        "Done: {}",
        report.destination.display()
    );
    for part in report.lossy_parts() {
        warn!(
            part = %part.path.display(),
            reconciliation = ?part.reconciliation,
            "Part was not merged intact"
        );
    }
}
