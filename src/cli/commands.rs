//! CLI command definitions for fauna-forge.
//!
//! Each subcommand runs one curation stage against the stage files of the
//! configured data directory.

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use tracing::info;

use crate::diversity::SelectionMethod;
use crate::pipeline::{CurationConfig, CurationRunner};

/// Default log filter when nothing else is configured.
const DEFAULT_LOG_LEVEL: &str = "info";

/// Curation of crowd-sourced wildlife observations into training datasets.
#[derive(Parser, Debug)]
#[command(name = "fauna-forge")]
#[command(about = "Deduplicate and sample wildlife observations for dataset curation")]
#[command(version)]
#[command(
    long_about = "fauna-forge groups observations of the same individual animal, keeps the best-documented record of each, and selects a diverse, bounded sample per species.\n\nStage files live under <data_dir>/cache.\n\nExample usage:\n  fauna-forge --config config/fauna.yaml dedup --spatial-threshold 200\n  fauna-forge --config config/fauna.yaml select --method stratified"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the YAML configuration file (can also be set via FAUNA_CONFIG).
    #[arg(short, long, global = true, env = "FAUNA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides logging.level.
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Group observations of the same individual and keep the best of each.
    Dedup(DedupArgs),

    /// Select representative samples per species.
    Select(SelectArgs),

    /// Cap every species of the selection at a uniform target.
    Balance(BalanceArgs),

    /// Print statistics for an observation file.
    Stats(StatsArgs),
}

/// Arguments for `fauna-forge dedup`.
#[derive(Parser, Debug)]
pub struct DedupArgs {
    /// Spatial threshold in meters.
    #[arg(long)]
    pub spatial_threshold: Option<f64>,

    /// Temporal threshold in days.
    #[arg(long)]
    pub temporal_threshold: Option<f64>,

    /// Output JSON stats instead of the text summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `fauna-forge select`.
#[derive(Parser, Debug)]
pub struct SelectArgs {
    /// Number of samples per species.
    #[arg(short = 'n', long)]
    pub samples_per_species: Option<usize>,

    /// Selection method (clustering, stratified, quality, random).
    #[arg(short, long)]
    pub method: Option<SelectionMethod>,

    /// Minimum candidates for a species to be included.
    #[arg(long)]
    pub min_samples: Option<usize>,

    /// Seed for the selection engine.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output JSON stats instead of the text summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `fauna-forge balance`.
#[derive(Parser, Debug)]
pub struct BalanceArgs {
    /// Target number of observations per species.
    #[arg(short, long)]
    pub target: Option<usize>,

    /// Keep species above the target whole instead of reducing them.
    #[arg(long)]
    pub no_undersampling: bool,

    /// Output JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `fauna-forge stats`.
#[derive(Parser, Debug)]
pub struct StatsArgs {
    /// Observation file to analyze (default: the selected observations).
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Also write the statistics as JSON to this file.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output JSON instead of the text summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Loads the configuration named by `--config`, or defaults plus environment
/// overrides when none is given.
pub fn load_config(cli: &Cli) -> anyhow::Result<CurationConfig> {
    let config = match &cli.config {
        Some(path) => CurationConfig::load(path)?,
        None => CurationConfig::from_env()?,
    };
    Ok(config)
}

/// Log filter from `--log-level`, falling back to the configured level.
///
/// `RUST_LOG` takes precedence over both and is handled by the caller.
pub fn log_filter(cli: &Cli, config: &CurationConfig) -> String {
    cli.log_level
        .clone()
        .or_else(|| Some(config.logging.level.clone()).filter(|l| !l.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

/// Run the CLI with parsed arguments and an already loaded configuration.
pub async fn run_with_config(cli: Cli, config: CurationConfig) -> anyhow::Result<()> {
    if let Some(path) = &cli.config {
        info!("Configuration loaded from {}", path.display());
    }

    match cli.command {
        Commands::Dedup(args) => run_dedup_command(args, config).await,
        Commands::Select(args) => run_select_command(args, config).await,
        Commands::Balance(args) => run_balance_command(args, config).await,
        Commands::Stats(args) => run_stats_command(args, config).await,
    }
}

// ============================================================================
// Stage Commands
// ============================================================================

async fn run_dedup_command(args: DedupArgs, mut config: CurationConfig) -> anyhow::Result<()> {
    if let Some(meters) = args.spatial_threshold {
        config.deduplication.spatial_threshold_m = meters;
    }
    if let Some(days) = args.temporal_threshold {
        config.deduplication.temporal_threshold_days = days;
    }
    config.validate()?;

    let parameters = config.deduplication.parameters();
    let outcome = CurationRunner::new(config).run_dedup().await?;

    if args.json {
        let stats = outcome.result.stats(parameters);
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{}", outcome.result.summary());
        println!("Saved to {}", outcome.output_path.display());
    }

    Ok(())
}

async fn run_select_command(args: SelectArgs, mut config: CurationConfig) -> anyhow::Result<()> {
    if let Some(samples) = args.samples_per_species {
        config.sampling.samples_per_species = samples;
    }
    if let Some(method) = args.method {
        config.sampling.method = method;
    }
    if let Some(min_samples) = args.min_samples {
        config.sampling.min_samples_per_species = min_samples;
    }
    if let Some(seed) = args.seed {
        config.sampling.seed = seed;
    }
    config.validate()?;

    let parameters = config.sampling.parameters();
    let outcome = CurationRunner::new(config).run_select().await?;

    if args.json {
        let stats = outcome.result.stats(parameters);
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{}", outcome.result.summary());
        println!("Saved to {}", outcome.output_path.display());
    }

    Ok(())
}

#[derive(Debug, Clone, Serialize)]
struct BalanceOutput {
    status: String,
    target_per_species: Option<usize>,
    allow_undersampling: bool,
    input: usize,
    output: usize,
    path: String,
}

async fn run_balance_command(args: BalanceArgs, mut config: CurationConfig) -> anyhow::Result<()> {
    if let Some(target) = args.target {
        config.balancing.target_per_species = Some(target);
    }
    if args.no_undersampling {
        config.balancing.allow_undersampling = false;
    }
    config.validate()?;

    let target_per_species = config.balancing.target_per_species;
    let allow_undersampling = config.balancing.allow_undersampling;
    let outcome = CurationRunner::new(config).run_balance().await?;

    let output = BalanceOutput {
        status: "success".to_string(),
        target_per_species,
        allow_undersampling,
        input: outcome.input_count,
        output: outcome.output_count,
        path: outcome.output_path.display().to_string(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!(
            "Balanced dataset: {} -> {} observations",
            output.input, output.output
        );
        println!("Saved to {}", output.path);
    }

    Ok(())
}

async fn run_stats_command(args: StatsArgs, config: CurationConfig) -> anyhow::Result<()> {
    let runner = CurationRunner::new(config);
    let stats = runner.run_stats(args.input.as_deref()).await?;

    if let Some(path) = &args.output {
        tokio::fs::write(path, serde_json::to_string_pretty(&stats)?).await?;
        info!("Statistics saved to {}", path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{}", stats.summary());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        // Verify CLI definition is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_dedup_command_defaults() {
        let cli = Cli::try_parse_from(["fauna-forge", "dedup"]).expect("should parse");

        assert!(cli.config.is_none());
        assert!(cli.log_level.is_none());
        match cli.command {
            Commands::Dedup(args) => {
                assert!(args.spatial_threshold.is_none());
                assert!(args.temporal_threshold.is_none());
                assert!(!args.json);
            }
            _ => panic!("Expected Dedup command"),
        }
    }

    #[test]
    fn test_select_command_with_all_options() {
        let cli = Cli::try_parse_from([
            "fauna-forge",
            "select",
            "-n",
            "30",
            "--method",
            "stratified",
            "--min-samples",
            "5",
            "--seed",
            "7",
            "-j",
            "--config",
            "config/fauna.yaml",
        ])
        .expect("should parse");

        assert_eq!(cli.config, Some(PathBuf::from("config/fauna.yaml")));
        match cli.command {
            Commands::Select(args) => {
                assert_eq!(args.samples_per_species, Some(30));
                assert_eq!(args.method, Some(SelectionMethod::Stratified));
                assert_eq!(args.min_samples, Some(5));
                assert_eq!(args.seed, Some(7));
                assert!(args.json);
            }
            _ => panic!("Expected Select command"),
        }
    }

    #[test]
    fn test_select_rejects_unknown_method() {
        assert!(Cli::try_parse_from(["fauna-forge", "select", "--method", "kmeans"]).is_err());
    }

    #[test]
    fn test_balance_command() {
        let cli = Cli::try_parse_from(["fauna-forge", "balance", "-t", "20", "--no-undersampling"])
            .expect("should parse");
        match cli.command {
            Commands::Balance(args) => {
                assert_eq!(args.target, Some(20));
                assert!(args.no_undersampling);
            }
            _ => panic!("Expected Balance command"),
        }
    }

    #[tokio::test]
    async fn test_select_json_runs_against_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = dir.path().join("cache");
        std::fs::create_dir_all(&cache).expect("cache dir");
        let records = serde_json::json!([
            {"id": 1, "taxon": {"id": 100, "name": "Species A"}, "quality_score": 60.0},
            {"id": 2, "taxon": {"id": 100, "name": "Species A"}, "quality_score": 80.0},
            {"id": 3, "taxon": {"id": 100, "name": "Species A"}, "quality_score": 70.0}
        ]);
        std::fs::write(cache.join("observations.json"), records.to_string()).expect("write");

        let cli = Cli::try_parse_from([
            "fauna-forge",
            "select",
            "-n",
            "2",
            "--min-samples",
            "1",
            "-j",
        ])
        .expect("should parse");
        let config = CurationConfig::default()
            .with_data_dir(dir.path())
            .with_selection_method(SelectionMethod::Quality);

        run_with_config(cli, config).await.expect("select should succeed");

        let stats: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(cache.join("selection_stats.json")).expect("read"),
        )
        .expect("stats json");
        assert_eq!(stats["parameters"]["samples_per_species"], 2);
        assert_eq!(stats["by_species"]["100"], 2);
    }

    #[test]
    fn test_log_filter_priority() {
        let config = CurationConfig::default();
        let mut debug_config = CurationConfig::default();
        debug_config.logging.level = "debug".to_string();

        let cli = Cli::try_parse_from(["fauna-forge", "stats"]).expect("should parse");
        assert_eq!(log_filter(&cli, &config), "info");
        assert_eq!(log_filter(&cli, &debug_config), "debug");

        let cli = Cli::try_parse_from(["fauna-forge", "--log-level", "warn", "stats"])
            .expect("should parse");
        assert_eq!(log_filter(&cli, &debug_config), "warn");
    }
}
