//! Stage pipeline for observation curation.
//!
//! This module connects the curation engines to files on disk.
//!
//! # Architecture
//!
//! - **Config**: YAML configuration with environment overrides
//! - **Store**: Stage files under `<data_dir>/cache`
//! - **Runner**: Runs one stage end to end
//!
//! # Pipeline Flow
//!
//! 1. **Fetch** (external): writes `observations.json`
//! 2. **Dedup**: writes `observations_deduplicated.json` and `deduplication_stats.json`
//! 3. **Quality** (external): writes `observations_quality.json`
//! 4. **Select**: reads the quality file, falling back to the deduplicated or
//!    raw file, and writes `observations_selected.json` and `selection_stats.json`
//! 5. **Balance** (optional): writes `observations_balanced.json`
//!
//! # Example
//!
//! ```rust,ignore
//! use fauna_forge::pipeline::{CurationConfig, CurationRunner};
//!
//! let config = CurationConfig::load(Path::new("config/fauna.yaml"))?;
//! let runner = CurationRunner::new(config);
//!
//! let dedup = runner.run_dedup().await?;
//! println!("{}", dedup.result.summary());
//!
//! let selection = runner.run_select().await?;
//! println!("{}", selection.result.summary());
//! ```

pub mod config;
pub mod runner;
pub mod store;

// Re-export main types for convenience
pub use config::{
    BalancingConfig, ConfigError, CurationConfig, DeduplicationConfig, LoggingConfig,
    SamplingConfig,
};
pub use runner::{BalanceOutcome, CurationRunner, DedupOutcome, RunError, SelectionOutcome};
pub use store::StageStore;
