//! Command-line interface for fauna-forge.
//!
//! Provides one command per curation stage: dedup, select, balance and stats.

mod commands;

pub use commands::{load_config, log_filter, parse_cli, run_with_config, Cli, Commands};
