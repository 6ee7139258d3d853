//! fauna-forge CLI entry point.
//!
//! Loads configuration, initializes logging and delegates to the CLI module
//! for command handling.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments and configuration first to get the log level
    let cli = fauna_forge::cli::parse_cli();
    let config = fauna_forge::cli::load_config(&cli)?;

    // Initialize tracing with environment filter
    // Priority: RUST_LOG env var > --log-level CLI arg > logging.level > "info"
    let log_filter = fauna_forge::cli::log_filter(&cli, &config);

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)))
        .init();

    // Run the CLI with parsed arguments
    fauna_forge::cli::run_with_config(cli, config).await
}
