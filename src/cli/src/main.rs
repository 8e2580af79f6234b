//! Hoist CLI entry point.

use clap::Parser;
use hoist_core::config::{HoistConfig, LogLevel};
use tracing_subscriber::EnvFilter;

use hoist_cli::commands::{dispatch, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the configured level; --verbose wins over both.
    let filter = if cli.verbose {
        EnvFilter::new(LogLevel::Debug.to_string())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = HoistConfig::from_file(&cli.config)
                .map(|c| c.log_level)
                .unwrap_or(LogLevel::Warn);
            EnvFilter::new(level.to_string())
        })
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
