//! Binary crate for the `tmpr` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Loading credentials and interactive configuration
//! - Logging setup and output formatting

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cmd = cli::Cli::parse();
    cmd.run().await
}

/// Logs go to stderr so stdout only ever carries the forecast.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
