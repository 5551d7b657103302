//! slotstream binary entry point.
//!
//! Thin wrapper around the slotstream-cli library: parses arguments,
//! initializes logging and runs the selected command.

use anyhow::Result;
use clap::Parser;
use slotstream_cli::{Cli, run};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    run(cli, &mut std::io::stdout().lock())
}
