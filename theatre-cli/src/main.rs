//! Theatre CLI - Command-line interface
//!
//! Runs surgery facility simulations and renders their statistics.

mod commands;
mod report;

use std::path::PathBuf;

use clap::Parser;
use theatre_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "theatre")]
#[command(about = "A discrete-event surgery facility simulator")]
struct Cli {
    /// Console log level, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    log_level: CliLogLevel,
    /// Directory for the full trace log
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: commands::Commands,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))?;

    commands::run_command(cli.command)
}
