//! CLI command implementations

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Subcommand, ValueEnum};
use theatre_core::TheatreConfig;
use theatre_sim::{FacilityReport, SurgeryFacility};
use tracing::info;

use crate::report;

/// Report rendering formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned `title mean +- ci unit` lines
    Text,
    /// Semicolon separated values, one row per sample slot
    Csv,
    /// Full report as JSON
    Json,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the simulation and print its statistics
    Run {
        /// TOML configuration file; defaults are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of replications
        #[arg(short, long)]
        runs: Option<u32>,
        /// Seed of the first replication
        #[arg(short, long)]
        seed: Option<u64>,
        /// Directory to write the report into instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Report format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
        /// Decimal separator used in CSV output
        #[arg(long, default_value = ",")]
        decimal_separator: char,
    },
    /// Print the default configuration as TOML
    Params,
}

/// Handle the CLI command
///
/// # Errors
///
/// - `anyhow::Error` - Configuration, simulation or output step failed
pub fn run_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run {
            config,
            runs,
            seed,
            output,
            format,
            decimal_separator,
        } => {
            let config = load_config(config.as_deref(), runs, seed)?;
            let report = run_simulation(config)?;
            let rendered = render(&report, format, decimal_separator)?;
            match output {
                Some(dir) => write_report(&dir, format, &rendered),
                None => {
                    println!("{rendered}");
                    Ok(())
                }
            }
        }
        Commands::Params => print_params(),
    }
}

/// Builds the run configuration from file, environment and flags, in that order.
///
/// # Errors
///
/// - `anyhow::Error` - File cannot be read or parsed
/// - `anyhow::Error` - Resulting configuration fails validation
pub fn load_config(
    path: Option<&Path>,
    runs: Option<u32>,
    seed: Option<u64>,
) -> anyhow::Result<TheatreConfig> {
    let mut config = match path {
        Some(path) => TheatreConfig::from_file(path)
            .map_err(|e| anyhow::anyhow!(e.user_message()))
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => TheatreConfig::default(),
    };

    config.apply_env_overrides();
    if let Some(runs) = runs {
        config.run.runs = runs;
    }
    if let Some(seed) = seed {
        config.run.seed = seed;
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    Ok(config)
}

fn run_simulation(config: TheatreConfig) -> anyhow::Result<FacilityReport> {
    let mut facility = SurgeryFacility::new(config)?;
    let report = facility.run()?;

    let abandoned = report.abandoned_in_flight();
    if abandoned > 0 {
        info!(abandoned, "Patients still in the facility when runs ended");
    }
    Ok(report)
}

fn render(
    report: &FacilityReport,
    format: OutputFormat,
    decimal_separator: char,
) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Text => report::render_text(report),
        OutputFormat::Csv => report::render_csv(report, decimal_separator),
        OutputFormat::Json => report::render_json(report)?,
    })
}

fn write_report(dir: &Path, format: OutputFormat, rendered: &str) -> anyhow::Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;
    let path = dir.join(format!("report.{}", format.extension()));
    fs::write(&path, rendered).with_context(|| format!("writing {}", path.display()))?;

    println!("Report written to {}", path.display());
    Ok(())
}

fn print_params() -> anyhow::Result<()> {
    let text = TheatreConfig::default()
        .to_toml()
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    println!("{text}");
    Ok(())
}
