//! Tracing setup for Theatre
//!
//! The console shows run and sample boundaries for the theatre crates only.
//! A trace file keeps every patient transition and scheduler wake-up so a
//! replication can be replayed from its seed and compared line by line.
//!
//! Simulation events carry their own virtual time in an `hours` field, so
//! neither output prints wall-clock timestamps.

use std::fs::{File, create_dir_all};
use std::path::Path;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Name of the per-run trace file.
pub const LOG_FILE_NAME: &str = "theatre-last-run.log";

/// Crates whose events reach the outputs below the `warn` floor.
const THEATRE_TARGETS: [&str; 3] = ["theatre_core", "theatre_sim", "theatre_cli"];

/// Builds filter directives that keep dependencies at `warn` and the
/// theatre crates at `level`.
fn theatre_directives(level: Level) -> String {
    let level = level.to_string().to_ascii_lowercase();
    let mut directives = vec!["warn".to_string()];
    directives.extend(THEATRE_TARGETS.iter().map(|target| format!("{target}={level}")));
    directives.join(",")
}

/// Installs the console and trace-file subscribers.
///
/// `RUST_LOG` replaces the console filter when set. The trace file in
/// `logs_dir` (default `./logs`) is overwritten on every invocation and
/// records the theatre crates at `trace`, including the `replication` span
/// with its seed on each line.
///
/// # Errors
///
/// - `std::io::Error` - Logs directory or file cannot be created
/// - `Box<dyn std::error::Error>` - A global subscriber is already installed
pub fn init_tracing(
    console_level: Level,
    logs_dir: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let logs_path = logs_dir.unwrap_or_else(|| Path::new("logs"));
    create_dir_all(logs_path)?;
    let log_file_path = logs_path.join(LOG_FILE_NAME);
    let log_file = File::create(&log_file_path)?;

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(theatre_directives(console_level)));
    let console_layer = fmt::layer()
        .compact()
        .without_time()
        .with_target(false)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .without_time()
        .with_target(true)
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(EnvFilter::new(theatre_directives(Level::TRACE)));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!(
        console = %console_level,
        trace_file = %log_file_path.display(),
        "Tracing initialized"
    );

    Ok(())
}

/// CLI log levels for user control
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliLogLevel {
    /// Only error messages
    Error,
    /// Failed flows and other recoverable problems
    Warn,
    /// Run and sample boundaries
    Info,
    /// Every patient status transition
    Debug,
    /// All messages including scheduler wake-ups
    Trace,
}

impl CliLogLevel {
    /// Converts CLI log level to tracing Level enum.
    ///
    /// # Examples
    /// ```
    /// use theatre_core::tracing_setup::CliLogLevel;
    ///
    /// let level = CliLogLevel::Info.as_tracing_level();
    /// assert_eq!(level, tracing::Level::INFO);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}
