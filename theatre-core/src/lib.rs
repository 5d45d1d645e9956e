//! Theatre Core - Domain values and ambient services for surgery facility simulation
//!
//! This crate provides the building blocks shared by the simulation kernel and
//! the command-line front end: configuration, patient conditions, independent
//! random streams, sample-window statistics, and tracing setup.

pub mod condition;
pub mod config;
pub mod random;
pub mod statistics;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use condition::{ConditionCatalog, ConditionId, PatientCondition};
pub use config::TheatreConfig;
pub use random::{
    DistributionError, DistributionSampler, RandomStream, RandomStreamFactory,
    ServiceDistribution, StreamKind,
};
pub use statistics::{
    ConfidenceLevel, MetricHandle, MetricKind, MetricSpec, MetricSummary, SampleWindow,
    StatisticsAggregator, StatisticsError,
};

/// Core errors that can bubble up from any Theatre subsystem.
///
/// Configuration problems are detected before any simulated time elapses and
/// are fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum TheatreError {
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Statistics error: {0}")]
    Statistics(#[from] StatisticsError),

    #[error("Distribution error: {0}")]
    Distribution(#[from] DistributionError),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TheatreError {
    /// Creates a configuration error from any displayable reason.
    pub fn configuration(reason: impl Into<String>) -> Self {
        TheatreError::Configuration {
            reason: reason.into(),
        }
    }

    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            TheatreError::Configuration { reason } => format!("Invalid configuration: {reason}"),
            TheatreError::Statistics(StatisticsError::DuplicateMetric { name }) => {
                format!("Metric '{name}' is registered twice")
            }
            TheatreError::Statistics(StatisticsError::UnknownMetric { name }) => {
                format!("Metric '{name}' does not exist")
            }
            TheatreError::Statistics(_) => "Statistics error occurred".to_string(),
            TheatreError::Distribution(e) => format!("Invalid distribution: {e}"),
            TheatreError::ConfigParse(e) => format!("Could not parse configuration file: {e}"),
            TheatreError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            TheatreError::Configuration { .. }
                | TheatreError::Distribution(_)
                | TheatreError::ConfigParse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TheatreError>;
