//! Centralized configuration for Theatre.
//!
//! All tunable simulation parameters are defined here, loaded from a TOML
//! file, and validated once before any simulated time elapses.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::condition::{ConditionCatalog, DEFAULT_CONDITION, PatientCondition};
use crate::random::ServiceDistribution;
use crate::statistics::SampleWindow;
use crate::{Result, TheatreError};

/// Allowed station count range for every station kind.
pub const STATION_UNITS_RANGE: std::ops::RangeInclusive<usize> = 1..=100;

/// Central configuration for a simulation study.
///
/// Groups related settings into sections. Every field has a default, so a
/// file only needs to mention what it changes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TheatreConfig {
    pub facility: FacilityConfig,
    pub patients: PatientConfig,
    pub sampling: SampleWindow,
    pub run: RunConfig,
}

/// Station capacities and accepted request priorities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FacilityConfig {
    pub preparation_units: usize,
    pub operation_units: usize,
    pub recovery_units: usize,
    pub priority_bounds: PriorityBounds,
}

impl Default for FacilityConfig {
    fn default() -> Self {
        Self {
            preparation_units: 10,
            operation_units: 4,
            recovery_units: 10,
            priority_bounds: PriorityBounds::default(),
        }
    }
}

/// Inclusive range of priorities a station accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityBounds {
    pub min: i32,
    pub max: i32,
}

impl Default for PriorityBounds {
    fn default() -> Self {
        Self { min: 0, max: 100 }
    }
}

impl PriorityBounds {
    /// Returns whether `priority` is accepted.
    pub fn contains(&self, priority: i32) -> bool {
        (self.min..=self.max).contains(&priority)
    }
}

/// Arrival process, base service times and patient conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PatientConfig {
    pub arrival_interval: ServiceDistribution,
    pub base_preparation_time: ServiceDistribution,
    pub base_operation_time: ServiceDistribution,
    pub base_recovery_time: ServiceDistribution,
    pub conditions: BTreeMap<String, PatientCondition>,
}

impl Default for PatientConfig {
    fn default() -> Self {
        Self {
            arrival_interval: ServiceDistribution::Exponential { mean: 25.0 },
            base_preparation_time: ServiceDistribution::Exponential { mean: 20.0 },
            base_operation_time: ServiceDistribution::Exponential { mean: 40.0 },
            base_recovery_time: ServiceDistribution::Exponential { mean: 40.0 },
            conditions: BTreeMap::from([(
                DEFAULT_CONDITION.to_string(),
                PatientCondition::default(),
            )]),
        }
    }
}

/// Seed and replication count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RunConfig {
    /// Seed of the first replication; replication `r` uses `seed + r`
    pub seed: u64,
    /// Number of independent replications
    pub runs: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { seed: 1, runs: 1 }
    }
}

impl TheatreConfig {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// - `TheatreError::Io` - File cannot be read
    /// - `TheatreError::ConfigParse` - File is not valid configuration TOML
    /// - `TheatreError::Configuration` - Values fail validation
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from TOML text without validating it.
    ///
    /// # Errors
    ///
    /// - `TheatreError::ConfigParse` - Text is not valid configuration TOML
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Renders configuration as TOML.
    ///
    /// # Errors
    ///
    /// - `TheatreError::Configuration` - Value cannot be represented in TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| TheatreError::configuration(e.to_string()))
    }

    /// Applies environment variable overrides.
    ///
    /// Recognises `THEATRE_SEED`, `THEATRE_RUNS` and `THEATRE_SAMPLE_COUNT`.
    /// Unparsable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides looked up through `lookup` instead of the process
    /// environment.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(seed) = lookup("THEATRE_SEED")
            && let Ok(value) = seed.parse::<u64>()
        {
            self.run.seed = value;
        }

        if let Some(runs) = lookup("THEATRE_RUNS")
            && let Ok(value) = runs.parse::<u32>()
        {
            self.run.runs = value;
        }

        if let Some(count) = lookup("THEATRE_SAMPLE_COUNT")
            && let Ok(value) = count.parse::<usize>()
        {
            self.sampling.count = value;
        }
    }

    /// Checks every configuration rule.
    ///
    /// # Errors
    ///
    /// - `TheatreError::Configuration` - Capacity, schedule, priority or
    ///   condition values are invalid, or arrivals are always zero hours apart
    /// - `TheatreError::Distribution` - A distribution has invalid parameters
    pub fn validate(&self) -> Result<()> {
        let stations = [
            ("preparation", self.facility.preparation_units),
            ("operation", self.facility.operation_units),
            ("recovery", self.facility.recovery_units),
        ];
        for (station, units) in stations {
            if !STATION_UNITS_RANGE.contains(&units) {
                return Err(TheatreError::configuration(format!(
                    "number of {station} units must be in [{}, {}], got {units}",
                    STATION_UNITS_RANGE.start(),
                    STATION_UNITS_RANGE.end()
                )));
            }
        }

        let bounds = self.facility.priority_bounds;
        if bounds.min > bounds.max {
            return Err(TheatreError::configuration(format!(
                "priority bounds are inverted: [{}, {}]",
                bounds.min, bounds.max
            )));
        }

        self.patients.arrival_interval.sampler()?;
        let arrival_mean = self.patients.arrival_interval.mean();
        if arrival_mean <= 0.0 {
            return Err(TheatreError::configuration(format!(
                "arrival interval {} never advances time, its mean is {arrival_mean}",
                self.patients.arrival_interval
            )));
        }
        self.patients.base_preparation_time.sampler()?;
        self.patients.base_operation_time.sampler()?;
        self.patients.base_recovery_time.sampler()?;

        let catalog = self.condition_catalog()?;
        for (_, name, condition) in catalog.iter() {
            if !bounds.contains(condition.priority) {
                return Err(TheatreError::configuration(format!(
                    "condition '{name}' priority {} outside station bounds [{}, {}]",
                    condition.priority, bounds.min, bounds.max
                )));
            }
        }

        self.sampling.validate()?;

        if self.run.runs == 0 {
            return Err(TheatreError::configuration(
                "number of runs must be at least 1",
            ));
        }

        Ok(())
    }

    /// Builds the validated condition catalog.
    ///
    /// # Errors
    ///
    /// - `TheatreError::Configuration` - Conditions are invalid
    pub fn condition_catalog(&self) -> Result<ConditionCatalog> {
        ConditionCatalog::from_map(&self.patients.conditions)
    }

    /// Simulated hours needed to close the last sample window.
    pub fn simulation_time(&self) -> f64 {
        self.sampling.total_time()
    }

    /// Creates a small, fast configuration for tests.
    pub fn for_testing() -> Self {
        Self {
            sampling: SampleWindow {
                warm_up: 50.0,
                interval: 10.0,
                duration: 100.0,
                count: 3,
                resolution: 1.0,
            },
            run: RunConfig { seed: 42, runs: 1 },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = TheatreConfig::default();

        assert_eq!(config.facility.preparation_units, 10);
        assert_eq!(config.facility.operation_units, 4);
        assert_eq!(config.facility.recovery_units, 10);
        assert_eq!(
            config.patients.arrival_interval,
            ServiceDistribution::Exponential { mean: 25.0 }
        );
        assert_eq!(config.sampling.count, 20);
        assert_eq!(config.run.seed, 1);
        assert_eq!(config.run.runs, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let text = r#"
            [facility]
            operation-units = 2

            [patients]
            arrival-interval = { kind = "uniform", min = 20.0, max = 30.0 }

            [patients.conditions.mild]
            priority = 5
            arrival-portion = 0.8
            mortality-rate = 0.0
            service-multipliers = [1.0, 1.0, 1.0]

            [patients.conditions.severe]
            priority = 1
            arrival-portion = 0.2
            mortality-rate = 0.5
            service-multipliers = [1.5, 2.0, 3.0]

            [run]
            seed = 7
        "#;

        let config = TheatreConfig::from_toml(text).unwrap();
        assert_eq!(config.facility.operation_units, 2);
        assert_eq!(config.facility.preparation_units, 10);
        assert_eq!(
            config.patients.arrival_interval,
            ServiceDistribution::Uniform {
                min: 20.0,
                max: 30.0
            }
        );
        assert_eq!(config.patients.conditions.len(), 2);
        assert_eq!(config.run.seed, 7);
        assert_eq!(config.run.runs, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_capacity_out_of_range_rejected() {
        let mut config = TheatreConfig::default();
        config.facility.recovery_units = 0;
        assert!(matches!(
            config.validate(),
            Err(TheatreError::Configuration { .. })
        ));

        config.facility.recovery_units = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_priority_outside_bounds_rejected() {
        let mut config = TheatreConfig::default();
        config.patients.conditions.insert(
            "critical".to_string(),
            PatientCondition {
                priority: -1,
                ..PatientCondition::default()
            },
        );

        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("critical"));
    }

    #[test]
    fn test_invalid_distribution_rejected() {
        let mut config = TheatreConfig::default();
        config.patients.base_operation_time = ServiceDistribution::Exponential { mean: -4.0 };
        assert!(matches!(
            config.validate(),
            Err(TheatreError::Distribution(_))
        ));
    }

    #[test]
    fn test_zero_arrival_interval_rejected() {
        let mut config = TheatreConfig::default();
        config.patients.arrival_interval = ServiceDistribution::Uniform { min: 0.0, max: 0.0 };

        let error = config.validate().unwrap_err();
        assert!(matches!(error, TheatreError::Configuration { .. }));
        assert!(error.to_string().contains("arrival interval"));

        config.patients.arrival_interval = ServiceDistribution::Uniform { min: 0.0, max: 0.5 };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_override() {
        let mut config = TheatreConfig::default();
        config.apply_overrides_from(|key| match key {
            "THEATRE_SEED" => Some("12345".to_string()),
            "THEATRE_RUNS" => Some("5".to_string()),
            "THEATRE_SAMPLE_COUNT" => Some("not-a-number".to_string()),
            _ => None,
        });

        assert_eq!(config.run.seed, 12345);
        assert_eq!(config.run.runs, 5);
        assert_eq!(config.sampling.count, 20);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sampling]\ncount = 4\nduration = 10.0").unwrap();

        let config = TheatreConfig::from_file(file.path()).unwrap();
        assert_eq!(config.sampling.count, 4);
        assert_eq!(config.sampling.duration, 10.0);
    }

    #[test]
    fn test_from_file_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[facility]\noperation-units = \"four\"").unwrap();

        assert!(matches!(
            TheatreConfig::from_file(file.path()),
            Err(TheatreError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_default_config_renders_as_toml() {
        let text = TheatreConfig::default().to_toml().unwrap();
        assert!(text.contains("operation-units = 4"));

        let parsed = TheatreConfig::from_toml(&text).unwrap();
        assert_eq!(parsed, TheatreConfig::default());
    }

    #[test]
    fn test_testing_preset_is_valid() {
        let config = TheatreConfig::for_testing();
        assert!(config.validate().is_ok());
        assert_eq!(config.simulation_time(), 50.0 + 3.0 * 110.0 - 10.0);
    }
}
