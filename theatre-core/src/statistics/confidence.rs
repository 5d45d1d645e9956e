//! Confidence levels and per-metric report rows.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Supported two-sided confidence levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    P90,
    #[default]
    P95,
    P98,
    P99,
}

impl ConfidenceLevel {
    /// Returns the normal-distribution z-score for this level.
    pub fn z_score(self) -> f64 {
        match self {
            ConfidenceLevel::P90 => 1.645,
            ConfidenceLevel::P95 => 1.960,
            ConfidenceLevel::P98 => 2.326,
            ConfidenceLevel::P99 => 2.576,
        }
    }

    /// Half-width of the interval for a variance over `samples` slots.
    pub fn half_width(self, variance: f64, samples: usize) -> f64 {
        if samples == 0 {
            return f64::NAN;
        }
        self.z_score() * variance.sqrt() / (samples as f64).sqrt()
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceLevel::P90 => write!(f, "90%"),
            ConfidenceLevel::P95 => write!(f, "95%"),
            ConfidenceLevel::P98 => write!(f, "98%"),
            ConfidenceLevel::P99 => write!(f, "99%"),
        }
    }
}

/// Aggregated view of one metric across all sample slots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub name: String,
    pub title: String,
    pub short_title: String,
    pub unit: String,
    pub mean: f64,
    pub variance: f64,
    /// 95% confidence interval half-width
    pub half_width_95: f64,
    /// Raw per-slot values in sampling order
    pub slots: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_z_scores() {
        assert_eq!(ConfidenceLevel::P90.z_score(), 1.645);
        assert_eq!(ConfidenceLevel::P95.z_score(), 1.960);
        assert_eq!(ConfidenceLevel::P98.z_score(), 2.326);
        assert_eq!(ConfidenceLevel::P99.z_score(), 2.576);
    }

    #[test]
    fn test_half_width_without_samples_is_nan() {
        assert!(ConfidenceLevel::P95.half_width(1.0, 0).is_nan());
    }
}
