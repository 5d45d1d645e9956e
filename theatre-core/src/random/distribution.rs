//! Configurable service-time and arrival distributions.

use std::fmt;

use rand::Rng;
use rand::distr::{Distribution, Uniform};
use rand_distr::Exp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when distribution parameters are unusable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DistributionError {
    #[error("Exponential mean must be positive and finite, got {mean}")]
    InvalidMean { mean: f64 },

    #[error("Uniform range must satisfy 0 <= min <= max, got [{min}, {max}]")]
    InvalidRange { min: f64, max: f64 },
}

/// Distribution of a duration in hours.
///
/// Written in configuration files as
/// `{ kind = "exponential", mean = 25.0 }` or
/// `{ kind = "uniform", min = 1.0, max = 3.0 }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ServiceDistribution {
    Exponential { mean: f64 },
    Uniform { min: f64, max: f64 },
}

impl ServiceDistribution {
    /// Validates parameters and builds a reusable sampler.
    ///
    /// # Errors
    ///
    /// - `DistributionError::InvalidMean` - Exponential mean not positive or not finite
    /// - `DistributionError::InvalidRange` - Uniform bounds negative, inverted or not finite
    pub fn sampler(&self) -> Result<DistributionSampler, DistributionError> {
        self.scaled(1.0)
    }

    /// Builds a sampler whose draws are multiplied by `factor`.
    ///
    /// For the exponential this is the distribution with mean
    /// `mean * factor`; a zero factor yields a constant zero.
    ///
    /// # Errors
    ///
    /// - `DistributionError` - Parameters are invalid or the factor is negative
    pub fn scaled(&self, factor: f64) -> Result<DistributionSampler, DistributionError> {
        match *self {
            ServiceDistribution::Exponential { mean } => {
                if !(mean.is_finite() && mean > 0.0) {
                    return Err(DistributionError::InvalidMean { mean });
                }
                let scaled = mean * factor;
                if scaled == 0.0 {
                    return Ok(DistributionSampler::Constant(0.0));
                }
                Exp::new(1.0 / scaled)
                    .map(DistributionSampler::Exponential)
                    .map_err(|_| DistributionError::InvalidMean { mean: scaled })
            }
            ServiceDistribution::Uniform { min, max } => {
                let invalid = DistributionError::InvalidRange { min, max };
                if !(min.is_finite() && max.is_finite() && min >= 0.0 && min <= max) {
                    return Err(invalid);
                }
                if !(factor.is_finite() && factor >= 0.0) {
                    return Err(DistributionError::InvalidRange {
                        min: min * factor,
                        max: max * factor,
                    });
                }
                let (low, high) = (min * factor, max * factor);
                if low == high {
                    return Ok(DistributionSampler::Constant(low));
                }
                Uniform::new_inclusive(low, high)
                    .map(DistributionSampler::Uniform)
                    .map_err(|_| invalid)
            }
        }
    }

    /// Returns the expected value of a draw.
    pub fn mean(&self) -> f64 {
        match *self {
            ServiceDistribution::Exponential { mean } => mean,
            ServiceDistribution::Uniform { min, max } => (min + max) / 2.0,
        }
    }
}

impl fmt::Display for ServiceDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceDistribution::Exponential { mean } => write!(f, "EXPONENTIAL[mean={mean}]"),
            ServiceDistribution::Uniform { min, max } => write!(f, "UNIFORM[{min}, {max}]"),
        }
    }
}

/// Validated, ready-to-draw distribution.
#[derive(Debug, Clone)]
pub enum DistributionSampler {
    Exponential(Exp<f64>),
    Uniform(Uniform<f64>),
    Constant(f64),
}

impl DistributionSampler {
    pub(crate) fn sample_from<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            DistributionSampler::Exponential(exp) => exp.sample(rng),
            DistributionSampler::Uniform(uniform) => uniform.sample(rng),
            DistributionSampler::Constant(value) => *value,
        }
    }
}
