//! Invariant checking framework for simulation validation.

use std::fmt;

use super::clock::VirtualTime;
use super::resources::ResourcePools;

/// Violation of a simulation invariant.
#[derive(Debug, Clone, PartialEq)]
pub struct InvariantViolation {
    /// Name of the violated invariant
    pub invariant: String,
    /// Detailed description of the violation
    pub description: String,
    /// When the violation occurred
    pub timestamp: VirtualTime,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invariant '{}' violated at {}: {}",
            self.invariant, self.timestamp, self.description
        )
    }
}

/// Trait for checking simulation invariants.
pub trait Invariant: Send + Sync {
    /// Checks if invariant holds for the current pool state.
    ///
    /// # Errors
    ///
    /// - `InvariantViolation` - Invariant condition is not met
    fn check(&self, pools: &ResourcePools, now: VirtualTime) -> Result<(), InvariantViolation>;

    /// Returns name of this invariant.
    fn name(&self) -> &str;
}

/// Ensures no pool hands out more units than it has.
pub struct PoolCapacityInvariant;

impl Invariant for PoolCapacityInvariant {
    fn check(&self, pools: &ResourcePools, now: VirtualTime) -> Result<(), InvariantViolation> {
        if let Some(pool) = pools.iter().find(|p| p.in_use() > p.capacity()) {
            return Err(InvariantViolation {
                invariant: self.name().to_string(),
                description: format!(
                    "{} has {} units in use, capacity {}",
                    pool.id(),
                    pool.in_use(),
                    pool.capacity()
                ),
                timestamp: now,
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "PoolCapacity"
    }
}

/// Ensures no request waits while its pool has idle units.
pub struct WorkConservingInvariant;

impl Invariant for WorkConservingInvariant {
    fn check(&self, pools: &ResourcePools, now: VirtualTime) -> Result<(), InvariantViolation> {
        if let Some(pool) = pools
            .iter()
            .find(|p| p.queue_len() > 0 && p.in_use() < p.capacity())
        {
            return Err(InvariantViolation {
                invariant: self.name().to_string(),
                description: format!(
                    "{} has {} waiters with {} idle units",
                    pool.id(),
                    pool.queue_len(),
                    pool.idle()
                ),
                timestamp: now,
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "WorkConserving"
    }
}
