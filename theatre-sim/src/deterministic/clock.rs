//! Virtual time for deterministic simulations.

use std::fmt;

use ordered_float::OrderedFloat;

use super::scheduler::SimulationError;

/// Point in simulated time, measured in hours from the start of a run.
///
/// Totally ordered so it can key the wake-up heap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualTime(OrderedFloat<f64>);

impl VirtualTime {
    /// Start of every run.
    pub const ZERO: VirtualTime = VirtualTime(OrderedFloat(0.0));

    /// Creates time from an hour offset.
    pub fn from_hours(hours: f64) -> Self {
        Self(OrderedFloat(hours))
    }

    /// Returns hours since the start of the run.
    pub fn hours(self) -> f64 {
        self.0.into_inner()
    }

    /// Returns the time `delay` hours later.
    pub fn after(self, delay: f64) -> Self {
        Self::from_hours(self.hours() + delay)
    }

    /// Returns hours elapsed since `earlier`.
    pub fn since(self, earlier: VirtualTime) -> f64 {
        self.hours() - earlier.hours()
    }
}

impl fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}h", self.hours())
    }
}

/// Deterministic clock for simulation time control.
///
/// Time can only move forward and is independent of wall-clock time.
#[derive(Debug, Clone, Default)]
pub struct SimulationClock {
    now: VirtualTime,
}

impl SimulationClock {
    /// Creates new clock starting at simulation time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns current simulation time.
    pub fn now(&self) -> VirtualTime {
        self.now
    }

    /// Advances simulation time to specific instant.
    ///
    /// # Errors
    ///
    /// - `SimulationError::InvalidEventScheduling` - If target time is in the past
    pub fn advance_to(&mut self, target: VirtualTime) -> Result<(), SimulationError> {
        if target < self.now {
            return Err(SimulationError::InvalidEventScheduling {
                reason: format!("Cannot advance time backwards from {} to {target}", self.now),
            });
        }
        self.now = target;
        Ok(())
    }
}
