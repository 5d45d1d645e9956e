//! Warm-up and sample window schedule.

use serde::{Deserialize, Serialize};

use crate::{Result, TheatreError};

/// Schedule of sampling windows in hours.
///
/// `count` windows of length `duration` are taken, `interval` apart, after an
/// initial `warm_up`. Time-series metrics are sampled every `resolution`
/// hours while a window is open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SampleWindow {
    pub warm_up: f64,
    pub interval: f64,
    pub duration: f64,
    pub count: usize,
    pub resolution: f64,
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self {
            warm_up: 1000.0,
            interval: 1000.0,
            duration: 1000.0,
            count: 20,
            resolution: 1.0,
        }
    }
}

impl SampleWindow {
    /// Total simulated time needed to close the last window.
    ///
    /// Equals the end returned by [`SampleWindow::bounds`] for the last
    /// window, bit for bit, so the final tick never lies past the horizon.
    pub fn total_time(&self) -> f64 {
        match self.count.checked_sub(1).and_then(|last| self.bounds(last)) {
            Some((_, end)) => end,
            None => self.warm_up,
        }
    }

    /// Returns `(start, end)` of window `index`, if it exists.
    pub fn bounds(&self, index: usize) -> Option<(f64, f64)> {
        if index >= self.count {
            return None;
        }
        let start = self.warm_up + index as f64 * (self.interval + self.duration);
        Some((start, start + self.duration))
    }

    /// Number of sampling ticks inside one window.
    pub fn ticks_per_window(&self) -> u64 {
        if self.duration <= 0.0 || self.resolution <= 0.0 {
            return 0;
        }
        (self.duration / self.resolution).ceil() as u64
    }

    /// Time of tick `tick` (zero-based) of window `index`.
    ///
    /// Ticks fall every `resolution` hours after the window opens; the last
    /// one lands exactly on the window end even when the duration is not a
    /// multiple of the resolution.
    pub fn tick_at(&self, index: usize, tick: u64) -> Option<f64> {
        let (start, end) = self.bounds(index)?;
        let ticks = self.ticks_per_window();
        if tick >= ticks {
            return None;
        }
        if tick + 1 == ticks {
            return Some(end);
        }
        Some((start + (tick + 1) as f64 * self.resolution).min(end))
    }

    /// Checks the schedule is usable.
    ///
    /// # Errors
    ///
    /// - `TheatreError::Configuration` - A field is negative, zero where it
    ///   must be positive, or not finite
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("warm-up", self.warm_up),
            ("interval", self.interval),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(TheatreError::configuration(format!(
                    "sample {field} must be non-negative, got {value}"
                )));
            }
        }
        let positive = [
            ("duration", self.duration),
            ("resolution", self.resolution),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(TheatreError::configuration(format!(
                    "sample {field} must be positive, got {value}"
                )));
            }
        }
        if self.count == 0 {
            return Err(TheatreError::configuration(
                "sample count must be at least 1",
            ));
        }
        Ok(())
    }
}
