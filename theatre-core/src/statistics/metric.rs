//! Metric descriptions and per-sample accumulators.

use serde::{Deserialize, Serialize};

/// How updates inside one sample slot are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricKind {
    /// Sum of update values; a slot always counts as one observation
    Counter,
    /// Sum of update values divided by the number of updates
    CounterMean,
}

/// Presentation metadata for a registered metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub kind: MetricKind,
    /// Title used when the metric is printed on a single line
    pub title: String,
    /// Column header used in tabular output
    pub short_title: String,
    pub unit: String,
}

impl MetricSpec {
    /// Creates counter metric description.
    pub fn counter(title: impl Into<String>, short_title: impl Into<String>) -> Self {
        Self {
            kind: MetricKind::Counter,
            title: title.into(),
            short_title: short_title.into(),
            unit: String::new(),
        }
    }

    /// Creates averaging metric description.
    pub fn mean(title: impl Into<String>, short_title: impl Into<String>) -> Self {
        Self {
            kind: MetricKind::CounterMean,
            title: title.into(),
            short_title: short_title.into(),
            unit: String::new(),
        }
    }

    /// Sets the display unit.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }
}

/// Accumulated updates of one metric within one sample window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Slot {
    sum: f64,
    updates: u64,
}

impl Slot {
    pub(crate) fn update(&mut self, value: f64) {
        self.sum += value;
        self.updates += 1;
    }

    /// Observation weight of this slot in cross-sample aggregation.
    pub(crate) fn weight(&self, kind: MetricKind) -> u64 {
        match kind {
            MetricKind::Counter => 1,
            MetricKind::CounterMean => self.updates,
        }
    }

    pub(crate) fn sum(&self) -> f64 {
        self.sum
    }

    /// Slot value, `NaN` when it carries no observations.
    pub(crate) fn value(&self, kind: MetricKind) -> f64 {
        match self.weight(kind) {
            0 => f64::NAN,
            weight => self.sum / weight as f64,
        }
    }
}

/// All sample slots of one registered metric.
#[derive(Debug, Clone)]
pub(crate) struct MetricSeries {
    pub(crate) name: String,
    pub(crate) spec: MetricSpec,
    pub(crate) slots: Vec<Slot>,
}

impl MetricSeries {
    pub(crate) fn new(name: String, spec: MetricSpec, open_slots: usize) -> Self {
        Self {
            name,
            spec,
            slots: vec![Slot::default(); open_slots],
        }
    }

    pub(crate) fn values(&self) -> Vec<f64> {
        self.slots.iter().map(|s| s.value(self.spec.kind)).collect()
    }

    /// Mean over every observation: total sum divided by total weight.
    pub(crate) fn mean(&self) -> f64 {
        let weight: u64 = self.slots.iter().map(|s| s.weight(self.spec.kind)).sum();
        if weight == 0 {
            return f64::NAN;
        }
        let sum: f64 = self.slots.iter().map(Slot::sum).sum();
        sum / weight as f64
    }

    /// Number of slots holding at least one observation.
    pub(crate) fn contributing_slots(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.weight(self.spec.kind) > 0)
            .count()
    }

    /// Sample variance of the per-slot values around the overall mean.
    pub(crate) fn variance(&self) -> f64 {
        let n = self.contributing_slots();
        if n < 2 {
            return f64::NAN;
        }
        let mean = self.mean();
        let squares: f64 = self
            .slots
            .iter()
            .filter(|s| s.weight(self.spec.kind) > 0)
            .map(|s| (s.value(self.spec.kind) - mean).powi(2))
            .sum();
        squares / (n - 1) as f64
    }
}
