//! Registry of sampled metrics.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, trace};

use super::confidence::{ConfidenceLevel, MetricSummary};
use super::metric::{MetricSeries, MetricSpec};

/// Misuse of the statistics registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatisticsError {
    #[error("Statistic '{name}' already exists")]
    DuplicateMetric { name: String },

    #[error("Statistic '{name}' does not exist")]
    UnknownMetric { name: String },

    #[error("Metric handle {index} was not issued by this aggregator")]
    ForeignHandle { index: usize },
}

/// Typed reference to a registered metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetricHandle(usize);

impl MetricHandle {
    /// Returns registration index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Collects metric updates into sample slots and reports aggregates.
///
/// Slots persist across replications, so several runs sharing one aggregator
/// contribute their windows to the same report.
#[derive(Debug, Default)]
pub struct StatisticsAggregator {
    series: Vec<MetricSeries>,
    by_name: HashMap<String, MetricHandle>,
    window_open: bool,
    slots_opened: usize,
    dropped_updates: u64,
}

impl StatisticsAggregator {
    /// Creates empty aggregator with its window closed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers metric under unique name.
    ///
    /// A metric registered after samples were started receives empty slots
    /// for them so slot indices line up across metrics.
    ///
    /// # Errors
    ///
    /// - `StatisticsError::DuplicateMetric` - Name already registered
    pub fn register(
        &mut self,
        name: impl Into<String>,
        spec: MetricSpec,
    ) -> Result<MetricHandle, StatisticsError> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(StatisticsError::DuplicateMetric { name });
        }

        let handle = MetricHandle(self.series.len());
        self.series
            .push(MetricSeries::new(name.clone(), spec, self.slots_opened));
        self.by_name.insert(name, handle);
        Ok(handle)
    }

    /// Looks up handle of a registered metric.
    ///
    /// # Errors
    ///
    /// - `StatisticsError::UnknownMetric` - No metric with that name
    pub fn handle(&self, name: &str) -> Result<MetricHandle, StatisticsError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| StatisticsError::UnknownMetric {
                name: name.to_string(),
            })
    }

    /// Opens a new sample slot on every registered metric.
    pub fn start_sample(&mut self) {
        for series in &mut self.series {
            series.slots.push(Default::default());
        }
        self.slots_opened += 1;
        self.window_open = true;
        debug!(sample = self.slots_opened, "Sample window opened");
    }

    /// Closes the current sample slot; later updates are dropped.
    pub fn end_sample(&mut self) {
        self.window_open = false;
        debug!(sample = self.slots_opened, "Sample window closed");
    }

    /// Returns whether updates are currently recorded.
    pub fn is_sampling(&self) -> bool {
        self.window_open
    }

    /// Number of sample slots opened so far.
    pub fn slot_count(&self) -> usize {
        self.slots_opened
    }

    /// Number of updates dropped while no window was open.
    pub fn dropped_updates(&self) -> u64 {
        self.dropped_updates
    }

    /// Adds a value to the open slot of a metric.
    ///
    /// Updates outside an open window are dropped silently.
    ///
    /// # Errors
    ///
    /// - `StatisticsError::ForeignHandle` - Handle not issued by this aggregator
    pub fn update(&mut self, handle: MetricHandle, value: f64) -> Result<(), StatisticsError> {
        let window_open = self.window_open;
        let series = self
            .series
            .get_mut(handle.0)
            .ok_or(StatisticsError::ForeignHandle { index: handle.0 })?;

        match (window_open, series.slots.last_mut()) {
            (true, Some(slot)) => slot.update(value),
            _ => {
                self.dropped_updates += 1;
                trace!(metric = %series.name, value, "Update outside sample window dropped");
            }
        }
        Ok(())
    }

    /// Counts one occurrence.
    ///
    /// # Errors
    ///
    /// - `StatisticsError::ForeignHandle` - Handle not issued by this aggregator
    pub fn increment(&mut self, handle: MetricHandle) -> Result<(), StatisticsError> {
        self.update(handle, 1.0)
    }

    /// Adds a value to a metric addressed by name.
    ///
    /// # Errors
    ///
    /// - `StatisticsError::UnknownMetric` - No metric with that name
    pub fn update_by_name(&mut self, name: &str, value: f64) -> Result<(), StatisticsError> {
        let handle = self.handle(name)?;
        self.update(handle, value)
    }

    /// Returns presentation metadata of a metric.
    pub fn spec(&self, handle: MetricHandle) -> Option<&MetricSpec> {
        self.series.get(handle.0).map(|s| &s.spec)
    }

    /// Returns value of one slot (`NaN` when it holds no observations).
    pub fn value(&self, handle: MetricHandle, slot: usize) -> Option<f64> {
        let series = self.series.get(handle.0)?;
        series.slots.get(slot).map(|s| s.value(series.spec.kind))
    }

    /// Returns every slot value in sampling order.
    pub fn values(&self, handle: MetricHandle) -> Vec<f64> {
        self.series
            .get(handle.0)
            .map(MetricSeries::values)
            .unwrap_or_default()
    }

    /// Overall mean: sum of all slot values over sum of slot weights.
    pub fn mean(&self, handle: MetricHandle) -> f64 {
        self.series
            .get(handle.0)
            .map_or(f64::NAN, MetricSeries::mean)
    }

    /// Sample variance across slots, `NaN` with fewer than two slots.
    pub fn variance(&self, handle: MetricHandle) -> f64 {
        self.series
            .get(handle.0)
            .map_or(f64::NAN, MetricSeries::variance)
    }

    /// Confidence interval half-width at the given level.
    pub fn confidence_interval(&self, handle: MetricHandle, level: ConfidenceLevel) -> f64 {
        self.series.get(handle.0).map_or(f64::NAN, |series| {
            level.half_width(series.variance(), series.contributing_slots())
        })
    }

    /// Builds summary row for one metric.
    pub fn summary(&self, handle: MetricHandle) -> Option<MetricSummary> {
        let series = self.series.get(handle.0)?;
        Some(MetricSummary {
            name: series.name.clone(),
            title: series.spec.title.clone(),
            short_title: series.spec.short_title.clone(),
            unit: series.spec.unit.clone(),
            mean: series.mean(),
            variance: series.variance(),
            half_width_95: ConfidenceLevel::P95
                .half_width(series.variance(), series.contributing_slots()),
            slots: series.values(),
        })
    }

    /// Summaries of all metrics in registration order.
    pub fn report(&self) -> Vec<MetricSummary> {
        (0..self.series.len())
            .filter_map(|index| self.summary(MetricHandle(index)))
            .collect()
    }

    /// Iterates handles in registration order.
    pub fn handles(&self) -> impl Iterator<Item = MetricHandle> + '_ {
        (0..self.series.len()).map(MetricHandle)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use tracing_test::traced_test;

    use super::*;

    fn aggregator_with_mean() -> (StatisticsAggregator, MetricHandle) {
        let mut stats = StatisticsAggregator::new();
        let handle = stats
            .register("time", MetricSpec::mean("Mean time", "time").with_unit("hours"))
            .unwrap();
        (stats, handle)
    }

    #[test]
    fn test_mean_variance_and_confidence_interval() {
        let (mut stats, handle) = aggregator_with_mean();
        for value in [10.0, 20.0, 30.0] {
            stats.start_sample();
            stats.update(handle, value).unwrap();
            stats.end_sample();
        }

        assert_eq!(stats.mean(handle), 20.0);
        assert_eq!(stats.variance(handle), 100.0);
        let expected = 1.960 * 10.0 / 3f64.sqrt();
        let ci = stats.confidence_interval(handle, ConfidenceLevel::P95);
        assert!((ci - expected).abs() < 1e-12);
        assert!((ci - 11.32).abs() < 0.01);
    }

    #[test]
    fn test_slot_without_updates_reports_nan() {
        let (mut stats, handle) = aggregator_with_mean();
        stats.start_sample();
        stats.end_sample();

        assert!(stats.value(handle, 0).unwrap().is_nan());
        assert!(stats.mean(handle).is_nan());
        assert!(stats.variance(handle).is_nan());
    }

    #[test]
    fn test_counter_slot_without_updates_reports_zero() {
        let mut stats = StatisticsAggregator::new();
        let handle = stats
            .register("deceased", MetricSpec::counter("Deceased", "deceased"))
            .unwrap();
        stats.start_sample();
        stats.end_sample();
        stats.start_sample();
        stats.increment(handle).unwrap();
        stats.increment(handle).unwrap();
        stats.end_sample();

        assert_eq!(stats.values(handle), vec![0.0, 2.0]);
        assert_eq!(stats.mean(handle), 1.0);
    }

    #[test]
    fn test_single_slot_variance_is_nan() {
        let (mut stats, handle) = aggregator_with_mean();
        stats.start_sample();
        stats.update(handle, 4.0).unwrap();
        stats.end_sample();

        assert_eq!(stats.mean(handle), 4.0);
        assert!(stats.variance(handle).is_nan());
        assert!(
            stats
                .confidence_interval(handle, ConfidenceLevel::P99)
                .is_nan()
        );
    }

    #[traced_test]
    #[test]
    fn test_updates_outside_window_are_dropped() {
        let (mut stats, handle) = aggregator_with_mean();
        stats.update(handle, 100.0).unwrap();
        stats.start_sample();
        stats.update(handle, 1.0).unwrap();
        stats.end_sample();
        stats.update(handle, 100.0).unwrap();

        assert_eq!(stats.values(handle), vec![1.0]);
        assert_eq!(stats.dropped_updates(), 2);
        assert!(logs_contain("Update outside sample window dropped"));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let (mut stats, _) = aggregator_with_mean();
        let result = stats.register("time", MetricSpec::counter("Other", "other"));
        assert_eq!(
            result,
            Err(StatisticsError::DuplicateMetric {
                name: "time".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_metric_rejected() {
        let (mut stats, handle) = aggregator_with_mean();
        assert_eq!(stats.handle("time"), Ok(handle));
        assert_eq!(
            stats.update_by_name("queue", 1.0),
            Err(StatisticsError::UnknownMetric {
                name: "queue".to_string()
            })
        );
    }

    #[test]
    fn test_foreign_handle_rejected() {
        let (mut stats, _) = aggregator_with_mean();
        let mut other = StatisticsAggregator::new();
        other
            .register("a", MetricSpec::counter("a", "a"))
            .unwrap();
        let foreign = other
            .register("b", MetricSpec::counter("b", "b"))
            .unwrap();

        assert_eq!(
            stats.update(foreign, 1.0),
            Err(StatisticsError::ForeignHandle { index: 1 })
        );
    }

    #[test]
    fn test_late_registration_is_aligned() {
        let (mut stats, first) = aggregator_with_mean();
        stats.start_sample();
        stats.update(first, 1.0).unwrap();
        let late = stats
            .register("late", MetricSpec::mean("Late", "late"))
            .unwrap();
        stats.update(late, 5.0).unwrap();
        stats.end_sample();

        assert_eq!(stats.values(late), vec![5.0]);
        assert_eq!(stats.values(first), vec![1.0]);
    }

    #[test]
    fn test_report_preserves_registration_order() {
        let mut stats = StatisticsAggregator::new();
        stats
            .register("b", MetricSpec::counter("B", "b"))
            .unwrap();
        stats
            .register("a", MetricSpec::mean("A", "a").with_unit("%"))
            .unwrap();

        let names: Vec<String> = stats.report().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    proptest! {
        #[test]
        fn test_constant_samples_have_zero_variance(value in -1e6f64..1e6, slots in 2usize..20) {
            let (mut stats, handle) = aggregator_with_mean();
            for _ in 0..slots {
                stats.start_sample();
                stats.update(handle, value).unwrap();
                stats.update(handle, value).unwrap();
                stats.end_sample();
            }
            prop_assert!((stats.mean(handle) - value).abs() <= 1e-9 * value.abs().max(1.0));
            prop_assert!(stats.variance(handle).abs() <= 1e-6 * value.abs().max(1.0));
        }

        #[test]
        fn test_mean_lies_within_slot_range(values in prop::collection::vec(0.0f64..1000.0, 1..30)) {
            let (mut stats, handle) = aggregator_with_mean();
            for value in &values {
                stats.start_sample();
                stats.update(handle, *value).unwrap();
                stats.end_sample();
            }
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let mean = stats.mean(handle);
            prop_assert!(mean >= min - 1e-9 && mean <= max + 1e-9);
        }
    }
}
