//! Sample-window statistics with cross-sample confidence intervals.
//!
//! Metrics are registered once and addressed by typed handles. Each call to
//! [`StatisticsAggregator::start_sample`] opens a fresh slot on every metric;
//! updates outside an open window are dropped.

mod aggregator;
mod confidence;
mod metric;
mod window;

pub use aggregator::{MetricHandle, StatisticsAggregator, StatisticsError};
pub use confidence::{ConfidenceLevel, MetricSummary};
pub use metric::{MetricKind, MetricSpec};
pub use window::SampleWindow;
