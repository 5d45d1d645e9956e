//! Results handed to the reporting layer.

use serde::Serialize;
use theatre_core::MetricSummary;

/// Outcome of one replication.
///
/// Patients still in the facility when the run ends are not drained; they
/// are counted in `abandoned_in_flight`, so counters near the end of the
/// last window can undercount.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplicationSummary {
    pub replication: u32,
    pub seed: u64,
    /// Simulated hours the run was driven for
    pub simulation_time: f64,
    pub patients_generated: u64,
    pub patients_recovered: u64,
    pub patients_deceased: u64,
    pub abandoned_in_flight: u64,
    /// Flows abandoned after an error
    pub failed_flows: u64,
    pub events_processed: u64,
    pub invariant_violations: usize,
}

/// Aggregated statistics over every replication run so far.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacilityReport {
    pub replications: Vec<ReplicationSummary>,
    pub metrics: Vec<MetricSummary>,
}

impl FacilityReport {
    /// Looks up the summary of a metric by name.
    pub fn metric(&self, name: &str) -> Option<&MetricSummary> {
        self.metrics.iter().find(|metric| metric.name == name)
    }

    /// Patients left in flight, summed over replications.
    pub fn abandoned_in_flight(&self) -> u64 {
        self.replications
            .iter()
            .map(|replication| replication.abandoned_in_flight)
            .sum()
    }

    /// Flows abandoned after errors, summed over replications.
    pub fn failed_flows(&self) -> u64 {
        self.replications
            .iter()
            .map(|replication| replication.failed_flows)
            .sum()
    }
}
