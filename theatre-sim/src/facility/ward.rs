//! Shared world of one facility run: station pools, metrics and observers.

use std::collections::BTreeSet;

use theatre_core::{ConditionCatalog, MetricHandle, MetricSpec, StatisticsAggregator, StatisticsError};
use tracing::debug;

use crate::deterministic::{FlowError, PoolId, PriorityResourcePool, ResourcePools, VirtualTime};
use crate::patient::{Phase, PatientId, PatientRecord};
use crate::phases::PatientWorld;

/// Receives every patient status transition.
pub trait StatusObserver {
    /// Called after `patient` entered `phase` at `at`.
    fn on_status(&mut self, phase: Phase, patient: &PatientRecord, at: VirtualTime);
}

impl<F> StatusObserver for F
where
    F: FnMut(Phase, &PatientRecord, VirtualTime),
{
    fn on_status(&mut self, phase: Phase, patient: &PatientRecord, at: VirtualTime) {
        self(phase, patient, at)
    }
}

/// Pools backing the three stations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationPools {
    pub preparation: PoolId,
    pub operation: PoolId,
    pub recovery: PoolId,
}

/// Handles of every metric the facility records.
#[derive(Debug, Clone)]
pub struct FacilityMetrics {
    /// True share per condition, in catalog order
    pub condition_portions: Vec<MetricHandle>,
    pub prepared: MetricHandle,
    pub operated: MetricHandle,
    pub recovered: MetricHandle,
    pub deceased: MetricHandle,
    pub generated: MetricHandle,
    pub arrival_interval: MetricHandle,
    pub time_to_prepare: MetricHandle,
    pub time_to_operate: MetricHandle,
    pub time_per_patient: MetricHandle,
    pub preparation_time: MetricHandle,
    pub operation_time: MetricHandle,
    pub recovery_time: MetricHandle,
    pub operation_usage: MetricHandle,
    pub arrival_queue_length: MetricHandle,
    pub idle_preparation: MetricHandle,
    pub blocked_operations: MetricHandle,
    pub recovery_full: MetricHandle,
}

impl FacilityMetrics {
    /// Registers the facility metrics.
    ///
    /// # Errors
    ///
    /// - `StatisticsError::DuplicateMetric` - A metric name is already taken
    pub fn register(
        statistics: &mut StatisticsAggregator,
        catalog: &ConditionCatalog,
    ) -> Result<Self, StatisticsError> {
        let condition_portions = catalog
            .iter()
            .map(|(_, name, _)| {
                statistics.register(
                    format!("patient-portion-{name}"),
                    MetricSpec::mean(
                        format!("True portion of {name} patients"),
                        format!("portion_{name}"),
                    )
                    .with_unit("%"),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut counter = |name: &str, title: &str, short: &str| {
            statistics.register(name, MetricSpec::counter(title, short))
        };
        let prepared = counter(
            "number-of-prepared",
            "Number of patients PREPARED in total",
            "total_prepared",
        )?;
        let operated = counter(
            "number-of-operated",
            "Number of patients OPERATED in total",
            "total_operated",
        )?;
        let recovered = counter(
            "number-of-recovered",
            "Number of patients RECOVERED in total",
            "total_recovered",
        )?;
        let deceased = counter(
            "number-of-deceased",
            "Number of patients DECEASED in total",
            "total_deceased",
        )?;
        let generated = counter(
            "total-number-of-patients",
            "Total number of patients generated",
            "total_patients",
        )?;

        let mut mean = |name: &str, title: &str, short: &str, unit: &str| {
            statistics.register(name, MetricSpec::mean(title, short).with_unit(unit))
        };
        Ok(Self {
            condition_portions,
            prepared,
            operated,
            recovered,
            deceased,
            generated,
            arrival_interval: mean(
                "patient-generator-interval",
                "True interval of generating patients",
                "interval_patients",
                "hours",
            )?,
            time_to_prepare: mean(
                "mean-time-per-prepare",
                "Mean time spent from WAITING to PREPARED",
                "from_wait_to_prep",
                "hours",
            )?,
            time_to_operate: mean(
                "mean-time-per-operate",
                "Mean time spent from PREPARED to OPERATED",
                "from_prep_to_oper",
                "hours",
            )?,
            time_per_patient: mean(
                "mean-time-per-patient",
                "Mean time spent from WAITING to RECOVERED",
                "from_wait_to_reco",
                "hours",
            )?,
            preparation_time: mean(
                "mean-in-preparation-time",
                "Mean preparation time based on distribution",
                "mean_prep_time_distr",
                "hours",
            )?,
            operation_time: mean(
                "mean-in-operation-time",
                "Mean operation time based on distribution",
                "mean_oper_time_distr",
                "hours",
            )?,
            recovery_time: mean(
                "mean-in-recovery-time",
                "Mean recovery time based on distribution",
                "mean_reco_time_distr",
                "hours",
            )?,
            operation_usage: mean(
                "usage-of-operation-unit",
                "Utilization of the operation theater",
                "operation_usage",
                "%",
            )?,
            arrival_queue_length: mean(
                "arrival-queue-length",
                "Patients at the arrival queue",
                "arr_queue_length",
                "",
            )?,
            idle_preparation: mean(
                "idle-capacity-preparation",
                "Idle capacity at preparation",
                "idle_capacity",
                "",
            )?,
            blocked_operations: mean(
                "rate-blocking-operations",
                "Moving to recovery blocked",
                "move_reco_blocked",
                "%",
            )?,
            recovery_full: mean(
                "all-recovery-units-busy",
                "All recovery units are busy",
                "all_reco_busy",
                "%",
            )?,
        })
    }
}

/// Patient counts over one run, independent of sample windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WardCounts {
    pub generated: u64,
    pub recovered: u64,
    pub deceased: u64,
}

/// World shared by the generator, patient and sampler flows of one run.
pub struct Ward {
    stations: StationPools,
    statistics: StatisticsAggregator,
    metrics: FacilityMetrics,
    observers: Vec<Box<dyn StatusObserver>>,
    arrival_queue: BTreeSet<PatientId>,
    counts: WardCounts,
}

impl Ward {
    pub fn new(
        stations: StationPools,
        statistics: StatisticsAggregator,
        metrics: FacilityMetrics,
        observers: Vec<Box<dyn StatusObserver>>,
    ) -> Self {
        Self {
            stations,
            statistics,
            metrics,
            observers,
            arrival_queue: BTreeSet::new(),
            counts: WardCounts::default(),
        }
    }

    pub fn statistics(&self) -> &StatisticsAggregator {
        &self.statistics
    }

    pub fn statistics_mut(&mut self) -> &mut StatisticsAggregator {
        &mut self.statistics
    }

    pub fn counts(&self) -> WardCounts {
        self.counts
    }

    /// Patients generated but neither recovered nor deceased.
    pub fn in_flight(&self) -> u64 {
        self.counts.generated - self.counts.recovered - self.counts.deceased
    }

    /// Patients waiting for a preparation unit.
    pub fn arrival_queue_len(&self) -> usize {
        self.arrival_queue.len()
    }

    /// Hands back aggregator and observers at the end of a run.
    pub fn into_parts(self) -> (StatisticsAggregator, Vec<Box<dyn StatusObserver>>) {
        (self.statistics, self.observers)
    }

    /// Records one tick of the time-series metrics.
    ///
    /// # Errors
    ///
    /// - `FlowError::UnknownPool` - A station pool is missing
    /// - `FlowError::Statistics` - A metric handle is not registered
    pub fn sample_time_series(&mut self, pools: &ResourcePools) -> Result<(), FlowError> {
        let operation = station(pools, self.stations.operation)?;
        let preparation = station(pools, self.stations.preparation)?;
        let recovery = station(pools, self.stations.recovery)?;

        let usage = operation.in_use() as f64 / operation.capacity() as f64 * 100.0;
        let queue = self.arrival_queue.len() as f64;
        let idle = preparation.idle() as f64;
        let full = if recovery.is_saturated() { 100.0 } else { 0.0 };

        let metrics = &self.metrics;
        self.statistics.update(metrics.operation_usage, usage)?;
        self.statistics.update(metrics.arrival_queue_length, queue)?;
        self.statistics.update(metrics.idle_preparation, idle)?;
        self.statistics.update(metrics.recovery_full, full)?;
        Ok(())
    }

    fn record_arrival(&mut self, patient: &PatientRecord) -> Result<(), StatisticsError> {
        self.arrival_queue.insert(patient.id());
        self.counts.generated += 1;

        let metrics = &self.metrics;
        let times = patient.service_times();
        self.statistics.increment(metrics.generated)?;
        self.statistics.update(metrics.preparation_time, times.preparation)?;
        self.statistics.update(metrics.operation_time, times.operation)?;
        self.statistics.update(metrics.recovery_time, times.recovery)?;
        for (index, handle) in metrics.condition_portions.iter().enumerate() {
            let share = if index == patient.condition().index() {
                100.0
            } else {
                0.0
            };
            self.statistics.update(*handle, share)?;
        }
        Ok(())
    }

    fn record_recovery(&mut self, patient: &PatientRecord) -> Result<(), StatisticsError> {
        self.counts.recovered += 1;

        let metrics = &self.metrics;
        let lead_times = [
            (metrics.time_to_prepare, Phase::Waiting, Phase::Prepared),
            (metrics.time_to_operate, Phase::Prepared, Phase::Operated),
            (metrics.time_per_patient, Phase::Waiting, Phase::Recovered),
        ];
        for (handle, from, to) in lead_times {
            if let Some(elapsed) = patient.elapsed_between(from, to) {
                self.statistics.update(handle, elapsed)?;
            }
        }
        self.statistics.increment(metrics.recovered)
    }
}

fn station(pools: &ResourcePools, id: PoolId) -> Result<&PriorityResourcePool, FlowError> {
    pools.get(id).ok_or(FlowError::UnknownPool { pool: id })
}

impl PatientWorld for Ward {
    fn status_changed(
        &mut self,
        pools: &ResourcePools,
        phase: Phase,
        patient: &PatientRecord,
        at: VirtualTime,
    ) -> Result<(), FlowError> {
        debug!(patient = %patient.id(), %phase, %at, "Patient status changed");

        match phase {
            Phase::Waiting => self.record_arrival(patient)?,
            Phase::InPreparation => {
                self.arrival_queue.remove(&patient.id());
            }
            Phase::Prepared => self.statistics.increment(self.metrics.prepared)?,
            Phase::Operated => {
                let blocked = station(pools, self.stations.recovery)?.is_saturated();
                self.statistics.increment(self.metrics.operated)?;
                self.statistics.update(
                    self.metrics.blocked_operations,
                    if blocked { 100.0 } else { 0.0 },
                )?;
            }
            Phase::Recovered => self.record_recovery(patient)?,
            Phase::Deceased => {
                self.arrival_queue.remove(&patient.id());
                self.counts.deceased += 1;
                self.statistics.increment(self.metrics.deceased)?;
            }
            Phase::InOperation | Phase::InRecovery => {}
        }

        for observer in &mut self.observers {
            observer.on_status(phase, patient, at);
        }
        Ok(())
    }

    fn arrival_scheduled(&mut self, interval: f64) -> Result<(), FlowError> {
        self.statistics
            .update(self.metrics.arrival_interval, interval)?;
        Ok(())
    }
}
