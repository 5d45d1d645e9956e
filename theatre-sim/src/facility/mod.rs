//! Surgery facility driver.
//!
//! Wires configuration, random streams, station pools, the patient generator
//! and the sampler into replications of one scheduler run each. Statistics
//! persist across replications so every run contributes its own windows.

mod report;
mod sampler;
mod ward;

pub use report::{FacilityReport, ReplicationSummary};
pub use sampler::SamplerFlow;
pub use ward::{FacilityMetrics, StationPools, StatusObserver, Ward, WardCounts};

use theatre_core::{
    ConditionCatalog, RandomStreamFactory, StatisticsAggregator, TheatreConfig, TheatreError,
};
use tracing::{debug, info, instrument, warn};

use crate::deterministic::{
    EventScheduler, PoolCapacityInvariant, ResourcePools, SimulationError, VirtualTime,
    WorkConservingInvariant,
};
use crate::generator::PatientGenerator;
use crate::phases::PhaseSequencer;

/// Surgery facility simulation built from a validated configuration.
pub struct SurgeryFacility {
    config: TheatreConfig,
    catalog: ConditionCatalog,
    statistics: StatisticsAggregator,
    metrics: FacilityMetrics,
    observers: Vec<Box<dyn StatusObserver>>,
    replications: Vec<ReplicationSummary>,
}

impl SurgeryFacility {
    /// Validates configuration and registers the facility metrics.
    ///
    /// # Errors
    ///
    /// - `SimulationError::Configuration` - Configuration is invalid
    /// - `SimulationError::Statistics` - Two conditions map to the same metric name
    pub fn new(config: TheatreConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let catalog = config.condition_catalog()?;
        let mut statistics = StatisticsAggregator::new();
        let metrics = FacilityMetrics::register(&mut statistics, &catalog)?;

        Ok(Self {
            config,
            catalog,
            statistics,
            metrics,
            observers: Vec::new(),
            replications: Vec::new(),
        })
    }

    /// Adds an observer receiving every status transition of later runs.
    pub fn add_observer(&mut self, observer: impl StatusObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn config(&self) -> &TheatreConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ConditionCatalog {
        &self.catalog
    }

    /// Returns statistics accumulated over all runs so far.
    pub fn statistics(&self) -> &StatisticsAggregator {
        &self.statistics
    }

    /// Returns summaries of finished replications.
    pub fn replications(&self) -> &[ReplicationSummary] {
        &self.replications
    }

    /// Runs every configured replication over the full window schedule.
    ///
    /// Replication `r` is seeded with `seed + r`.
    ///
    /// # Errors
    ///
    /// - `SimulationError` - A replication could not be set up or stopped on
    ///   too many invariant violations
    pub fn run(&mut self) -> Result<FacilityReport, SimulationError> {
        let total_time = self.config.simulation_time();
        info!(
            runs = self.config.run.runs,
            seed = self.config.run.seed,
            simulation_time = total_time,
            "Starting simulation"
        );

        for replication in 0..self.config.run.runs {
            let seed = self.config.run.seed.wrapping_add(u64::from(replication));
            self.run_replication(replication, seed, total_time)?;
        }

        info!("Simulation ended successfully");
        Ok(self.report())
    }

    /// Runs one more replication for an explicit horizon.
    ///
    /// The replication is seeded with `seed + number of finished replications`.
    ///
    /// # Errors
    ///
    /// - `SimulationError::Configuration` - Horizon negative or not finite
    /// - `SimulationError` - See [`SurgeryFacility::run`]
    pub fn run_for(&mut self, total_time: f64) -> Result<ReplicationSummary, SimulationError> {
        if !(total_time.is_finite() && total_time >= 0.0) {
            return Err(TheatreError::configuration(format!(
                "simulation time must be finite and non-negative, got {total_time}"
            ))
            .into());
        }
        let replication = u32::try_from(self.replications.len()).unwrap_or(u32::MAX);
        let seed = self.config.run.seed.wrapping_add(u64::from(replication));
        self.run_replication(replication, seed, total_time)
    }

    /// Returns aggregates over every replication run so far.
    pub fn report(&self) -> FacilityReport {
        FacilityReport {
            replications: self.replications.clone(),
            metrics: self.statistics.report(),
        }
    }

    #[instrument(name = "replication", skip(self, total_time))]
    fn run_replication(
        &mut self,
        replication: u32,
        seed: u64,
        total_time: f64,
    ) -> Result<ReplicationSummary, SimulationError> {
        info!(hours = total_time, "Starting simulation run");

        let facility = self.config.facility;
        let bounds = facility.priority_bounds;
        let mut pools = ResourcePools::new();
        let stations = StationPools {
            preparation: pools.add(facility.preparation_units, bounds)?,
            operation: pools.add(facility.operation_units, bounds)?,
            recovery: pools.add(facility.recovery_units, bounds)?,
        };

        let streams = RandomStreamFactory::new(seed);
        let sequencer =
            PhaseSequencer::standard(stations.preparation, stations.operation, stations.recovery);
        let generator =
            PatientGenerator::new(&self.config.patients, &self.catalog, &streams, sequencer)
                .map_err(TheatreError::from)?;

        let ward = Ward::new(
            stations,
            std::mem::take(&mut self.statistics),
            self.metrics.clone(),
            std::mem::take(&mut self.observers),
        );
        let mut scheduler = EventScheduler::with_pools(pools, ward);
        scheduler.add_invariant(Box::new(PoolCapacityInvariant));
        scheduler.add_invariant(Box::new(WorkConservingInvariant));

        scheduler.spawn(SamplerFlow::new(self.config.sampling));
        scheduler.spawn(generator);

        let outcome = scheduler.advance_until(VirtualTime::from_hours(total_time));
        let metrics = scheduler.metrics().clone();
        let ward = scheduler.into_world();
        let counts = ward.counts();
        let abandoned_in_flight = ward.in_flight();

        let (mut statistics, observers) = ward.into_parts();
        if statistics.is_sampling() {
            debug!("Closing sample still open at end of run");
            statistics.end_sample();
        }
        self.statistics = statistics;
        self.observers = observers;

        let run = outcome?;
        if run.failed_flows > 0 {
            warn!(failed_flows = run.failed_flows, "Flows failed during run");
        }

        let summary = ReplicationSummary {
            replication,
            seed,
            simulation_time: total_time,
            patients_generated: counts.generated,
            patients_recovered: counts.recovered,
            patients_deceased: counts.deceased,
            abandoned_in_flight,
            failed_flows: metrics.failed_flows,
            events_processed: metrics.events_processed,
            invariant_violations: metrics.invariant_violations.len(),
        };
        info!(
            generated = summary.patients_generated,
            recovered = summary.patients_recovered,
            deceased = summary.patients_deceased,
            in_flight = summary.abandoned_in_flight,
            "Simulation run finished"
        );

        self.replications.push(summary.clone());
        Ok(summary)
    }
}
