//! Stochastic patient arrivals.

use theatre_core::config::PatientConfig;
use theatre_core::{
    ConditionCatalog, ConditionId, DistributionError, DistributionSampler, RandomStream,
    RandomStreamFactory, ServiceDistribution, StreamKind,
};
use tracing::debug;

use crate::deterministic::{Flow, FlowContext, FlowError, Suspend, VirtualTime, Wake};
use crate::patient::{PatientId, PatientRecord, ServiceTimes};
use crate::phases::{PatientWorld, PhaseSequencer};

/// Cumulative arrival weights for weighted condition selection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionTable {
    cumulative: Vec<(f64, ConditionId)>,
}

impl ConditionTable {
    /// Builds the table from the catalog's normalised arrival portions.
    ///
    /// Entries sharing the final weight are forced to exactly 1.0 to absorb
    /// rounding drift.
    pub fn new(catalog: &ConditionCatalog) -> Self {
        let total: f64 = catalog.iter().map(|(_, _, c)| c.arrival_portion).sum();
        let mut running = 0.0;
        let mut cumulative: Vec<(f64, ConditionId)> = catalog
            .iter()
            .map(|(id, _, condition)| {
                running += condition.arrival_portion / total;
                (running, id)
            })
            .collect();
        let top = cumulative.last().map_or(1.0, |(weight, _)| *weight);
        for entry in cumulative.iter_mut().filter(|(weight, _)| *weight == top) {
            entry.0 = 1.0;
        }
        Self { cumulative }
    }

    /// Returns the first condition whose cumulative weight exceeds `u`.
    ///
    /// `u` is a uniform draw in `[0, 1)`; values at or above 1.0 select the
    /// last condition.
    pub fn select(&self, u: f64) -> Option<ConditionId> {
        let index = self.cumulative.partition_point(|(weight, _)| *weight <= u);
        self.cumulative
            .get(index)
            .or(self.cumulative.last())
            .map(|(_, id)| *id)
    }

    /// Returns cumulative weights in catalog order.
    pub fn weights(&self) -> impl Iterator<Item = f64> + '_ {
        self.cumulative.iter().map(|(weight, _)| *weight)
    }
}

/// Samplers derived from one condition.
#[derive(Debug, Clone)]
struct ConditionProfile {
    id: ConditionId,
    name: String,
    priority: i32,
    /// Preparation, operation and recovery samplers scaled by the multipliers
    service: [DistributionSampler; 3],
    /// Divisor for the time-to-live draw, absent when the patient cannot die
    mortality: Option<DistributionSampler>,
}

/// Creates patient records with condition, service times and mortality
/// deadline drawn from independent streams.
#[derive(Debug, Clone)]
pub struct PatientFactory {
    table: ConditionTable,
    profiles: Vec<ConditionProfile>,
    universal: Option<ConditionId>,
    condition_stream: RandomStream,
    preparation_stream: RandomStream,
    operation_stream: RandomStream,
    recovery_stream: RandomStream,
    mortality_stream: RandomStream,
    next_id: u64,
}

impl PatientFactory {
    /// Prepares samplers for every condition of the catalog.
    ///
    /// # Errors
    ///
    /// - `DistributionError` - A base distribution or its scaled variant is invalid
    pub fn new(
        patients: &PatientConfig,
        catalog: &ConditionCatalog,
        streams: &RandomStreamFactory,
    ) -> Result<Self, DistributionError> {
        let bases = [
            patients.base_preparation_time,
            patients.base_operation_time,
            patients.base_recovery_time,
        ];

        let profiles = catalog
            .iter()
            .map(|(id, name, condition)| {
                let [prep, op, rec] = condition.service_multipliers;
                let service = [
                    bases[0].scaled(prep)?,
                    bases[1].scaled(op)?,
                    bases[2].scaled(rec)?,
                ];
                let mortality = if condition.mortality_rate > 0.0 {
                    Some(
                        ServiceDistribution::Exponential {
                            mean: condition.mortality_rate,
                        }
                        .sampler()?,
                    )
                } else {
                    None
                };
                Ok(ConditionProfile {
                    id,
                    name: name.to_string(),
                    priority: condition.priority,
                    service,
                    mortality,
                })
            })
            .collect::<Result<Vec<_>, DistributionError>>()?;

        Ok(Self {
            table: ConditionTable::new(catalog),
            profiles,
            universal: catalog.universal(),
            condition_stream: streams.stream(StreamKind::Condition),
            preparation_stream: streams.stream(StreamKind::Preparation),
            operation_stream: streams.stream(StreamKind::Operation),
            recovery_stream: streams.stream(StreamKind::Recovery),
            mortality_stream: streams.stream(StreamKind::Mortality),
            next_id: 0,
        })
    }

    /// Returns number of patients created so far.
    pub fn created(&self) -> u64 {
        self.next_id
    }

    /// Creates the next patient, waiting since `arrival`.
    ///
    /// A single configured condition is assigned without drawing from the
    /// condition stream.
    pub fn create(&mut self, arrival: VirtualTime) -> PatientRecord {
        let chosen = self
            .universal
            .or_else(|| self.table.select(self.condition_stream.unit()))
            .map_or(0, ConditionId::index);
        // Profiles and table are built from the same catalog
        let profile = &self.profiles[chosen];

        let times = ServiceTimes {
            preparation: self.preparation_stream.draw(&profile.service[0]),
            operation: self.operation_stream.draw(&profile.service[1]),
            recovery: self.recovery_stream.draw(&profile.service[2]),
        };
        let deadline = match &profile.mortality {
            Some(divisor) => times.time_to_live(self.mortality_stream.draw(divisor)),
            None => f64::INFINITY,
        };

        let id = PatientId(self.next_id);
        self.next_id += 1;

        debug!(
            patient = %id,
            condition = %profile.name,
            time_to_live = deadline,
            "Created new patient"
        );
        PatientRecord::new(id, profile.id, profile.priority, times, deadline, arrival)
    }
}

/// Arrival process: creates a patient, hands it to the sequencer as a new
/// flow, then waits for the drawn inter-arrival interval.
pub struct PatientGenerator {
    factory: PatientFactory,
    sequencer: PhaseSequencer,
    arrivals: RandomStream,
    interval: DistributionSampler,
    limit: Option<u64>,
}

impl PatientGenerator {
    /// Creates an unbounded generator.
    ///
    /// # Errors
    ///
    /// - `DistributionError` - Arrival or service distributions are invalid
    pub fn new(
        patients: &PatientConfig,
        catalog: &ConditionCatalog,
        streams: &RandomStreamFactory,
        sequencer: PhaseSequencer,
    ) -> Result<Self, DistributionError> {
        Ok(Self {
            factory: PatientFactory::new(patients, catalog, streams)?,
            sequencer,
            arrivals: streams.stream(StreamKind::Arrival),
            interval: patients.arrival_interval.sampler()?,
            limit: None,
        })
    }

    /// Stops after `limit` patients.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl<W: PatientWorld> Flow<W> for PatientGenerator {
    fn resume(&mut self, ctx: &mut FlowContext<'_, W>, wake: Wake) -> Result<Suspend, FlowError> {
        if let Wake::Granted(_) = wake {
            return Err(FlowError::UnexpectedWake {
                flow: "patient-generator",
                wake: wake.as_str(),
                state: "generating",
            });
        }
        if self.limit.is_some_and(|limit| self.factory.created() >= limit) {
            return Ok(Suspend::Done);
        }

        let interval = self.arrivals.draw(&self.interval);
        let patient = self.factory.create(ctx.now());
        ctx.world().arrival_scheduled(interval)?;
        ctx.spawn(self.sequencer.admit(patient));

        Ok(Suspend::Wait(interval))
    }

    fn name(&self) -> &'static str {
        "patient-generator"
    }
}
