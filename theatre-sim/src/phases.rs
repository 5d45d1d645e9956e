//! Phase sequencer moving patients through the station route.
//!
//! Each station is optionally gated by a resource pool. A patient reserves
//! the next station before releasing the current one, so nobody is pushed
//! into an unbounded queue between stations. Preparation and operation race
//! the service time against the patient's remaining time to live.

use std::rc::Rc;

use tracing::trace;

use crate::deterministic::{
    Flow, FlowContext, FlowError, Grant, PoolId, ResourcePools, Suspend, VirtualTime, Wake,
};
use crate::patient::{Phase, PatientRecord, ServiceTimes};

/// Kind of work done at a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationKind {
    Preparation,
    Operation,
    Recovery,
}

impl StationKind {
    /// Phase entered when service starts.
    pub fn entered(self) -> Phase {
        match self {
            StationKind::Preparation => Phase::InPreparation,
            StationKind::Operation => Phase::InOperation,
            StationKind::Recovery => Phase::InRecovery,
        }
    }

    /// Phase entered when service completes.
    pub fn completed(self) -> Phase {
        match self {
            StationKind::Preparation => Phase::Prepared,
            StationKind::Operation => Phase::Operated,
            StationKind::Recovery => Phase::Recovered,
        }
    }

    /// Returns whether a patient can die while served here.
    pub fn is_mortal(self) -> bool {
        !matches!(self, StationKind::Recovery)
    }

    /// Returns the patient's service time at this station.
    pub fn service_time(self, times: &ServiceTimes) -> f64 {
        match self {
            StationKind::Preparation => times.preparation,
            StationKind::Operation => times.operation,
            StationKind::Recovery => times.recovery,
        }
    }
}

/// One step of the route and the pool gating it, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Station {
    pub kind: StationKind,
    pub pool: Option<PoolId>,
}

/// World seen by patient flows.
pub trait PatientWorld {
    /// Called synchronously on every phase transition, after the record has
    /// been updated.
    ///
    /// # Errors
    ///
    /// - `FlowError` - Transition cannot be recorded; the patient's flow is
    ///   abandoned
    fn status_changed(
        &mut self,
        pools: &ResourcePools,
        phase: Phase,
        patient: &PatientRecord,
        at: VirtualTime,
    ) -> Result<(), FlowError>;

    /// Called by the generator with each drawn inter-arrival interval.
    ///
    /// # Errors
    ///
    /// - `FlowError` - Interval cannot be recorded
    fn arrival_scheduled(&mut self, _interval: f64) -> Result<(), FlowError> {
        Ok(())
    }
}

/// Station route shared by every patient of a run.
#[derive(Debug, Clone)]
pub struct PhaseSequencer {
    route: Rc<[Station]>,
}

impl PhaseSequencer {
    /// Creates sequencer over an explicit route.
    pub fn new(route: Vec<Station>) -> Self {
        Self {
            route: route.into(),
        }
    }

    /// Creates the preparation, operation and recovery route, each gated by
    /// its own pool.
    pub fn standard(preparation: PoolId, operation: PoolId, recovery: PoolId) -> Self {
        Self::new(vec![
            Station {
                kind: StationKind::Preparation,
                pool: Some(preparation),
            },
            Station {
                kind: StationKind::Operation,
                pool: Some(operation),
            },
            Station {
                kind: StationKind::Recovery,
                pool: Some(recovery),
            },
        ])
    }

    /// Returns the route.
    pub fn route(&self) -> &[Station] {
        &self.route
    }

    /// Creates the flow carrying `patient` through the route.
    pub fn admit(&self, patient: PatientRecord) -> PatientFlow {
        PatientFlow {
            patient,
            route: Rc::clone(&self.route),
            step: Step::Admit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Died,
}

#[derive(Debug)]
enum Step {
    Admit,
    /// Requested the pool of `station` while still holding the previous unit
    Acquiring { station: usize, held: Option<Grant> },
    InService {
        station: usize,
        grant: Option<Grant>,
        outcome: Outcome,
    },
    Finished,
}

impl Step {
    fn as_str(&self) -> &'static str {
        match self {
            Step::Admit => "admitting",
            Step::Acquiring { .. } => "acquiring a station",
            Step::InService { .. } => "in service",
            Step::Finished => "finished",
        }
    }
}

/// One patient's path through the station route.
#[derive(Debug)]
pub struct PatientFlow {
    patient: PatientRecord,
    route: Rc<[Station]>,
    step: Step,
}

impl PatientFlow {
    /// Returns the patient carried by this flow.
    pub fn patient(&self) -> &PatientRecord {
        &self.patient
    }

    fn transition<W: PatientWorld>(
        &mut self,
        ctx: &mut FlowContext<'_, W>,
        phase: Phase,
    ) -> Result<(), FlowError> {
        let now = ctx.now();
        self.patient.enter(phase, now)?;
        let (pools, world) = ctx.parts();
        world.status_changed(pools, phase, &self.patient, now)
    }

    /// Moves towards `station`, keeping `held` until its unit is granted.
    fn approach<W: PatientWorld>(
        &mut self,
        ctx: &mut FlowContext<'_, W>,
        station: usize,
        held: Option<Grant>,
    ) -> Result<Suspend, FlowError> {
        let Some(next) = self.route.get(station).copied() else {
            if let Some(grant) = held {
                ctx.release(grant)?;
            }
            self.step = Step::Finished;
            return Ok(Suspend::Done);
        };

        match next.pool {
            Some(pool) => {
                trace!(patient = %self.patient.id(), %pool, "Requesting station");
                self.step = Step::Acquiring { station, held };
                Ok(Suspend::Acquire {
                    pool,
                    priority: self.patient.priority(),
                })
            }
            None => {
                if let Some(grant) = held {
                    ctx.release(grant)?;
                }
                self.serve(ctx, station, None)
            }
        }
    }

    fn serve<W: PatientWorld>(
        &mut self,
        ctx: &mut FlowContext<'_, W>,
        station: usize,
        grant: Option<Grant>,
    ) -> Result<Suspend, FlowError> {
        let kind = self.route[station].kind;
        self.transition(ctx, kind.entered())?;

        let service = kind.service_time(self.patient.service_times());
        let remaining = self.patient.time_to_live(ctx.now());
        let (delay, outcome) = if kind.is_mortal() && remaining < service {
            (service.min(remaining).max(0.0), Outcome::Died)
        } else {
            (service, Outcome::Completed)
        };

        self.step = Step::InService {
            station,
            grant,
            outcome,
        };
        Ok(Suspend::Wait(delay))
    }

    fn complete<W: PatientWorld>(
        &mut self,
        ctx: &mut FlowContext<'_, W>,
        station: usize,
        grant: Option<Grant>,
        outcome: Outcome,
    ) -> Result<Suspend, FlowError> {
        if outcome == Outcome::Died {
            self.transition(ctx, Phase::Deceased)?;
            if let Some(grant) = grant {
                ctx.release(grant)?;
            }
            self.step = Step::Finished;
            return Ok(Suspend::Done);
        }

        let kind = self.route[station].kind;
        self.transition(ctx, kind.completed())?;
        self.approach(ctx, station + 1, grant)
    }
}

impl<W: PatientWorld> Flow<W> for PatientFlow {
    fn resume(&mut self, ctx: &mut FlowContext<'_, W>, wake: Wake) -> Result<Suspend, FlowError> {
        let step = std::mem::replace(&mut self.step, Step::Finished);
        match (step, wake) {
            (Step::Admit, Wake::Start) => {
                let now = ctx.now();
                let (pools, world) = ctx.parts();
                world.status_changed(pools, Phase::Waiting, &self.patient, now)?;
                self.approach(ctx, 0, None)
            }
            (Step::Acquiring { station, held }, Wake::Granted(grant)) => {
                if let Some(previous) = held {
                    ctx.release(previous)?;
                }
                self.serve(ctx, station, Some(grant))
            }
            (
                Step::InService {
                    station,
                    grant,
                    outcome,
                },
                Wake::Timer,
            ) => self.complete(ctx, station, grant, outcome),
            (step, wake) => Err(FlowError::UnexpectedWake {
                flow: "patient",
                wake: wake.as_str(),
                state: step.as_str(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "patient"
    }
}
