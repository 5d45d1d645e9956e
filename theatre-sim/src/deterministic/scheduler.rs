//! Virtual-time cooperative scheduler.

use std::collections::{BTreeMap, BinaryHeap};

use theatre_core::config::PriorityBounds;
use theatre_core::{StatisticsError, TheatreError};
use thiserror::Error;
use tracing::{trace, warn};

use super::clock::{SimulationClock, VirtualTime};
use super::events::{FlowId, Wake, Wakeup};
use super::flow::{Flow, FlowContext, FlowError, Suspend};
use super::invariants::{Invariant, InvariantViolation};
use super::resources::{
    Grant, PoolId, PriorityResourcePool, RequestOutcome, ResourcePools,
};

/// Maximum number of invariant violations before stopping simulation.
const MAX_INVARIANT_VIOLATIONS: usize = 10;

/// Errors that stop a simulation run.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Configuration rejected before the run started
    #[error("Configuration error: {0}")]
    Configuration(#[from] TheatreError),

    /// Metric registration failed
    #[error("Statistics error: {0}")]
    Statistics(#[from] StatisticsError),

    /// Pool could not be created
    #[error("Invalid resource pool: {reason}")]
    InvalidPool {
        /// Why the pool was rejected
        reason: String,
    },

    /// Too many invariant violations occurred
    #[error("Too many invariant violations: {count}")]
    TooManyInvariantViolations {
        /// Number of violations that occurred
        count: usize,
    },

    /// Event could not be scheduled properly
    #[error("Invalid event scheduling: {reason}")]
    InvalidEventScheduling {
        /// Reason why scheduling failed
        reason: String,
    },

    /// Run target lies before the current time
    #[error("Cannot run until {target}, clock is already at {now}")]
    InvalidRunLength {
        /// Requested end of run
        target: VirtualTime,
        /// Clock when the run was requested
        now: VirtualTime,
    },
}

/// Counters maintained by the scheduler over its lifetime.
#[derive(Debug, Clone, Default)]
pub struct SchedulerMetrics {
    pub events_processed: u64,
    pub flows_spawned: u64,
    pub flows_completed: u64,
    pub failed_flows: u64,
    pub invariant_violations: Vec<InvariantViolation>,
}

/// Outcome of one [`EventScheduler::advance_until`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Clock after the call
    pub now: VirtualTime,
    /// Wake-ups processed during this call
    pub events_processed: u64,
    /// Flows abandoned after an error, over the scheduler lifetime
    pub failed_flows: u64,
    /// Flows still suspended, waiting on a timer or a pool
    pub suspended_flows: usize,
    /// Wake-ups scheduled after the run target
    pub pending_events: usize,
}

/// Scheduler state shared with running flows.
pub(crate) struct SchedulerCore<W> {
    clock: SimulationClock,
    queue: BinaryHeap<Wakeup>,
    flows: BTreeMap<FlowId, Box<dyn Flow<W>>>,
    pub(crate) pools: ResourcePools,
    next_flow: u64,
    next_seq: u64,
    metrics: SchedulerMetrics,
}

impl<W> SchedulerCore<W> {
    fn new(pools: ResourcePools) -> Self {
        Self {
            clock: SimulationClock::new(),
            queue: BinaryHeap::new(),
            flows: BTreeMap::new(),
            pools,
            next_flow: 0,
            next_seq: 0,
            metrics: SchedulerMetrics::default(),
        }
    }

    pub(crate) fn now(&self) -> VirtualTime {
        self.clock.now()
    }

    pub(crate) fn register_flow(&mut self) -> FlowId {
        let id = FlowId(self.next_flow);
        self.next_flow += 1;
        self.metrics.flows_spawned += 1;
        id
    }

    fn schedule(&mut self, at: VirtualTime, flow: FlowId, wake: Wake) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Wakeup {
            at,
            seq,
            flow,
            wake,
        });
    }

    fn wake_granted(&mut self, granted: Vec<(FlowId, Grant)>) {
        let now = self.clock.now();
        for (flow, grant) in granted {
            trace!(%flow, pool = %grant.pool(), "Queued request granted");
            self.schedule(now, flow, Wake::Granted(grant));
        }
    }

    pub(crate) fn release(&mut self, grant: Grant) -> Result<(), FlowError> {
        let granted = self.pools.release(grant)?;
        self.wake_granted(granted);
        Ok(())
    }

    fn finish(&mut self, flow: FlowId) {
        self.metrics.flows_completed += 1;
        let granted = self.pools.release_held_by(flow);
        self.wake_granted(granted);
    }

    fn fail(&mut self, flow: FlowId, name: &'static str, error: &FlowError) {
        warn!(%flow, name, %error, at = %self.clock.now(), "Flow failed and was abandoned");
        self.metrics.failed_flows += 1;
        let granted = self.pools.release_held_by(flow);
        self.wake_granted(granted);
    }
}

/// Runs `flow` from `wake` until it suspends, finishes or fails.
///
/// Immediate grants resume the flow synchronously; any other suspension
/// parks it in the flow table.
pub(crate) fn drive<W>(
    core: &mut SchedulerCore<W>,
    world: &mut W,
    id: FlowId,
    mut flow: Box<dyn Flow<W>>,
    mut wake: Wake,
) {
    loop {
        trace!(flow = %id, wake = wake.as_str(), at = %core.clock.now(), "Resuming flow");
        let outcome = {
            let mut ctx = FlowContext {
                core: &mut *core,
                world: &mut *world,
                current: id,
            };
            flow.resume(&mut ctx, wake)
        };

        let suspend = match outcome {
            Ok(suspend) => suspend,
            Err(error) => {
                core.fail(id, flow.name(), &error);
                return;
            }
        };

        match suspend {
            Suspend::Wait(delay) => {
                if !(delay.is_finite() && delay >= 0.0) {
                    core.fail(id, flow.name(), &FlowError::InvalidDelay { delay });
                    return;
                }
                let at = core.clock.now().after(delay);
                core.schedule(at, id, Wake::Timer);
                core.flows.insert(id, flow);
                return;
            }
            Suspend::WaitUntil(at) => {
                let now = core.clock.now();
                if at < now || !at.hours().is_finite() {
                    let delay = at.hours() - now.hours();
                    core.fail(id, flow.name(), &FlowError::InvalidDelay { delay });
                    return;
                }
                core.schedule(at, id, Wake::Timer);
                core.flows.insert(id, flow);
                return;
            }
            Suspend::Acquire { pool, priority } => {
                match core.pools.request(pool, id, priority) {
                    Ok(RequestOutcome::Granted(grant)) => wake = Wake::Granted(grant),
                    Ok(RequestOutcome::Queued) => {
                        core.flows.insert(id, flow);
                        return;
                    }
                    Err(error) => {
                        core.fail(id, flow.name(), &error);
                        return;
                    }
                }
            }
            Suspend::Done => {
                core.finish(id);
                return;
            }
        }
    }
}

/// Deterministic cooperative scheduler over a shared world `W`.
///
/// Flows resume strictly one at a time, earliest wake-up first and in
/// registration order within the same instant, so a run is fully determined
/// by its inputs.
pub struct EventScheduler<W> {
    core: SchedulerCore<W>,
    world: W,
    invariants: Vec<Box<dyn Invariant>>,
}

impl<W> EventScheduler<W> {
    /// Creates scheduler at time zero with no pools.
    pub fn new(world: W) -> Self {
        Self::with_pools(ResourcePools::new(), world)
    }

    /// Creates scheduler at time zero over existing pools.
    pub fn with_pools(pools: ResourcePools, world: W) -> Self {
        Self {
            core: SchedulerCore::new(pools),
            world,
            invariants: Vec::new(),
        }
    }

    /// Registers a new pool.
    ///
    /// # Errors
    ///
    /// - `SimulationError::InvalidPool` - Zero capacity or inverted bounds
    pub fn add_pool(
        &mut self,
        capacity: usize,
        bounds: PriorityBounds,
    ) -> Result<PoolId, SimulationError> {
        self.core.pools.add(capacity, bounds)
    }

    /// Adds an invariant checked after every processed wake-up.
    pub fn add_invariant(&mut self, invariant: Box<dyn Invariant>) {
        self.invariants.push(invariant);
    }

    /// Registers a flow and runs it until its first suspension point.
    pub fn spawn(&mut self, flow: impl Flow<W> + 'static) -> FlowId {
        let id = self.core.register_flow();
        drive(&mut self.core, &mut self.world, id, Box::new(flow), Wake::Start);
        id
    }

    /// Returns current simulation time.
    pub fn now(&self) -> VirtualTime {
        self.core.now()
    }

    /// Returns the shared world.
    pub fn world(&self) -> &W {
        &self.world
    }

    /// Returns the shared world mutably.
    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    /// Consumes the scheduler, discarding suspended flows.
    pub fn into_world(self) -> W {
        self.world
    }

    /// Returns all pools.
    pub fn pools(&self) -> &ResourcePools {
        &self.core.pools
    }

    /// Looks up pool by id.
    pub fn pool(&self, id: PoolId) -> Option<&PriorityResourcePool> {
        self.core.pools.get(id)
    }

    /// Returns lifetime counters.
    pub fn metrics(&self) -> &SchedulerMetrics {
        &self.core.metrics
    }

    /// Returns number of suspended flows.
    pub fn suspended_flows(&self) -> usize {
        self.core.flows.len()
    }

    /// Returns number of scheduled wake-ups.
    pub fn pending_events(&self) -> usize {
        self.core.queue.len()
    }

    /// Returns time of the earliest scheduled wake-up.
    pub fn next_event_time(&self) -> Option<VirtualTime> {
        self.core.queue.peek().map(|w| w.at)
    }

    /// Processes every wake-up due at or before `target`, then sets the
    /// clock to `target`.
    ///
    /// Flows still suspended afterwards stay registered and can be resumed
    /// by a later call.
    ///
    /// # Errors
    ///
    /// - `SimulationError::InvalidRunLength` - Target before current time or NaN
    /// - `SimulationError::TooManyInvariantViolations` - Too many invariant violations
    pub fn advance_until(&mut self, target: VirtualTime) -> Result<RunSummary, SimulationError> {
        let now = self.core.now();
        if target < now || target.hours().is_nan() {
            return Err(SimulationError::InvalidRunLength { target, now });
        }

        let mut processed = 0;
        while self.core.queue.peek().is_some_and(|next| next.at <= target) {
            let Some(wakeup) = self.core.queue.pop() else {
                break;
            };

            self.core.clock.advance_to(wakeup.at)?;
            self.core.metrics.events_processed += 1;
            processed += 1;

            match self.core.flows.remove(&wakeup.flow) {
                Some(flow) => drive(
                    &mut self.core,
                    &mut self.world,
                    wakeup.flow,
                    flow,
                    wakeup.wake,
                ),
                None => {
                    trace!(flow = %wakeup.flow, "Wake-up for finished flow ignored");
                    if let Wake::Granted(grant) = wakeup.wake {
                        self.core
                            .release(grant)
                            .map_err(|e| SimulationError::InvalidEventScheduling {
                                reason: e.to_string(),
                            })?;
                    }
                }
            }

            self.check_invariants()?;
        }

        if target.hours().is_finite() {
            self.core.clock.advance_to(target)?;
        }

        Ok(RunSummary {
            now: self.core.now(),
            events_processed: processed,
            failed_flows: self.core.metrics.failed_flows,
            suspended_flows: self.core.flows.len(),
            pending_events: self.core.queue.len(),
        })
    }

    fn check_invariants(&mut self) -> Result<(), SimulationError> {
        let now = self.core.now();
        for invariant in &self.invariants {
            if let Err(violation) = invariant.check(&self.core.pools, now) {
                warn!(%violation, "Invariant violated");
                self.core.metrics.invariant_violations.push(violation);

                if self.core.metrics.invariant_violations.len() >= MAX_INVARIANT_VIOLATIONS {
                    return Err(SimulationError::TooManyInvariantViolations {
                        count: self.core.metrics.invariant_violations.len(),
                    });
                }
            }
        }
        Ok(())
    }
}
