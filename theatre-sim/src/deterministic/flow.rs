//! Cooperative flows and the context they run in.
//!
//! A flow is an explicit state machine. The scheduler resumes it with the
//! reason it was woken and the flow answers with its next suspension point.
//! Exactly one flow runs at a time, so flows share the world and the pools
//! without locking.

use theatre_core::StatisticsError;
use thiserror::Error;

use super::clock::VirtualTime;
use super::events::{FlowId, Wake};
use super::resources::{Grant, PoolId, ResourcePools};
use super::scheduler::{SchedulerCore, drive};
use crate::patient::PhaseError;

/// Failure inside a single flow.
///
/// The scheduler logs the error, abandons the flow and releases any units it
/// still holds; other flows are unaffected.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Invalid wait duration {delay}")]
    InvalidDelay { delay: f64 },

    #[error("Flow '{flow}' woken by {wake} while {state}")]
    UnexpectedWake {
        flow: &'static str,
        wake: &'static str,
        state: &'static str,
    },

    #[error("Unknown resource pool {pool}")]
    UnknownPool { pool: PoolId },

    #[error("Grant is not held in {pool}")]
    UnknownGrant { pool: PoolId },

    #[error("Priority {priority} outside bounds [{min}, {max}] of {pool}")]
    PriorityOutOfBounds {
        pool: PoolId,
        priority: i32,
        min: i32,
        max: i32,
    },

    #[error("Phase error: {0}")]
    Phase(#[from] PhaseError),

    #[error("Statistics error: {0}")]
    Statistics(#[from] StatisticsError),
}

/// Where a flow stops until the scheduler resumes it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Suspend {
    /// Resume with [`Wake::Timer`] after this many hours; zero yields once
    Wait(f64),
    /// Resume with [`Wake::Timer`] at an absolute time, not before now
    WaitUntil(VirtualTime),
    /// Resume with [`Wake::Granted`] once the pool grants a unit
    Acquire { pool: PoolId, priority: i32 },
    /// The flow is finished
    Done,
}

/// Unit of cooperatively scheduled work over a shared world `W`.
pub trait Flow<W> {
    /// Advances the flow until its next suspension point.
    ///
    /// # Errors
    ///
    /// - `FlowError` - Flow cannot continue; only this flow is abandoned
    fn resume(&mut self, ctx: &mut FlowContext<'_, W>, wake: Wake) -> Result<Suspend, FlowError>;

    /// Returns name used in log messages.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Flow backed by a closure, see [`flow_fn`].
pub struct FnFlow<F> {
    name: &'static str,
    body: F,
}

/// Wraps a closure as a flow.
///
/// Useful for small flows whose state fits in captured variables.
pub fn flow_fn<W, F>(name: &'static str, body: F) -> FnFlow<F>
where
    F: FnMut(&mut FlowContext<'_, W>, Wake) -> Result<Suspend, FlowError>,
{
    FnFlow { name, body }
}

impl<W, F> Flow<W> for FnFlow<F>
where
    F: FnMut(&mut FlowContext<'_, W>, Wake) -> Result<Suspend, FlowError>,
{
    fn resume(&mut self, ctx: &mut FlowContext<'_, W>, wake: Wake) -> Result<Suspend, FlowError> {
        (self.body)(ctx, wake)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Access to the scheduler and world while a flow runs.
pub struct FlowContext<'a, W> {
    pub(crate) core: &'a mut SchedulerCore<W>,
    pub(crate) world: &'a mut W,
    pub(crate) current: FlowId,
}

impl<W> FlowContext<'_, W> {
    /// Returns current simulation time.
    pub fn now(&self) -> VirtualTime {
        self.core.now()
    }

    /// Returns identity of the running flow.
    pub fn flow_id(&self) -> FlowId {
        self.current
    }

    /// Returns the shared world.
    pub fn world(&mut self) -> &mut W {
        &mut *self.world
    }

    /// Returns read access to every pool.
    pub fn pools(&self) -> &ResourcePools {
        &self.core.pools
    }

    /// Returns pools and world together.
    pub fn parts(&mut self) -> (&ResourcePools, &mut W) {
        (&self.core.pools, &mut *self.world)
    }

    /// Registers a new flow and runs it until its first suspension point.
    pub fn spawn(&mut self, flow: impl Flow<W> + 'static) -> FlowId {
        let id = self.core.register_flow();
        drive(&mut *self.core, &mut *self.world, id, Box::new(flow), Wake::Start);
        id
    }

    /// Returns a held unit; newly granted waiters resume at the current
    /// time in grant order.
    ///
    /// # Errors
    ///
    /// - `FlowError::UnknownGrant` - Grant is not outstanding in its pool
    /// - `FlowError::UnknownPool` - Grant refers to a pool that does not exist
    pub fn release(&mut self, grant: Grant) -> Result<(), FlowError> {
        self.core.release(grant)
    }
}
