//! Deterministic discrete-event kernel.
//!
//! A single-threaded scheduler drives many cooperative flows over one virtual
//! clock. Flows suspend either for a duration or until a priority resource
//! pool grants them a unit; ties at the same instant resolve in registration
//! order, so a run is reproducible from its inputs alone.

mod clock;
mod events;
mod flow;
mod invariants;
mod resources;
mod scheduler;

// Re-export core types for public API
pub use clock::{SimulationClock, VirtualTime};
pub use events::{FlowId, Wake};
pub use flow::{Flow, FlowContext, FlowError, FnFlow, Suspend, flow_fn};
pub use invariants::{Invariant, InvariantViolation, PoolCapacityInvariant, WorkConservingInvariant};
pub use resources::{Grant, PoolId, PriorityResourcePool, ResourcePools};
pub use scheduler::{EventScheduler, RunSummary, SchedulerMetrics, SimulationError};

#[cfg(test)]
mod tests;
