//! Theatre Simulation - Discrete-event model of a surgery facility.

#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]
//!
//! Patients arrive at stochastic intervals, queue for preparation, operation
//! and recovery units by priority, and race each service against their own
//! mortality deadline. Everything runs on a single-threaded virtual-time
//! scheduler, so a run is an exact function of its configuration and seed.
//!
//! # Example
//!
//! ```rust,no_run
//! use theatre_core::TheatreConfig;
//! use theatre_sim::SurgeryFacility;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut facility = SurgeryFacility::new(TheatreConfig::default())?;
//! let report = facility.run()?;
//!
//! for metric in &report.metrics {
//!     println!("{} {:.2} +- {:.2}", metric.title, metric.mean, metric.half_width_95);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Deterministic kernel**: virtual clock, wake-up heap, cooperative flows
//!   and priority resource pools
//! - **Patients**: records with a validated phase history
//! - **Phase sequencer**: per-patient flow through the station route
//! - **Generator**: arrival process drawing conditions and service times
//! - **Facility**: replications, sample windows and metric wiring

pub mod deterministic;
pub mod facility;
pub mod generator;
pub mod patient;
pub mod phases;

pub use deterministic::{
    EventScheduler, Flow, FlowContext, FlowError, FlowId, Grant, PoolId, PriorityResourcePool,
    ResourcePools, RunSummary, SimulationError, Suspend, VirtualTime, Wake, flow_fn,
};
pub use facility::{FacilityReport, ReplicationSummary, StatusObserver, SurgeryFacility};
pub use generator::{ConditionTable, PatientFactory, PatientGenerator};
pub use patient::{PatientId, PatientRecord, Phase, PhaseError, ServiceTimes};
pub use phases::{PatientFlow, PatientWorld, PhaseSequencer, Station, StationKind};
