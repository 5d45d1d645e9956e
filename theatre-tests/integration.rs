//! Integration tests for Theatre
//!
//! These tests drive the public facility and kernel APIs the way the CLI does
//! and check cross-module behavior: patient routing, priority ordering,
//! mortality races, statistics wiring and reproducibility.

#[path = "integration/determinism.rs"]
mod determinism;
#[path = "integration/end_to_end.rs"]
mod end_to_end;
#[path = "integration/mortality.rs"]
mod mortality;
#[path = "integration/priority.rs"]
mod priority;
#[path = "integration/statistics.rs"]
mod statistics;
