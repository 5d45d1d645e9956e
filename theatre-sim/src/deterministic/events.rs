//! Scheduled wake-ups for suspended flows.

use std::cmp::Ordering;
use std::fmt;

use super::clock::VirtualTime;
use super::resources::Grant;

/// Identity of a flow registered with the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlowId(pub(crate) u64);

impl FlowId {
    /// Returns the registration number of the flow.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flow-{}", self.0)
    }
}

/// Reason a flow is resumed.
#[derive(Debug)]
pub enum Wake {
    /// First resumption right after spawning
    Start,
    /// A requested wait has elapsed
    Timer,
    /// A requested resource unit is now held by the flow
    Granted(Grant),
}

impl Wake {
    /// Returns short name for log messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Wake::Start => "start",
            Wake::Timer => "timer",
            Wake::Granted(_) => "granted",
        }
    }
}

/// Pending resumption of a flow at a point in virtual time.
///
/// Wake-ups at the same instant run in the order they were scheduled.
#[derive(Debug)]
pub(crate) struct Wakeup {
    pub(crate) at: VirtualTime,
    pub(crate) seq: u64,
    pub(crate) flow: FlowId,
    pub(crate) wake: Wake,
}

impl Eq for Wakeup {}

impl PartialEq for Wakeup {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Ord for Wakeup {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earlier time first, then registration order; reversed for min-heap
        self.at
            .cmp(&other.at)
            .then_with(|| self.seq.cmp(&other.seq))
            .reverse()
    }
}

impl PartialOrd for Wakeup {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
