//! Independent random streams and service-time distributions.
//!
//! Every logical source of randomness owns a dedicated stream derived from the
//! run seed, so changing the parameters of one distribution never perturbs the
//! sequence drawn by another.

mod distribution;
mod streams;

pub use distribution::{DistributionError, DistributionSampler, ServiceDistribution};
pub use streams::{RandomStream, RandomStreamFactory, StreamKind};
