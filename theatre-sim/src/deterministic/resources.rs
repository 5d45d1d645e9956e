//! Capacity-limited resource pools with priority-ordered waiters.

use std::collections::BTreeMap;
use std::fmt;

use theatre_core::config::PriorityBounds;

use super::events::FlowId;
use super::flow::FlowError;
use super::scheduler::SimulationError;

/// Identity of a pool registered with the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PoolId(usize);

impl PoolId {
    /// Returns registration index of the pool.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool-{}", self.0)
    }
}

/// Proof that a flow holds one unit of a pool.
///
/// Grants cannot be cloned; handing one back through release is the only way
/// to return the unit.
#[derive(Debug, PartialEq, Eq)]
pub struct Grant {
    pool: PoolId,
    id: u64,
}

impl Grant {
    /// Returns pool this unit belongs to.
    pub fn pool(&self) -> PoolId {
        self.pool
    }
}

/// Result of a pool request.
#[derive(Debug)]
pub(crate) enum RequestOutcome {
    Granted(Grant),
    Queued,
}

/// Capacity-limited pool granting units by priority, FIFO within a priority.
///
/// Lower priority values are more urgent. A request is granted immediately
/// only when a unit is idle and no queued waiter is at least as urgent.
#[derive(Debug)]
pub struct PriorityResourcePool {
    id: PoolId,
    capacity: usize,
    bounds: PriorityBounds,
    /// Outstanding grant id -> holding flow
    holders: BTreeMap<u64, FlowId>,
    /// (priority, request order) -> waiting flow
    waiters: BTreeMap<(i32, u64), FlowId>,
    next_grant: u64,
    next_request: u64,
    total_grants: u64,
}

impl PriorityResourcePool {
    fn new(id: PoolId, capacity: usize, bounds: PriorityBounds) -> Result<Self, SimulationError> {
        if capacity == 0 {
            return Err(SimulationError::InvalidPool {
                reason: format!("{id} capacity must be positive"),
            });
        }
        if bounds.min > bounds.max {
            return Err(SimulationError::InvalidPool {
                reason: format!(
                    "{id} priority bounds are inverted: [{}, {}]",
                    bounds.min, bounds.max
                ),
            });
        }

        Ok(Self {
            id,
            capacity,
            bounds,
            holders: BTreeMap::new(),
            waiters: BTreeMap::new(),
            next_grant: 0,
            next_request: 0,
            total_grants: 0,
        })
    }

    /// Returns identity of this pool.
    pub fn id(&self) -> PoolId {
        self.id
    }

    /// Returns fixed number of units.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns number of units currently held.
    pub fn in_use(&self) -> usize {
        self.holders.len()
    }

    /// Returns number of idle units.
    pub fn idle(&self) -> usize {
        self.capacity - self.in_use()
    }

    /// Returns number of queued requests.
    pub fn queue_len(&self) -> usize {
        self.waiters.len()
    }

    /// Returns whether every unit is held.
    pub fn is_saturated(&self) -> bool {
        self.in_use() >= self.capacity
    }

    /// Returns accepted priority range.
    pub fn priority_bounds(&self) -> PriorityBounds {
        self.bounds
    }

    /// Returns number of grants issued so far.
    pub fn total_grants(&self) -> u64 {
        self.total_grants
    }

    pub(crate) fn request(
        &mut self,
        flow: FlowId,
        priority: i32,
    ) -> Result<RequestOutcome, FlowError> {
        if !self.bounds.contains(priority) {
            return Err(FlowError::PriorityOutOfBounds {
                pool: self.id,
                priority,
                min: self.bounds.min,
                max: self.bounds.max,
            });
        }

        let outranked = self
            .waiters
            .keys()
            .next()
            .is_some_and(|(queued, _)| *queued <= priority);

        if self.in_use() < self.capacity && !outranked {
            return Ok(RequestOutcome::Granted(self.issue(flow)));
        }

        let order = self.next_request;
        self.next_request += 1;
        self.waiters.insert((priority, order), flow);
        Ok(RequestOutcome::Queued)
    }

    /// Returns a unit and grants idle units to the most urgent waiters.
    pub(crate) fn release(&mut self, grant: Grant) -> Result<Vec<(FlowId, Grant)>, FlowError> {
        if grant.pool != self.id || self.holders.remove(&grant.id).is_none() {
            return Err(FlowError::UnknownGrant { pool: grant.pool });
        }
        Ok(self.grant_waiters())
    }

    /// Returns every unit held by `flow` and grants freed units.
    pub(crate) fn release_held_by(&mut self, flow: FlowId) -> Vec<(FlowId, Grant)> {
        let before = self.holders.len();
        self.holders.retain(|_, holder| *holder != flow);
        self.waiters.retain(|_, waiter| *waiter != flow);
        if self.holders.len() == before {
            return Vec::new();
        }
        self.grant_waiters()
    }

    fn grant_waiters(&mut self) -> Vec<(FlowId, Grant)> {
        let mut granted = Vec::new();
        while self.in_use() < self.capacity {
            let Some((_, flow)) = self.waiters.pop_first() else {
                break;
            };
            granted.push((flow, self.issue(flow)));
        }
        granted
    }

    fn issue(&mut self, flow: FlowId) -> Grant {
        let id = self.next_grant;
        self.next_grant += 1;
        self.total_grants += 1;
        self.holders.insert(id, flow);
        Grant { pool: self.id, id }
    }
}

/// All pools of one scheduler.
#[derive(Debug, Default)]
pub struct ResourcePools {
    pools: Vec<PriorityResourcePool>,
}

impl ResourcePools {
    /// Creates empty pool set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new pool.
    ///
    /// # Errors
    ///
    /// - `SimulationError::InvalidPool` - Zero capacity or inverted bounds
    pub fn add(
        &mut self,
        capacity: usize,
        bounds: PriorityBounds,
    ) -> Result<PoolId, SimulationError> {
        let id = PoolId(self.pools.len());
        self.pools
            .push(PriorityResourcePool::new(id, capacity, bounds)?);
        Ok(id)
    }

    /// Looks up pool by id.
    pub fn get(&self, id: PoolId) -> Option<&PriorityResourcePool> {
        self.pools.get(id.0)
    }

    /// Iterates pools in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &PriorityResourcePool> {
        self.pools.iter()
    }

    /// Returns number of pools.
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Returns whether no pool is registered.
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub(crate) fn request(
        &mut self,
        pool: PoolId,
        flow: FlowId,
        priority: i32,
    ) -> Result<RequestOutcome, FlowError> {
        self.pools
            .get_mut(pool.0)
            .ok_or(FlowError::UnknownPool { pool })?
            .request(flow, priority)
    }

    pub(crate) fn release(&mut self, grant: Grant) -> Result<Vec<(FlowId, Grant)>, FlowError> {
        let pool = grant.pool;
        self.pools
            .get_mut(pool.0)
            .ok_or(FlowError::UnknownPool { pool })?
            .release(grant)
    }

    pub(crate) fn release_held_by(&mut self, flow: FlowId) -> Vec<(FlowId, Grant)> {
        self.pools
            .iter_mut()
            .flat_map(|pool| pool.release_held_by(flow))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(capacity: usize) -> PriorityResourcePool {
        PriorityResourcePool::new(PoolId(0), capacity, PriorityBounds::default()).unwrap()
    }

    fn granted(outcome: RequestOutcome) -> Grant {
        match outcome {
            RequestOutcome::Granted(grant) => grant,
            RequestOutcome::Queued => panic!("expected immediate grant"),
        }
    }

    #[test]
    fn test_immediate_grant_while_idle() {
        let mut pool = pool(2);
        granted(pool.request(FlowId(0), 5).unwrap());
        granted(pool.request(FlowId(1), 5).unwrap());

        assert_eq!(pool.in_use(), 2);
        assert!(pool.is_saturated());
        assert!(matches!(
            pool.request(FlowId(2), 1).unwrap(),
            RequestOutcome::Queued
        ));
        assert_eq!(pool.queue_len(), 1);
    }

    #[test]
    fn test_release_prefers_urgent_then_fifo() {
        let mut pool = pool(1);
        let held = granted(pool.request(FlowId(0), 3).unwrap());
        pool.request(FlowId(1), 5).unwrap();
        pool.request(FlowId(2), 1).unwrap();
        pool.request(FlowId(3), 1).unwrap();

        let woken = pool.release(held).unwrap();
        assert_eq!(woken.len(), 1);
        assert_eq!(woken[0].0, FlowId(2));

        let woken = pool.release(woken.into_iter().next().unwrap().1).unwrap();
        assert_eq!(woken[0].0, FlowId(3));

        let woken = pool.release(woken.into_iter().next().unwrap().1).unwrap();
        assert_eq!(woken[0].0, FlowId(1));
        assert_eq!(pool.in_use(), 1);
        assert_eq!(pool.queue_len(), 0);
    }

    #[test]
    fn test_priority_outside_bounds_rejected() {
        let mut pool = pool(1);
        let result = pool.request(FlowId(0), 101);
        assert!(matches!(
            result,
            Err(FlowError::PriorityOutOfBounds { priority: 101, .. })
        ));
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_foreign_grant_rejected() {
        let mut first = pool(1);
        let mut second = PriorityResourcePool::new(PoolId(1), 1, PriorityBounds::default()).unwrap();
        let grant = granted(second.request(FlowId(0), 1).unwrap());

        assert!(matches!(
            first.release(grant),
            Err(FlowError::UnknownGrant { .. })
        ));
        assert_eq!(second.in_use(), 1);
    }

    #[test]
    fn test_release_held_by_frees_units() {
        let mut pool = pool(2);
        let _a = granted(pool.request(FlowId(7), 1).unwrap());
        let _b = granted(pool.request(FlowId(7), 1).unwrap());
        pool.request(FlowId(8), 1).unwrap();

        let woken = pool.release_held_by(FlowId(7));
        assert_eq!(woken.len(), 1);
        assert_eq!(woken[0].0, FlowId(8));
        assert_eq!(pool.in_use(), 1);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = PriorityResourcePool::new(PoolId(0), 0, PriorityBounds::default());
        assert!(matches!(result, Err(SimulationError::InvalidPool { .. })));
    }
}
