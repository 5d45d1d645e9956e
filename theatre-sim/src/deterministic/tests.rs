use proptest::prelude::*;
use theatre_core::config::PriorityBounds;
use tracing_test::traced_test;

use super::*;

/// Shared world for kernel tests: (event, flow label, hours).
type Log = Vec<(&'static str, &'static str, f64)>;

enum HolderState {
    Arriving,
    Requesting,
    Holding(Grant),
    Finished,
}

/// Arrives after a delay, holds one unit of a pool, then releases it.
struct Holder {
    label: &'static str,
    pool: PoolId,
    priority: i32,
    arrival: f64,
    hold: f64,
    state: HolderState,
}

impl Holder {
    fn new(label: &'static str, pool: PoolId, priority: i32, arrival: f64, hold: f64) -> Self {
        Self {
            label,
            pool,
            priority,
            arrival,
            hold,
            state: HolderState::Arriving,
        }
    }
}

impl Flow<Log> for Holder {
    fn resume(&mut self, ctx: &mut FlowContext<'_, Log>, wake: Wake) -> Result<Suspend, FlowError> {
        let state = std::mem::replace(&mut self.state, HolderState::Finished);
        match (state, wake) {
            (HolderState::Arriving, Wake::Start) => {
                self.state = HolderState::Requesting;
                Ok(Suspend::Wait(self.arrival))
            }
            (HolderState::Requesting, Wake::Timer) => {
                self.state = HolderState::Requesting;
                Ok(Suspend::Acquire {
                    pool: self.pool,
                    priority: self.priority,
                })
            }
            (HolderState::Requesting, Wake::Granted(grant)) => {
                let now = ctx.now().hours();
                ctx.world().push(("granted", self.label, now));
                self.state = HolderState::Holding(grant);
                Ok(Suspend::Wait(self.hold))
            }
            (HolderState::Holding(grant), Wake::Timer) => {
                ctx.release(grant)?;
                let now = ctx.now().hours();
                ctx.world().push(("released", self.label, now));
                Ok(Suspend::Done)
            }
            (_, wake) => Err(FlowError::UnexpectedWake {
                flow: "holder",
                wake: wake.as_str(),
                state: "in an unexpected state",
            }),
        }
    }
}

fn scheduler_with_pool(capacity: usize) -> (EventScheduler<Log>, PoolId) {
    let mut scheduler = EventScheduler::new(Log::new());
    let pool = scheduler
        .add_pool(capacity, PriorityBounds::default())
        .unwrap();
    scheduler.add_invariant(Box::new(PoolCapacityInvariant));
    scheduler.add_invariant(Box::new(WorkConservingInvariant));
    (scheduler, pool)
}

fn until(hours: f64) -> VirtualTime {
    VirtualTime::from_hours(hours)
}

fn grants(log: &Log) -> Vec<(&'static str, f64)> {
    log.iter()
        .filter(|(event, _, _)| *event == "granted")
        .map(|(_, label, at)| (*label, *at))
        .collect()
}

#[test]
fn test_same_time_wakeups_follow_registration_order() {
    let mut scheduler = EventScheduler::new(Log::new());
    for label in ["a", "b", "c"] {
        let mut waited = false;
        scheduler.spawn(flow_fn(label, move |ctx: &mut FlowContext<'_, Log>, _wake| {
            if waited {
                let now = ctx.now().hours();
                ctx.world().push(("woke", label, now));
                return Ok(Suspend::Done);
            }
            waited = true;
            Ok(Suspend::Wait(1.0))
        }));
    }

    scheduler.advance_until(until(1.0)).unwrap();

    let labels: Vec<&str> = scheduler.world().iter().map(|(_, l, _)| *l).collect();
    assert_eq!(labels, vec!["a", "b", "c"]);
}

#[test]
fn test_zero_wait_yields_without_advancing_time() {
    let mut scheduler = EventScheduler::new(Log::new());
    let mut yielded = false;
    scheduler.spawn(flow_fn("yielder", move |ctx: &mut FlowContext<'_, Log>, _wake| {
        if yielded {
            let now = ctx.now().hours();
            ctx.world().push(("resumed", "yielder", now));
            return Ok(Suspend::Done);
        }
        yielded = true;
        Ok(Suspend::Wait(0.0))
    }));
    scheduler.spawn(flow_fn("eager", |ctx: &mut FlowContext<'_, Log>, _wake| {
        let now = ctx.now().hours();
        ctx.world().push(("ran", "eager", now));
        Ok(Suspend::Done)
    }));

    scheduler.advance_until(until(0.0)).unwrap();

    assert_eq!(
        scheduler.world(),
        &vec![("ran", "eager", 0.0), ("resumed", "yielder", 0.0)]
    );
}

#[test]
fn test_spawn_runs_until_first_suspension() {
    let mut scheduler = EventScheduler::new(Log::new());
    scheduler.spawn(flow_fn("starter", |ctx: &mut FlowContext<'_, Log>, wake| {
        if matches!(wake, Wake::Start) {
            ctx.world().push(("started", "starter", 0.0));
            return Ok(Suspend::Wait(10.0));
        }
        Ok(Suspend::Done)
    }));

    assert_eq!(scheduler.world().len(), 1);
    assert_eq!(scheduler.suspended_flows(), 1);
    assert_eq!(scheduler.next_event_time(), Some(until(10.0)));
}

#[test]
fn test_spawn_from_inside_a_flow() {
    let mut scheduler = EventScheduler::new(Log::new());
    scheduler.spawn(flow_fn("parent", |ctx: &mut FlowContext<'_, Log>, _wake| {
        ctx.world().push(("before", "parent", 0.0));
        ctx.spawn(flow_fn("child", |ctx: &mut FlowContext<'_, Log>, _wake| {
            ctx.world().push(("ran", "child", 0.0));
            Ok(Suspend::Done)
        }));
        ctx.world().push(("after", "parent", 0.0));
        Ok(Suspend::Done)
    }));

    let order: Vec<&str> = scheduler.world().iter().map(|(e, _, _)| *e).collect();
    assert_eq!(order, vec!["before", "ran", "after"]);
    assert_eq!(scheduler.metrics().flows_completed, 2);
}

#[test]
fn test_urgent_waiter_granted_first() {
    let (mut scheduler, pool) = scheduler_with_pool(1);
    scheduler.spawn(Holder::new("holder", pool, 3, 0.0, 2.0));
    scheduler.spawn(Holder::new("routine", pool, 5, 0.5, 1.0));
    scheduler.spawn(Holder::new("urgent", pool, 1, 1.0, 1.0));

    scheduler.advance_until(until(10.0)).unwrap();

    assert_eq!(
        grants(scheduler.world()),
        vec![("holder", 0.0), ("urgent", 2.0), ("routine", 3.0)]
    );
}

#[test]
fn test_equal_priority_is_fifo() {
    let (mut scheduler, pool) = scheduler_with_pool(1);
    scheduler.spawn(Holder::new("first", pool, 2, 0.0, 1.0));
    scheduler.spawn(Holder::new("second", pool, 2, 0.2, 1.0));
    scheduler.spawn(Holder::new("third", pool, 2, 0.1, 1.0));

    scheduler.advance_until(until(10.0)).unwrap();

    assert_eq!(
        grants(scheduler.world()),
        vec![("first", 0.0), ("third", 1.0), ("second", 2.0)]
    );
}

#[test]
fn test_immediate_grant_skips_queue_when_idle() {
    let (mut scheduler, pool) = scheduler_with_pool(2);
    scheduler.spawn(Holder::new("a", pool, 5, 0.0, 5.0));
    scheduler.spawn(Holder::new("b", pool, 5, 1.0, 5.0));

    scheduler.advance_until(until(1.0)).unwrap();

    assert_eq!(grants(scheduler.world()), vec![("a", 0.0), ("b", 1.0)]);
    assert_eq!(scheduler.pool(pool).unwrap().in_use(), 2);
}

#[traced_test]
#[test]
fn test_failed_flow_is_isolated_and_releases_units() {
    let (mut scheduler, pool) = scheduler_with_pool(1);
    let mut held: Option<Grant> = None;
    scheduler.spawn(flow_fn("faulty", move |_ctx: &mut FlowContext<'_, Log>, wake| {
        match wake {
            Wake::Start => Ok(Suspend::Acquire { pool, priority: 1 }),
            Wake::Granted(grant) => {
                held = Some(grant);
                Ok(Suspend::Wait(1.0))
            }
            Wake::Timer => Err(FlowError::UnexpectedWake {
                flow: "faulty",
                wake: "timer",
                state: if held.is_some() { "holding a unit" } else { "idle" },
            }),
        }
    }));
    scheduler.spawn(Holder::new("survivor", pool, 1, 0.5, 1.0));

    let summary = scheduler.advance_until(until(5.0)).unwrap();

    assert_eq!(summary.failed_flows, 1);
    assert_eq!(grants(scheduler.world()), vec![("survivor", 1.0)]);
    assert_eq!(scheduler.pool(pool).unwrap().in_use(), 0);
    assert!(scheduler.metrics().invariant_violations.is_empty());
    assert!(logs_contain("Flow failed and was abandoned"));
}

#[test]
fn test_negative_wait_fails_only_that_flow() {
    let mut scheduler = EventScheduler::new(Log::new());
    scheduler.spawn(flow_fn("broken", |_ctx: &mut FlowContext<'_, Log>, _wake| {
        Ok(Suspend::Wait(-1.0))
    }));
    scheduler.spawn(flow_fn("nan", |_ctx: &mut FlowContext<'_, Log>, _wake| {
        Ok(Suspend::Wait(f64::NAN))
    }));
    let mut waited = false;
    scheduler.spawn(flow_fn("healthy", move |ctx: &mut FlowContext<'_, Log>, _wake| {
        if waited {
            ctx.world().push(("done", "healthy", 2.0));
            return Ok(Suspend::Done);
        }
        waited = true;
        Ok(Suspend::Wait(2.0))
    }));

    let summary = scheduler.advance_until(until(3.0)).unwrap();

    assert_eq!(summary.failed_flows, 2);
    assert_eq!(scheduler.world().len(), 1);
}

#[test]
fn test_unknown_pool_fails_flow() {
    let (mut other, _) = scheduler_with_pool(1);
    let foreign = other.add_pool(1, PriorityBounds::default()).unwrap();

    let (mut scheduler, _) = scheduler_with_pool(1);
    scheduler.spawn(flow_fn("lost", move |_ctx: &mut FlowContext<'_, Log>, _wake| {
        Ok(Suspend::Acquire {
            pool: foreign,
            priority: 1,
        })
    }));

    assert_eq!(scheduler.metrics().failed_flows, 1);
}

#[test]
fn test_advance_until_is_inclusive_and_sets_clock() {
    let mut scheduler = EventScheduler::new(Log::new());
    let mut waited = false;
    scheduler.spawn(flow_fn("timer", move |ctx: &mut FlowContext<'_, Log>, _wake| {
        if waited {
            let now = ctx.now().hours();
            ctx.world().push(("fired", "timer", now));
            return Ok(Suspend::Done);
        }
        waited = true;
        Ok(Suspend::Wait(5.0))
    }));

    let summary = scheduler.advance_until(until(4.5)).unwrap();
    assert_eq!(summary.events_processed, 0);
    assert_eq!(summary.now, until(4.5));
    assert!(scheduler.world().is_empty());

    let summary = scheduler.advance_until(until(5.0)).unwrap();
    assert_eq!(summary.events_processed, 1);
    assert_eq!(scheduler.world(), &vec![("fired", "timer", 5.0)]);
    assert_eq!(summary.suspended_flows, 0);
}

#[test]
fn test_wait_until_resumes_at_the_exact_instant() {
    let target = until(0.1 + 0.2);
    let mut scheduler = EventScheduler::new(Log::new());
    let mut waited = false;
    scheduler.spawn(flow_fn("absolute", move |ctx: &mut FlowContext<'_, Log>, _wake| {
        if waited {
            let now = ctx.now().hours();
            ctx.world().push(("fired", "absolute", now));
            return Ok(Suspend::Done);
        }
        waited = true;
        Ok(Suspend::WaitUntil(target))
    }));

    scheduler.advance_until(target).unwrap();

    assert_eq!(scheduler.world(), &vec![("fired", "absolute", target.hours())]);
}

#[test]
fn test_wait_until_in_the_past_fails_flow() {
    let mut scheduler = EventScheduler::new(Log::new());
    scheduler.advance_until(until(2.0)).unwrap();
    scheduler.spawn(flow_fn("late", |_ctx: &mut FlowContext<'_, Log>, _wake| {
        Ok(Suspend::WaitUntil(until(1.0)))
    }));

    assert_eq!(scheduler.metrics().failed_flows, 1);
    assert_eq!(scheduler.suspended_flows(), 0);
}

#[test]
fn test_run_backwards_rejected() {
    let mut scheduler = EventScheduler::new(Log::new());
    scheduler.advance_until(until(3.0)).unwrap();

    let result = scheduler.advance_until(until(2.0));
    assert!(matches!(
        result,
        Err(SimulationError::InvalidRunLength { .. })
    ));

    let result = scheduler.advance_until(until(f64::NAN));
    assert!(result.is_err());
}

#[test]
fn test_in_flight_flows_remain_suspended() {
    let (mut scheduler, pool) = scheduler_with_pool(1);
    scheduler.spawn(Holder::new("long", pool, 1, 0.0, 100.0));
    scheduler.spawn(Holder::new("queued", pool, 1, 0.0, 1.0));

    let summary = scheduler.advance_until(until(10.0)).unwrap();

    assert_eq!(summary.suspended_flows, 2);
    assert_eq!(summary.pending_events, 1);
    assert_eq!(scheduler.pool(pool).unwrap().queue_len(), 1);
}

#[test]
fn test_simulation_reproducibility() {
    fn run() -> Log {
        let (mut scheduler, pool) = scheduler_with_pool(2);
        let arrivals = [(0.0, 3), (0.0, 1), (0.5, 2), (0.5, 2), (1.0, 0), (1.5, 4)];
        for (index, (arrival, priority)) in arrivals.into_iter().enumerate() {
            let label = ["p0", "p1", "p2", "p3", "p4", "p5"][index];
            scheduler.spawn(Holder::new(label, pool, priority, arrival, 1.25));
        }
        scheduler.advance_until(until(20.0)).unwrap();
        scheduler.into_world()
    }

    assert_eq!(run(), run());
}

proptest! {
    #[test]
    fn test_pools_never_exceed_capacity(
        capacity in 1usize..4,
        flows in prop::collection::vec((0.0f64..10.0, 0i32..5, 0.0f64..5.0), 1..40),
    ) {
        let (mut scheduler, pool) = scheduler_with_pool(capacity);
        for (arrival, priority, hold) in &flows {
            scheduler.spawn(Holder::new("p", pool, *priority, *arrival, *hold));
        }

        let summary = scheduler.advance_until(until(1_000.0)).unwrap();

        prop_assert!(scheduler.metrics().invariant_violations.is_empty());
        prop_assert_eq!(summary.failed_flows, 0);
        prop_assert_eq!(summary.suspended_flows, 0);
        prop_assert_eq!(grants(scheduler.world()).len(), flows.len());
        prop_assert_eq!(scheduler.pool(pool).unwrap().in_use(), 0);
    }
}
