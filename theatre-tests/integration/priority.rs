//! Priority ordering at contended stations.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use theatre_core::config::PriorityBounds;
use theatre_core::{PatientCondition, ServiceDistribution, TheatreConfig};
use theatre_sim::{
    EventScheduler, FlowContext, PatientRecord, Phase, Suspend, SurgeryFacility, VirtualTime, Wake,
    flow_fn,
};

type Served = Vec<i32>;

#[test]
fn test_waiters_served_most_urgent_first() {
    let mut scheduler = EventScheduler::new(Served::new());
    let pool = scheduler.add_pool(1, PriorityBounds::default()).unwrap();

    let mut held = None;
    scheduler.spawn(flow_fn("holder", move |ctx: &mut FlowContext<'_, Served>, wake| {
        match wake {
            Wake::Start => Ok(Suspend::Acquire { pool, priority: 0 }),
            Wake::Granted(grant) => {
                held = Some(grant);
                Ok(Suspend::Wait(1.0))
            }
            Wake::Timer => {
                if let Some(grant) = held.take() {
                    ctx.release(grant)?;
                }
                Ok(Suspend::Done)
            }
        }
    }));

    for priority in [5, 1, 3, 1] {
        scheduler.spawn(flow_fn("waiter", move |ctx: &mut FlowContext<'_, Served>, wake| {
            match wake {
                Wake::Start => Ok(Suspend::Acquire { pool, priority }),
                Wake::Granted(grant) => {
                    ctx.world().push(priority);
                    ctx.release(grant)?;
                    Ok(Suspend::Done)
                }
                Wake::Timer => Ok(Suspend::Done),
            }
        }));
    }

    assert_eq!(scheduler.pool(pool).unwrap().queue_len(), 4);
    scheduler.advance_until(VirtualTime::from_hours(2.0)).unwrap();

    assert_eq!(scheduler.world(), &vec![1, 1, 3, 5]);
    assert_eq!(scheduler.pool(pool).unwrap().in_use(), 0);
}

#[test]
fn test_urgent_patients_reach_congested_theatre_first() {
    let mut config = TheatreConfig::for_testing();
    config.facility.preparation_units = 100;
    config.facility.operation_units = 1;
    config.facility.recovery_units = 100;
    config.patients.arrival_interval = ServiceDistribution::Uniform { min: 0.5, max: 0.5 };
    config.patients.base_preparation_time = ServiceDistribution::Uniform { min: 0.1, max: 0.1 };
    config.patients.base_operation_time = ServiceDistribution::Uniform { min: 0.8, max: 0.8 };
    config.patients.base_recovery_time = ServiceDistribution::Uniform { min: 0.1, max: 0.1 };
    config.patients.conditions = BTreeMap::from([
        (
            "URGENT".to_string(),
            PatientCondition {
                priority: 0,
                arrival_portion: 0.5,
                mortality_rate: 0.0,
                service_multipliers: [1.0, 1.0, 1.0],
            },
        ),
        (
            "ROUTINE".to_string(),
            PatientCondition {
                priority: 10,
                arrival_portion: 0.5,
                mortality_rate: 0.0,
                service_multipliers: [1.0, 1.0, 1.0],
            },
        ),
    ]);

    let operated: Rc<RefCell<HashMap<i32, u64>>> = Rc::default();
    let sink = Rc::clone(&operated);
    let mut facility = SurgeryFacility::new(config).unwrap();
    facility.add_observer(move |phase: Phase, patient: &PatientRecord, _at: VirtualTime| {
        if phase == Phase::InOperation {
            *sink.borrow_mut().entry(patient.priority()).or_default() += 1;
        }
    });
    let summary = facility.run_for(100.0).unwrap();

    let operated = operated.borrow();
    let urgent = operated.get(&0).copied().unwrap_or(0);
    let routine = operated.get(&10).copied().unwrap_or(0);
    assert!(summary.abandoned_in_flight > 0);
    assert!(urgent > 2 * routine, "urgent {urgent}, routine {routine}");
}
