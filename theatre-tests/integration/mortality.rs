//! Mortality races during preparation and operation.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use theatre_core::{PatientCondition, TheatreConfig};
use theatre_sim::{PatientId, PatientRecord, Phase, SurgeryFacility, VirtualTime};

type Histories = HashMap<PatientId, Vec<Phase>>;

fn run_with_mortality(rate: f64) -> Histories {
    let mut config = TheatreConfig::for_testing();
    config.patients.conditions = BTreeMap::from([(
        "CRITICAL".to_string(),
        PatientCondition {
            priority: 0,
            arrival_portion: 1.0,
            mortality_rate: rate,
            service_multipliers: [1.0, 1.0, 1.0],
        },
    )]);

    let histories: Rc<RefCell<Histories>> = Rc::default();
    let sink = Rc::clone(&histories);
    let mut facility = SurgeryFacility::new(config).unwrap();
    facility.add_observer(move |phase: Phase, patient: &PatientRecord, _at: VirtualTime| {
        sink.borrow_mut().entry(patient.id()).or_default().push(phase);
    });
    facility.run_for(500.0).unwrap();

    let histories = histories.borrow().clone();
    histories
}

#[test]
fn test_deaths_only_interrupt_preparation_or_operation() {
    let histories = run_with_mortality(5.0);

    let deceased: Vec<&Vec<Phase>> = histories
        .values()
        .filter(|history| history.last() == Some(&Phase::Deceased))
        .collect();
    assert!(!deceased.is_empty());

    for history in deceased {
        let before = history[history.len() - 2];
        assert!(
            matches!(before, Phase::InPreparation | Phase::InOperation),
            "died after {before:?}: {history:?}"
        );
        assert!(!history.contains(&Phase::Recovered));
    }
}

#[test]
fn test_histories_follow_allowed_transitions() {
    let histories = run_with_mortality(5.0);

    for history in histories.values() {
        assert_eq!(history[0], Phase::Waiting);
        for pair in history.windows(2) {
            assert!(pair[0].allows(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }
}

#[test]
fn test_zero_mortality_never_kills() {
    let histories = run_with_mortality(0.0);

    assert!(!histories.is_empty());
    assert!(
        histories
            .values()
            .all(|history| !history.contains(&Phase::Deceased))
    );
    assert!(
        histories
            .values()
            .any(|history| history.last() == Some(&Phase::Recovered))
    );
}
