//! Reproducibility of whole runs from a seed.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use theatre_core::TheatreConfig;
use theatre_sim::{FacilityReport, PatientId, PatientRecord, Phase, SurgeryFacility, VirtualTime};

type Trace = Vec<(PatientId, Phase, VirtualTime)>;

fn traced_run(seed: u64) -> (FacilityReport, Trace) {
    let mut config = TheatreConfig::for_testing();
    config.run.seed = seed;

    let trace = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&trace);
    let mut facility = SurgeryFacility::new(config).unwrap();
    facility.add_observer(move |phase: Phase, patient: &PatientRecord, at: VirtualTime| {
        sink.borrow_mut().push((patient.id(), phase, at));
    });
    let report = facility.run().unwrap();

    let trace = trace.borrow().clone();
    (report, trace)
}

fn slot_bits(report: &FacilityReport) -> Vec<Vec<u64>> {
    report
        .metrics
        .iter()
        .map(|metric| metric.slots.iter().map(|value| value.to_bits()).collect())
        .collect()
}

#[test]
fn test_same_seed_reproduces_every_transition() {
    let (first_report, first_trace) = traced_run(3);
    let (second_report, second_trace) = traced_run(3);

    assert!(!first_trace.is_empty());
    assert_eq!(first_trace, second_trace);
    assert_eq!(first_report.replications, second_report.replications);
    assert_eq!(slot_bits(&first_report), slot_bits(&second_report));
}

#[test]
fn test_different_seeds_diverge() {
    let (_, first) = traced_run(3);
    let (_, second) = traced_run(4);

    assert_ne!(first, second);
}

#[test]
fn test_replication_matches_standalone_run_with_its_seed() {
    let mut config = TheatreConfig::for_testing();
    config.run.seed = 10;
    config.run.runs = 2;
    let combined = SurgeryFacility::new(config).unwrap().run().unwrap();

    let (alone, _) = traced_run(11);

    let second = &combined.replications[1];
    let single = &alone.replications[0];
    assert_eq!(second.seed, 11);
    assert_eq!(second.patients_generated, single.patients_generated);
    assert_eq!(second.patients_recovered, single.patients_recovered);
    assert_eq!(second.events_processed, single.events_processed);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_seeded_runs_are_pure(seed in any::<u64>()) {
        let (first, _) = traced_run(seed);
        let (second, _) = traced_run(seed);
        prop_assert_eq!(first.replications, second.replications);
    }
}
