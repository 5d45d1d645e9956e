//! End-to-end runs from configuration to report.

use std::fs;

use theatre_core::TheatreConfig;
use theatre_sim::{FacilityReport, SurgeryFacility};

const COUNTERS: [&str; 5] = [
    "number-of-prepared",
    "number-of-operated",
    "number-of-recovered",
    "number-of-deceased",
    "total-number-of-patients",
];

fn short_default_config() -> TheatreConfig {
    let mut config = TheatreConfig::default();
    config.sampling.count = 2;
    config.run.runs = 2;
    config
}

fn run(config: TheatreConfig) -> FacilityReport {
    SurgeryFacility::new(config)
        .expect("valid configuration")
        .run()
        .expect("run completes")
}

#[test]
fn test_default_configuration_runs_all_replications() {
    let config = short_default_config();
    let slots = config.sampling.count * config.run.runs as usize;
    let report = run(config);

    assert_eq!(report.replications.len(), 2);
    assert_eq!(report.failed_flows(), 0);
    for metric in &report.metrics {
        assert_eq!(metric.slots.len(), slots, "metric {}", metric.name);
    }
    for name in COUNTERS {
        assert!(report.metric(name).is_some(), "missing counter {name}");
    }
}

#[test]
fn test_patient_counts_balance_per_replication() {
    let report = run(short_default_config());

    for run in &report.replications {
        assert!(run.patients_generated > 0);
        assert_eq!(
            run.patients_generated,
            run.patients_recovered + run.patients_deceased + run.abandoned_in_flight
        );
        assert_eq!(run.invariant_violations, 0);
        assert_eq!(run.simulation_time, 1000.0 + 2.0 * 1000.0 + 1000.0);
    }
}

#[test]
fn test_percentage_series_stay_bounded() {
    let report = run(short_default_config());

    for name in ["usage-of-operation-unit", "rate-blocking-operations", "all-recovery-units-busy"] {
        let metric = report.metric(name).expect("metric registered");
        for value in metric.slots.iter().filter(|v| !v.is_nan()) {
            assert!((0.0..=100.0).contains(value), "{name} slot {value}");
        }
    }
}

#[test]
fn test_configuration_file_drives_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("theatre.toml");
    fs::write(
        &path,
        r#"
[facility]
operation-units = 2

[sampling]
warm-up = 20.0
interval = 5.0
duration = 40.0
count = 2
resolution = 2.0

[run]
seed = 9
runs = 1
"#,
    )
    .unwrap();

    let config = TheatreConfig::from_file(&path).unwrap();
    assert_eq!(config.facility.operation_units, 2);

    let report = run(config);
    assert_eq!(report.replications[0].seed, 9);
    assert_eq!(report.replications[0].simulation_time, 20.0 + 40.0 + 5.0 + 40.0);
    let usage = report.metric("usage-of-operation-unit").unwrap();
    assert_eq!(usage.slots.len(), 2);
}
