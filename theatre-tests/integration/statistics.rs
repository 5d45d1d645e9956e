//! Statistics wiring between the facility and the aggregator.

use theatre_core::{ConfidenceLevel, MetricSpec, StatisticsAggregator, TheatreConfig};
use theatre_sim::SurgeryFacility;

#[test]
fn test_updates_outside_windows_are_dropped() {
    let mut statistics = StatisticsAggregator::new();
    let queue = statistics
        .register("queue", MetricSpec::mean("Queue length", "queue"))
        .unwrap();

    statistics.update(queue, 4.0).unwrap();
    statistics.start_sample();
    statistics.update(queue, 2.0).unwrap();
    statistics.update(queue, 6.0).unwrap();
    statistics.end_sample();
    statistics.update(queue, 100.0).unwrap();

    assert_eq!(statistics.dropped_updates(), 2);
    assert_eq!(statistics.values(queue), vec![4.0]);
    assert_eq!(statistics.mean(queue), 4.0);
}

#[test]
fn test_statistics_accumulate_across_runs() {
    let mut facility = SurgeryFacility::new(TheatreConfig::for_testing()).unwrap();
    facility.run().unwrap();
    facility.run().unwrap();

    let statistics = facility.statistics();
    assert_eq!(statistics.slot_count(), 6);
    assert_eq!(facility.replications().len(), 2);
    assert_eq!(facility.report().replications.len(), 2);
}

#[test]
fn test_counter_slots_sum_to_generated_patients_in_windows() {
    let mut facility = SurgeryFacility::new(TheatreConfig::for_testing()).unwrap();
    let report = facility.run().unwrap();

    let total = report.metric("total-number-of-patients").unwrap();
    let in_windows: f64 = total.slots.iter().sum();
    assert!(in_windows > 0.0);
    assert!(in_windows <= report.replications[0].patients_generated as f64);
}

#[test]
fn test_reported_interval_matches_aggregator() {
    let mut config = TheatreConfig::for_testing();
    config.sampling.count = 5;
    let mut facility = SurgeryFacility::new(config).unwrap();
    let report = facility.run().unwrap();

    let statistics = facility.statistics();
    let handle = statistics.handle("usage-of-operation-unit").unwrap();
    let summary = report.metric("usage-of-operation-unit").unwrap();

    assert_eq!(summary.mean, statistics.mean(handle));
    assert_eq!(
        summary.half_width_95,
        statistics.confidence_interval(handle, ConfidenceLevel::P95)
    );
    assert!(summary.half_width_95 >= 0.0);
}

#[test]
fn test_condition_portion_metric_per_condition() {
    let facility = SurgeryFacility::new(TheatreConfig::for_testing()).unwrap();

    for (_, name, _) in facility.catalog().iter() {
        let metric = format!("patient-portion-{name}");
        assert!(facility.statistics().handle(&metric).is_ok(), "{metric}");
    }
}
