//! Text, CSV and JSON rendering of facility reports.

use theatre_core::MetricSummary;
use theatre_sim::FacilityReport;

/// Renders replication outcomes followed by one `title mean +- ci unit` line per metric.
pub fn render_text(report: &FacilityReport) -> String {
    let mut out = String::new();

    for run in &report.replications {
        out.push_str(&format!(
            "Run {} (seed {}, {:.1} h): generated {}, recovered {}, deceased {}, in flight {}\n",
            run.replication,
            run.seed,
            run.simulation_time,
            run.patients_generated,
            run.patients_recovered,
            run.patients_deceased,
            run.abandoned_in_flight
        ));
        if run.failed_flows > 0 {
            out.push_str(&format!("  {} flows failed\n", run.failed_flows));
        }
    }
    if !report.replications.is_empty() {
        out.push('\n');
    }

    let lines: Vec<String> = report.metrics.iter().map(text_line).collect();
    out.push_str(&lines.join("\n"));
    out
}

fn text_line(metric: &MetricSummary) -> String {
    format!(
        "{:80} {:6.2} +- {:.2} {}",
        metric.title, metric.mean, metric.half_width_95, metric.unit
    )
}

/// Renders per-slot values as a `SEP=;` table with one column per metric.
///
/// Numbers use `decimal_separator` in place of `.`. Metrics with fewer slots
/// leave trailing cells empty.
pub fn render_csv(report: &FacilityReport, decimal_separator: char) -> String {
    let header: Vec<String> = report
        .metrics
        .iter()
        .map(|metric| format!("{}({})", metric.short_title, metric.unit))
        .collect();

    let rows = report
        .metrics
        .iter()
        .map(|metric| metric.slots.len())
        .max()
        .unwrap_or(0);

    let separator = decimal_separator.to_string();
    let mut out = format!("SEP=;\n{}", header.join(";"));
    for row in 0..rows {
        let cells: Vec<String> = report
            .metrics
            .iter()
            .map(|metric| {
                metric
                    .slots
                    .get(row)
                    .map(|value| value.to_string().replace('.', &separator))
                    .unwrap_or_default()
            })
            .collect();
        out.push('\n');
        out.push_str(&cells.join(";"));
    }
    out
}

/// Renders the whole report as pretty-printed JSON.
///
/// # Errors
///
/// - `serde_json::Error` - Report could not be serialized
pub fn render_json(report: &FacilityReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use theatre_sim::ReplicationSummary;

    fn metric(name: &str, unit: &str, slots: Vec<f64>) -> MetricSummary {
        MetricSummary {
            name: name.to_string(),
            title: format!("Title of {name}"),
            short_title: name.to_string(),
            unit: unit.to_string(),
            mean: 2.0,
            variance: 1.0,
            half_width_95: 0.5,
            slots,
        }
    }

    fn report() -> FacilityReport {
        FacilityReport {
            replications: vec![ReplicationSummary {
                replication: 0,
                seed: 1,
                simulation_time: 160.0,
                patients_generated: 12,
                patients_recovered: 9,
                patients_deceased: 1,
                abandoned_in_flight: 2,
                failed_flows: 0,
                events_processed: 140,
                invariant_violations: 0,
            }],
            metrics: vec![
                metric("queue", "patients", vec![1.5, 2.5]),
                metric("usage", "%", vec![50.0]),
            ],
        }
    }

    #[test]
    fn test_text_aligns_titles() {
        let text = render_text(&report());
        let line = text.lines().find(|l| l.starts_with("Title of queue")).unwrap();

        assert_eq!(&line[80..], "   2.00 +- 0.50 patients");
        assert!(text.starts_with("Run 0 (seed 1, 160.0 h): generated 12"));
    }

    #[test]
    fn test_text_lists_failed_flows_under_their_run() {
        let mut report = report();
        report.replications[0].failed_flows = 3;
        let text = render_text(&report);
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].ends_with("in flight 2"));
        assert_eq!(lines[1], "  3 flows failed");
        assert_eq!(lines[2], "");
    }

    #[test]
    fn test_csv_uses_decimal_separator() {
        let csv = render_csv(&report(), ',');
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "SEP=;");
        assert_eq!(lines[1], "queue(patients);usage(%)");
        assert_eq!(lines[2], "1,5;50");
        assert_eq!(lines[3], "2,5;");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_csv_keeps_dot_when_requested() {
        let csv = render_csv(&report(), '.');
        assert!(csv.contains("1.5;50"));
    }

    #[test]
    fn test_json_contains_metrics_and_runs() {
        let json = render_json(&report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["metrics"][0]["name"], "queue");
        assert_eq!(value["replications"][0]["patients_recovered"], 9);
    }
}
