mod tables;

use std::collections::BTreeMap;
use std::time::SystemTime;

use itertools::Itertools;
use tabled::settings::Style;
use tabled::Table;

use crate::report::in_memory_reporter::tables::{CheckRow, MetricRow, OperationRow};
use crate::report::{ReportCollector, ReportMetric};
use crate::{percentile, CheckRecord, CheckTally, OperationRecord};

/// A very basic reporter that is useful while developing scenarios. It keeps all of the operations
/// in memory and prints a summary of the operations, checks and custom metrics at the end of the
/// run.
#[derive(Default)]
pub struct InMemoryReporter {
    operation_records: Vec<OperationRecord>,
    checks: BTreeMap<(String, String), CheckTally>,
    custom_metrics: Vec<ReportMetric>,
}

impl InMemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn operation_rows(&self) -> Vec<OperationRow> {
        self.operation_records
            .iter()
            .filter_map(|record| {
                let elapsed_ms = record.duration()?.as_micros() as f64 / 1000.0;
                let scenario = record.scenario().unwrap_or("-").to_string();
                Some(((record.operation_id.clone(), scenario), (elapsed_ms, record.is_error)))
            })
            .into_group_map()
            .into_iter()
            .sorted_by(|a, b| a.0.cmp(&b.0))
            .map(|((operation_id, scenario), samples)| {
                let mut times = samples.iter().map(|(ms, _)| *ms).collect::<Vec<_>>();
                times.sort_by(f64::total_cmp);

                let total_operations = times.len();
                OperationRow {
                    operation_id,
                    scenario,
                    avg_time_ms: times.iter().sum::<f64>() / total_operations as f64,
                    min_time_ms: times.first().copied().unwrap_or_default(),
                    max_time_ms: times.last().copied().unwrap_or_default(),
                    p95_time_ms: percentile(&times, 95.0).unwrap_or_default(),
                    total_operations,
                    failed_operations: samples.iter().filter(|(_, is_error)| *is_error).count(),
                }
            })
            .collect()
    }

    fn check_rows(&self) -> Vec<CheckRow> {
        self.checks
            .iter()
            .map(|((scenario, check), tally)| CheckRow {
                check: check.clone(),
                scenario: scenario.clone(),
                passed: tally.passed,
                failed: tally.failed,
                pass_rate: tally.pass_rate(),
            })
            .collect()
    }

    fn metric_rows(&self) -> Vec<MetricRow> {
        self.custom_metrics
            .iter()
            .map(|metric| MetricRow {
                name: metric.name().to_string(),
                timestamp: format_timestamp(metric.timestamp()),
                fields: metric
                    .fields()
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .join(", "),
                tags: metric
                    .tags()
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .join(", "),
            })
            .collect()
    }

    fn print_summary(&self) {
        let operations = self.operation_rows();
        if !operations.is_empty() {
            println!("\nSummary of operations");
            println!("{}", Table::new(operations).with(Style::modern()));
        }

        let checks = self.check_rows();
        if !checks.is_empty() {
            println!("\nChecks");
            println!("{}", Table::new(checks).with(Style::modern()));
        }

        let metrics = self.metric_rows();
        if !metrics.is_empty() {
            println!("\nCustom metrics");
            println!("{}", Table::new(metrics).with(Style::modern()));
        }
    }
}

impl ReportCollector for InMemoryReporter {
    fn add_operation(&mut self, operation_record: &OperationRecord) {
        self.operation_records.push(operation_record.clone());
    }

    fn add_check(&mut self, check_record: &CheckRecord) {
        let key = (
            check_record.scenario().unwrap_or("-").to_string(),
            check_record.name.clone(),
        );
        let tally = self.checks.entry(key).or_default();
        if check_record.passed {
            tally.passed += 1;
        } else {
            tally.failed += 1;
        }
    }

    fn add_custom(&mut self, metric: ReportMetric) {
        self.custom_metrics.push(metric);
    }

    fn finalize(&self) {
        self.print_summary();
    }
}

fn format_timestamp(timestamp: SystemTime) -> String {
    match timestamp.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(duration) => chrono::DateTime::from_timestamp(duration.as_secs() as i64, 0)
            .unwrap_or(chrono::DateTime::UNIX_EPOCH)
            .format("%H:%M:%S")
            .to_string(),
        Err(_) => "Invalid timestamp".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn op(id: &str, scenario: &str, ms: u64, is_error: bool) -> OperationRecord {
        OperationRecord::completed(id, Duration::from_millis(ms), is_error)
            .with_attr("scenario", scenario)
    }

    #[test]
    fn operations_grouped_by_id_and_scenario() {
        let mut reporter = InMemoryReporter::new();
        reporter.add_operation(&op("http_post", "api", 10, false));
        reporter.add_operation(&op("http_post", "api", 30, true));
        reporter.add_operation(&op("http_post", "login", 5, false));

        let rows = reporter.operation_rows();

        assert_eq!(2, rows.len());
        assert_eq!("api", rows[0].scenario);
        assert_eq!(2, rows[0].total_operations);
        assert_eq!(1, rows[0].failed_operations);
        assert_eq!(20.0, rows[0].avg_time_ms);
        assert_eq!(10.0, rows[0].min_time_ms);
        assert_eq!(30.0, rows[0].max_time_ms);
        assert_eq!("login", rows[1].scenario);
    }

    #[test]
    fn failed_only_operations_do_not_panic() {
        let mut reporter = InMemoryReporter::new();
        reporter.add_operation(&op("http_get", "load", 12, true));

        let rows = reporter.operation_rows();
        assert_eq!(12.0, rows[0].min_time_ms);
        reporter.finalize();
    }

    #[test]
    fn checks_counted_per_scenario() {
        let mut reporter = InMemoryReporter::new();
        let tags = [("scenario".to_string(), "load".to_string())].into();
        reporter.add_check(&CheckRecord::new("status is 2xx", true).with_attrs(&tags));
        reporter.add_check(&CheckRecord::new("status is 2xx", false).with_attrs(&tags));

        let rows = reporter.check_rows();
        assert_eq!(1, rows.len());
        assert_eq!(0.5, rows[0].pass_rate);
    }

    #[test]
    fn custom_metrics_rendered() {
        let mut reporter = InMemoryReporter::new();
        reporter.add_custom(
            ReportMetric::new("dropped_iterations")
                .with_field("value", 3u64)
                .with_tag("scenario", "stress"),
        );

        let rows = reporter.metric_rows();
        assert_eq!("value: 3", rows[0].fields);
        assert_eq!("scenario: stress", rows[0].tags);
    }
}
