use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use parking_lot::Mutex;
use serde::Serialize;

use crate::report::{MetricValue, ReportCollector, ReportMetric};
use crate::{CheckRecord, OperationRecord};

/// Write every sample to disk as one JSON object per line.
///
/// The file can be loaded by any tool that reads JSON lines, which makes this the reporter to use
/// when results are analysed after the run.
pub struct JsonlFileReportCollector {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Line<'a> {
    Operation {
        timestamp_ms: u128,
        operation_id: &'a str,
        duration_ms: f64,
        is_error: bool,
        tags: &'a BTreeMap<String, String>,
    },
    Check {
        timestamp_ms: u128,
        name: &'a str,
        passed: bool,
        tags: &'a BTreeMap<String, String>,
    },
    Custom {
        timestamp_ms: u128,
        name: &'a str,
        fields: BTreeMap<&'a str, &'a MetricValue>,
        tags: BTreeMap<&'a str, &'a str>,
    },
}

impl JsonlFileReportCollector {
    pub fn new(dir: &Path, scenario_name: &str) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create report directory {dir:?}"))?;

        let path = dir.join(format!(
            "{}-{}.jsonl",
            scenario_name,
            unix_millis(SystemTime::now())
        ));
        let file = File::options()
            .create_new(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to create report file {path:?}"))?;

        log::info!("Writing samples to {path:?}");

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&self, line: &Line) {
        let mut writer = self.writer.lock();
        let result = serde_json::to_writer(&mut *writer, line)
            .map_err(std::io::Error::from)
            .and_then(|_| writer.write_all(b"\n"));
        if let Err(e) = result {
            log::warn!("Failed to write sample to {:?}: {e}", self.path);
        }
    }
}

impl ReportCollector for JsonlFileReportCollector {
    fn add_operation(&mut self, operation_record: &OperationRecord) {
        self.write_line(&Line::Operation {
            timestamp_ms: unix_millis(operation_record.started_at()),
            operation_id: &operation_record.operation_id,
            duration_ms: operation_record
                .duration()
                .map(|d| d.as_micros() as f64 / 1000.0)
                .unwrap_or_default(),
            is_error: operation_record.is_error,
            tags: &operation_record.attr,
        });
    }

    fn add_check(&mut self, check_record: &CheckRecord) {
        self.write_line(&Line::Check {
            timestamp_ms: unix_millis(check_record.recorded_at),
            name: &check_record.name,
            passed: check_record.passed,
            tags: &check_record.attr,
        });
    }

    fn add_custom(&mut self, metric: ReportMetric) {
        self.write_line(&Line::Custom {
            timestamp_ms: unix_millis(metric.timestamp()),
            name: metric.name(),
            fields: metric
                .fields()
                .iter()
                .map(|(k, v)| (k.as_str(), v))
                .collect(),
            tags: metric
                .tags()
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect(),
        });
    }

    fn finalize(&self) {
        if let Err(e) = self.writer.lock().flush() {
            log::error!("Failed to flush samples to {:?}: {e}", self.path);
        }
    }
}

fn unix_millis(time: SystemTime) -> u128 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn writes_one_line_per_sample() {
        let dir = tempfile::tempdir().unwrap();
        let mut collector = JsonlFileReportCollector::new(dir.path(), "service_scenario").unwrap();

        collector.add_operation(
            &OperationRecord::completed("http_post", Duration::from_millis(12), true)
                .with_attr("scenario", "load"),
        );
        collector.add_check(&CheckRecord::new("status is 2xx", false));
        collector.add_custom(ReportMetric::new("dropped_iterations").with_field("value", 2u64));
        collector.finalize();

        let content = std::fs::read_to_string(collector.path()).unwrap();
        let lines = content
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap())
            .collect::<Vec<_>>();

        assert_eq!(3, lines.len());
        assert_eq!("operation", lines[0]["type"]);
        assert_eq!(12.0, lines[0]["duration_ms"]);
        assert_eq!(true, lines[0]["is_error"]);
        assert_eq!("load", lines[0]["tags"]["scenario"]);
        assert_eq!("check", lines[1]["type"]);
        assert_eq!(false, lines[1]["passed"]);
        assert_eq!("gust.custom.dropped_iterations", lines[2]["name"]);
        assert_eq!(2, lines[2]["fields"]["value"]);
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("reports").join("today");

        let collector = JsonlFileReportCollector::new(&nested, "auth_scenarios").unwrap();

        assert!(collector.path().starts_with(&nested));
    }
}
