mod in_memory_reporter;
mod jsonl_file_reporter;

use std::fmt::{Debug, Display, Formatter};
use std::path::PathBuf;
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::{CheckRecord, MetricsAggregate, OperationRecord};

pub use in_memory_reporter::InMemoryReporter;
pub use jsonl_file_reporter::JsonlFileReportCollector;

/// A field value on a [ReportMetric].
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Bool(bool),
    Float(f64),
    Int(i64),
    UInt(u64),
    Text(String),
}

impl Display for MetricValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Bool(b) => write!(f, "{b}"),
            MetricValue::Float(v) => write!(f, "{v:.3}"),
            MetricValue::Int(v) => write!(f, "{v}"),
            MetricValue::UInt(v) => write!(f, "{v}"),
            MetricValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        MetricValue::Bool(value)
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Float(value)
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        MetricValue::Int(value)
    }
}

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        MetricValue::UInt(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::Text(value.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        MetricValue::Text(value)
    }
}

/// A custom metric reported by the runner or a scenario.
///
/// The reported timestamp for the metric will be the current time when the metric is created.
/// The name you choose will be transformed into `gust.custom.<name>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportMetric {
    name: String,
    timestamp: SystemTime,
    fields: Vec<(String, MetricValue)>,
    tags: Vec<(String, String)>,
}

impl ReportMetric {
    pub fn new(name: &str) -> Self {
        Self {
            name: format!("gust.custom.{name}"),
            timestamp: SystemTime::now(),
            fields: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl ToString, value: impl Into<MetricValue>) -> Self {
        self.fields.push((name.to_string(), value.into()));
        self
    }

    pub fn with_tag(mut self, name: impl ToString, value: impl ToString) -> Self {
        self.tags.push((name.to_string(), value.to_string()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub fn fields(&self) -> &[(String, MetricValue)] {
        &self.fields
    }

    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    pub fn field(&self, name: &str) -> Option<&MetricValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }
}

pub trait ReportCollector {
    fn add_operation(&mut self, operation_record: &OperationRecord);

    fn add_check(&mut self, check_record: &CheckRecord);

    /// Record a custom metric that isn't an operation or a check.
    fn add_custom(&mut self, metric: ReportMetric);

    fn finalize(&self);
}

/// Fans records out to every configured [ReportCollector].
///
/// A [MetricsAggregate] is always kept alongside the collectors so thresholds can be evaluated
/// even when no reporter was selected.
pub struct Reporter {
    collectors: Mutex<Vec<Box<dyn ReportCollector + Send>>>,
    aggregate: Mutex<MetricsAggregate>,
}

impl Debug for Reporter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("collectors", &self.collectors.lock().len())
            .finish()
    }
}

impl Reporter {
    pub(crate) fn new(collectors: Vec<Box<dyn ReportCollector + Send>>) -> Self {
        Self {
            collectors: Mutex::new(collectors),
            aggregate: Mutex::new(MetricsAggregate::default()),
        }
    }

    /// A reporter without collectors. Samples are still aggregated.
    pub fn noop() -> Self {
        Self::new(Vec::new())
    }

    pub fn add_operation(&self, operation_record: &OperationRecord) {
        self.aggregate.lock().add_operation(operation_record);
        for collector in self.collectors.lock().iter_mut() {
            collector.add_operation(operation_record);
        }
    }

    pub fn add_check(&self, check_record: &CheckRecord) {
        self.aggregate.lock().add_check(check_record);
        for collector in self.collectors.lock().iter_mut() {
            collector.add_check(check_record);
        }
    }

    pub fn add_custom(&self, metric: ReportMetric) {
        for collector in self.collectors.lock().iter_mut() {
            collector.add_custom(metric.clone());
        }
    }

    /// A copy of everything aggregated so far.
    pub fn aggregate(&self) -> MetricsAggregate {
        self.aggregate.lock().clone()
    }

    pub fn finalize(&self) {
        for collector in self.collectors.lock().iter() {
            collector.finalize();
        }
    }
}

/// Selects the collectors a [Reporter] is built with.
#[derive(Debug, Default)]
pub struct ReportConfig {
    in_memory: bool,
    jsonl_file: Option<(PathBuf, String)>,
}

impl ReportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable_in_memory(mut self) -> Self {
        self.in_memory = true;
        self
    }

    /// Write one JSON line per sample into a new file under `dir`.
    pub fn enable_jsonl_file(mut self, dir: PathBuf, scenario_name: impl ToString) -> Self {
        self.jsonl_file = Some((dir, scenario_name.to_string()));
        self
    }

    pub fn init(self) -> anyhow::Result<Reporter> {
        let mut collectors: Vec<Box<dyn ReportCollector + Send>> = Vec::new();
        if self.in_memory {
            collectors.push(Box::new(InMemoryReporter::new()));
        }
        if let Some((dir, scenario_name)) = self.jsonl_file {
            collectors.push(Box::new(JsonlFileReportCollector::new(
                &dir,
                &scenario_name,
            )?));
        }

        Ok(Reporter::new(collectors))
    }
}
