use std::collections::BTreeMap;
use std::time::{Duration, Instant, SystemTime};

/// Timing of a single operation, usually one HTTP request.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub operation_id: String,
    /// Tags such as `scenario`, `mode` and `service`.
    pub attr: BTreeMap<String, String>,
    started: Instant,
    started_at: SystemTime,
    pub elapsed: Option<Duration>,
    pub is_error: bool,
}

impl OperationRecord {
    pub fn new(operation_id: impl ToString) -> Self {
        Self {
            operation_id: operation_id.to_string(),
            attr: BTreeMap::new(),
            started: Instant::now(),
            started_at: SystemTime::now(),
            elapsed: None,
            is_error: false,
        }
    }

    pub fn with_attr(mut self, key: impl ToString, value: impl ToString) -> Self {
        self.add_attr(key, value);
        self
    }

    pub fn add_attr(&mut self, key: impl ToString, value: impl ToString) {
        self.attr.insert(key.to_string(), value.to_string());
    }

    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    pub fn duration(&self) -> Option<Duration> {
        self.elapsed
    }

    /// The `scenario` tag, if the operation was made while driving a scenario.
    pub fn scenario(&self) -> Option<&str> {
        self.attr.get("scenario").map(String::as_str)
    }

    pub(crate) fn finish(&mut self, is_error: bool) {
        self.elapsed = Some(self.started.elapsed());
        self.is_error = is_error;
    }

    /// Build a finished record with a known duration.
    pub fn completed(operation_id: impl ToString, elapsed: Duration, is_error: bool) -> Self {
        let mut record = Self::new(operation_id);
        record.elapsed = Some(elapsed);
        record.is_error = is_error;
        record
    }
}

/// The outcome of one named check made during an iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRecord {
    pub name: String,
    pub passed: bool,
    pub attr: BTreeMap<String, String>,
    pub recorded_at: SystemTime,
}

impl CheckRecord {
    pub fn new(name: impl ToString, passed: bool) -> Self {
        Self {
            name: name.to_string(),
            passed,
            attr: BTreeMap::new(),
            recorded_at: SystemTime::now(),
        }
    }

    pub fn with_attrs(mut self, attrs: &BTreeMap<String, String>) -> Self {
        self.attr
            .extend(attrs.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn scenario(&self) -> Option<&str> {
        self.attr.get("scenario").map(String::as_str)
    }
}
