mod aggregate;
mod record;
mod report;

use std::collections::BTreeMap;

pub use aggregate::{percentile, CheckTally, MetricsAggregate, ScenarioStats};
pub use record::{CheckRecord, OperationRecord};
pub use report::{
    JsonlFileReportCollector, MetricValue, ReportCollector, ReportConfig, ReportMetric, Reporter,
};

/// Finish timing `operation_record` and hand it to the reporter.
///
/// The operation counts as failed when `response` is an error.
pub fn report_operation<T, E>(
    reporter: &Reporter,
    mut operation_record: OperationRecord,
    response: &Result<T, E>,
) {
    operation_record.finish(response.is_err());
    reporter.add_operation(&operation_record);
}

/// Implemented by clients whose methods are wrapped with `#[gust_instrument]`.
///
/// The attribute macro calls [Instrumented::start_operation] before the wrapped body runs and
/// [Instrumented::finish_operation] with its result.
pub trait Instrumented {
    fn reporter(&self) -> &Reporter;

    /// Attributes copied onto every operation this client records, such as the scenario tags.
    fn operation_attrs(&self) -> &BTreeMap<String, String>;

    fn start_operation(&self, operation_id: &str) -> OperationRecord {
        let mut record = OperationRecord::new(operation_id);
        for (k, v) in self.operation_attrs() {
            record.add_attr(k, v);
        }
        record
    }

    fn finish_operation<T, E>(&self, record: OperationRecord, result: &Result<T, E>) {
        report_operation(self.reporter(), record, result);
    }
}

pub mod prelude {
    pub use crate::{
        percentile, report_operation, CheckRecord, CheckTally, Instrumented,
        JsonlFileReportCollector, MetricValue, MetricsAggregate, OperationRecord,
        ReportCollector, ReportConfig, ReportMetric, Reporter, ScenarioStats,
    };
}
