use std::collections::BTreeMap;
use std::time::Duration;

use crate::{CheckRecord, OperationRecord};

/// Pass and fail counts for one check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckTally {
    pub passed: u64,
    pub failed: u64,
}

impl CheckTally {
    pub fn total(&self) -> u64 {
        self.passed + self.failed
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        self.passed as f64 / self.total() as f64
    }
}

/// Samples gathered for one scenario tag.
#[derive(Debug, Clone, Default)]
pub struct ScenarioStats {
    latencies_us: Vec<f64>,
    failures: u64,
    checks: BTreeMap<String, CheckTally>,
}

impl ScenarioStats {
    pub fn requests(&self) -> u64 {
        self.latencies_us.len() as u64
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Fraction of requests that failed, 0 when nothing was sent.
    pub fn failure_rate(&self) -> f64 {
        if self.latencies_us.is_empty() {
            return 0.0;
        }
        self.failures as f64 / self.latencies_us.len() as f64
    }

    /// Latency at percentile `p` (0 to 100), or `None` without samples.
    pub fn latency_percentile(&self, p: f64) -> Option<Duration> {
        let mut sorted = self.latencies_us.clone();
        sorted.sort_by(f64::total_cmp);
        percentile(&sorted, p).map(|us| Duration::from_micros(us.max(0.0).round() as u64))
    }

    pub fn checks(&self) -> &BTreeMap<String, CheckTally> {
        &self.checks
    }
}

/// Per-scenario request and check statistics, used to evaluate thresholds at the end of a run.
///
/// Only samples tagged with a `scenario` are counted, so setup traffic such as warm-up calls does
/// not affect the outcome.
#[derive(Debug, Clone, Default)]
pub struct MetricsAggregate {
    scenarios: BTreeMap<String, ScenarioStats>,
}

impl MetricsAggregate {
    pub fn add_operation(&mut self, record: &OperationRecord) {
        let (Some(scenario), Some(elapsed)) = (record.scenario(), record.elapsed) else {
            return;
        };

        let stats = self.scenarios.entry(scenario.to_string()).or_default();
        stats.latencies_us.push(elapsed.as_micros() as f64);
        if record.is_error {
            stats.failures += 1;
        }
    }

    pub fn add_check(&mut self, record: &CheckRecord) {
        let Some(scenario) = record.scenario() else {
            return;
        };

        let tally = self
            .scenarios
            .entry(scenario.to_string())
            .or_default()
            .checks
            .entry(record.name.clone())
            .or_default();
        if record.passed {
            tally.passed += 1;
        } else {
            tally.failed += 1;
        }
    }

    pub fn scenario(&self, name: &str) -> Option<&ScenarioStats> {
        self.scenarios.get(name)
    }

    pub fn scenarios(&self) -> impl Iterator<Item = (&String, &ScenarioStats)> {
        self.scenarios.iter()
    }
}

/// Linearly interpolated percentile of already sorted values.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(scenario: Option<&str>, ms: u64, is_error: bool) -> OperationRecord {
        let record = OperationRecord::completed("http_post", Duration::from_millis(ms), is_error);
        match scenario {
            Some(s) => record.with_attr("scenario", s),
            None => record,
        }
    }

    #[test]
    fn percentile_interpolates() {
        let values = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(Some(10.0), percentile(&values, 0.0));
        assert_eq!(Some(40.0), percentile(&values, 100.0));
        assert_eq!(Some(25.0), percentile(&values, 50.0));
        assert_eq!(None, percentile(&[], 99.0));
    }

    #[test]
    fn single_sample_is_every_percentile() {
        assert_eq!(Some(7.0), percentile(&[7.0], 99.0));
    }

    #[test]
    fn untagged_operations_are_ignored() {
        let mut aggregate = MetricsAggregate::default();
        aggregate.add_operation(&op(None, 5, false));
        assert!(aggregate.scenario("load").is_none());
    }

    #[test]
    fn failure_rate_per_scenario() {
        let mut aggregate = MetricsAggregate::default();
        aggregate.add_operation(&op(Some("api"), 5, false));
        aggregate.add_operation(&op(Some("api"), 5, true));
        aggregate.add_operation(&op(Some("api"), 5, false));
        aggregate.add_operation(&op(Some("api"), 5, false));
        aggregate.add_operation(&op(Some("login"), 5, true));

        let api = aggregate.scenario("api").unwrap();
        assert_eq!(4, api.requests());
        assert_eq!(0.25, api.failure_rate());
        assert_eq!(1.0, aggregate.scenario("login").unwrap().failure_rate());
    }

    #[test]
    fn latency_percentile_from_samples() {
        let mut aggregate = MetricsAggregate::default();
        for ms in [100, 200, 300, 400, 500] {
            aggregate.add_operation(&op(Some("load"), ms, false));
        }

        let p50 = aggregate
            .scenario("load")
            .unwrap()
            .latency_percentile(50.0)
            .unwrap();
        assert_eq!(300, p50.as_millis());
    }

    #[test]
    fn checks_are_tallied() {
        let mut aggregate = MetricsAggregate::default();
        let tags = [("scenario".to_string(), "load".to_string())].into();
        aggregate.add_check(&CheckRecord::new("status is 2xx", true).with_attrs(&tags));
        aggregate.add_check(&CheckRecord::new("status is 2xx", false).with_attrs(&tags));
        aggregate.add_check(&CheckRecord::new("status is 2xx", true).with_attrs(&tags));

        let tally = aggregate.scenario("load").unwrap().checks()["status is 2xx"];
        assert_eq!(2, tally.passed);
        assert_eq!(1, tally.failed);
        assert_eq!(0.0, ScenarioStats::default().failure_rate());
    }
}
