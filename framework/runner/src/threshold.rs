use std::sync::Arc;

use gust_instruments::MetricsAggregate;
use gust_profile::prelude::{Scenario, Threshold};
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// The verdict on one threshold for one scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdResult {
    pub scenario: String,
    pub threshold: Threshold,
    /// Milliseconds for latency thresholds, a fraction for failure rate thresholds. `None` when
    /// the scenario recorded no requests.
    pub observed: Option<f64>,
    pub passed: bool,
}

/// Evaluate every scenario's thresholds against the samples tagged with its name.
///
/// A scenario that recorded no requests passes, there is nothing to judge.
pub(crate) fn evaluate(
    scenarios: &[Arc<Scenario>],
    aggregate: &MetricsAggregate,
) -> Vec<ThresholdResult> {
    scenarios
        .iter()
        .flat_map(|scenario| {
            let stats = aggregate.scenario(scenario.name());
            scenario.thresholds().iter().map(move |threshold| {
                let observed = stats.and_then(|stats| match threshold {
                    Threshold::LatencyPercentile { percentile, .. } => stats
                        .latency_percentile(*percentile)
                        .map(|d| d.as_secs_f64() * 1000.0),
                    Threshold::FailureRate { .. } => {
                        (stats.requests() > 0).then(|| stats.failure_rate())
                    }
                });

                let passed = match (threshold, observed) {
                    (_, None) => true,
                    (Threshold::LatencyPercentile { max, .. }, Some(ms)) => {
                        ms < max.as_secs_f64() * 1000.0
                    }
                    (Threshold::FailureRate { max_rate }, Some(rate)) => rate < *max_rate,
                };

                ThresholdResult {
                    scenario: scenario.name().to_string(),
                    threshold: *threshold,
                    observed,
                    passed,
                }
            })
        })
        .collect()
}

#[derive(Tabled)]
struct ThresholdRow {
    scenario: String,
    metric: String,
    threshold: String,
    observed: String,
    result: String,
}

pub(crate) fn print_thresholds(results: &[ThresholdResult]) {
    if results.is_empty() {
        return;
    }

    let rows = results
        .iter()
        .map(|r| ThresholdRow {
            scenario: r.scenario.clone(),
            metric: r.threshold.metric().to_string(),
            threshold: r.threshold.to_string(),
            observed: match (r.threshold, r.observed) {
                (_, None) => "-".to_string(),
                (Threshold::LatencyPercentile { .. }, Some(ms)) => format!("{ms:.2}ms"),
                (Threshold::FailureRate { .. }, Some(rate)) => format!("{:.2}%", rate * 100.0),
            },
            result: if r.passed { "pass" } else { "FAIL" }.to_string(),
        })
        .collect::<Vec<_>>();

    println!("\nThresholds");
    println!("{}", Table::new(rows).with(Style::modern()));
}
