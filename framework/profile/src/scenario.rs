use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::time::Duration;

use crate::stage::StagePlan;

/// How a scenario turns its stage plan into traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, derive_more::Display)]
pub enum ExecutorKind {
    /// Stage targets are a number of concurrent workers, each looping the flow.
    #[default]
    #[display("concurrency")]
    Concurrency,
    /// Stage targets are iterations started per time unit, however many workers that takes.
    #[display("arrival-rate")]
    ArrivalRate,
}

impl ExecutorKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "vus" | "concurrency" => Some(ExecutorKind::Concurrency),
            "rps" | "rate" | "arrival-rate" => Some(ExecutorKind::ArrivalRate),
            _ => None,
        }
    }
}

/// A pass/fail rule evaluated over every sample tagged with the scenario's name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    /// The given latency percentile must stay under `max`.
    LatencyPercentile { percentile: f64, max: Duration },
    /// The fraction of failed requests must stay under `max_rate`.
    FailureRate { max_rate: f64 },
}

impl Threshold {
    /// p99 under 10 seconds and fewer than half of requests failing.
    pub fn defaults() -> Vec<Threshold> {
        vec![
            Threshold::LatencyPercentile {
                percentile: 99.0,
                max: Duration::from_secs(10),
            },
            Threshold::FailureRate { max_rate: 0.5 },
        ]
    }

    /// Name of the metric the threshold is applied to.
    pub fn metric(&self) -> &'static str {
        match self {
            Threshold::LatencyPercentile { .. } => "http_req_duration",
            Threshold::FailureRate { .. } => "http_req_failed",
        }
    }
}

impl Display for Threshold {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Threshold::LatencyPercentile { percentile, max } => {
                write!(f, "p({percentile})<{}", max.as_millis())
            }
            Threshold::FailureRate { max_rate } => write!(f, "rate<{max_rate}"),
        }
    }
}

/// Everything the runner needs to drive one named flow.
///
/// Built once with [Scenario::builder] and never changed afterwards.
#[derive(Debug, Clone)]
pub struct Scenario {
    name: String,
    executor: ExecutorKind,
    plan: StagePlan,
    start_level: u64,
    time_unit: Duration,
    pre_allocated_workers: u64,
    max_workers: u64,
    tags: BTreeMap<String, String>,
    thresholds: Vec<Threshold>,
}

impl Scenario {
    pub fn builder(
        name: impl ToString,
        executor: ExecutorKind,
        plan: StagePlan,
    ) -> ScenarioBuilder {
        ScenarioBuilder {
            name: name.to_string(),
            executor,
            plan,
            start_level: None,
            time_unit: Duration::from_secs(1),
            pre_allocated_workers: None,
            max_workers: None,
            tags: BTreeMap::new(),
            thresholds: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn executor(&self) -> ExecutorKind {
        self.executor
    }

    pub fn plan(&self) -> &StagePlan {
        &self.plan
    }

    pub fn start_level(&self) -> u64 {
        self.start_level
    }

    pub fn time_unit(&self) -> Duration {
        self.time_unit
    }

    pub fn pre_allocated_workers(&self) -> u64 {
        self.pre_allocated_workers
    }

    pub fn max_workers(&self) -> u64 {
        self.max_workers
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn thresholds(&self) -> &[Threshold] {
        &self.thresholds
    }

    pub fn total_duration(&self) -> Duration {
        self.plan.total_duration()
    }

    /// The executor name as load testing tools usually spell it.
    pub fn executor_label(&self) -> &'static str {
        match self.executor {
            ExecutorKind::Concurrency => "ramping-vus",
            ExecutorKind::ArrivalRate
                if self.plan.stages().len() == 1
                    && self.plan.stages()[0].target == self.start_level =>
            {
                "constant-arrival-rate"
            }
            ExecutorKind::ArrivalRate => "ramping-arrival-rate",
        }
    }

    /// Number of workers to start for this scenario.
    ///
    /// A concurrency scenario needs one worker per unit of its highest level. A rate scenario
    /// gets its pre-allocated pool grown up to `max_workers`.
    pub fn worker_pool_size(&self) -> usize {
        let size = match self.executor {
            ExecutorKind::Concurrency => self.plan.peak_target().max(self.start_level),
            ExecutorKind::ArrivalRate => self.max_workers.max(self.pre_allocated_workers),
        };
        size.max(1) as usize
    }

    /// The level the scenario asks for at `elapsed` into the run.
    pub fn level_at(&self, elapsed: Duration) -> f64 {
        self.plan.level_at(self.start_level, elapsed)
    }
}

pub struct ScenarioBuilder {
    name: String,
    executor: ExecutorKind,
    plan: StagePlan,
    start_level: Option<u64>,
    time_unit: Duration,
    pre_allocated_workers: Option<u64>,
    max_workers: Option<u64>,
    tags: BTreeMap<String, String>,
    thresholds: Option<Vec<Threshold>>,
}

impl ScenarioBuilder {
    /// Level before the first stage starts. Defaults to 0.
    pub fn start_level(mut self, level: u64) -> Self {
        self.start_level = Some(level);
        self
    }

    pub fn time_unit(mut self, time_unit: Duration) -> Self {
        self.time_unit = time_unit.max(Duration::from_millis(1));
        self
    }

    /// Worker limits for rate scenarios.
    pub fn workers(mut self, pre_allocated: u64, max: u64) -> Self {
        self.pre_allocated_workers = Some(pre_allocated);
        self.max_workers = Some(max);
        self
    }

    pub fn tag(mut self, key: impl ToString, value: impl ToString) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    /// Replace the default thresholds.
    pub fn thresholds(mut self, thresholds: Vec<Threshold>) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    pub fn build(self) -> Scenario {
        let peak = self.plan.peak_target();
        let pre_allocated_workers = self.pre_allocated_workers.unwrap_or(peak.max(1));
        let max_workers = self
            .max_workers
            .unwrap_or(pre_allocated_workers.saturating_mul(2))
            .max(pre_allocated_workers);

        let mut tags = self.tags;
        tags.insert("scenario".to_string(), self.name.clone());

        Scenario {
            name: self.name,
            executor: self.executor,
            plan: self.plan,
            start_level: self.start_level.unwrap_or_default(),
            time_unit: self.time_unit,
            pre_allocated_workers,
            max_workers,
            tags,
            thresholds: self.thresholds.unwrap_or_else(Threshold::defaults),
        }
    }
}
