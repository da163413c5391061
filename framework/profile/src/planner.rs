use std::time::Duration;

use crate::duration::parse_int_prefix;
use crate::stage::{Stage, StagePlan};

/// Upper bound on the number of steps an escalating plan is built from.
pub const MAX_PLAN_STEPS: u64 = 1000;

/// The overall shape of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, derive_more::Display)]
pub enum RunMode {
    /// Ramp up, hold steady, ramp down.
    #[default]
    #[display("load")]
    Load,
    /// Escalate through plateaus to find a breaking point.
    #[display("stress")]
    Stress,
}

impl RunMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "load" | "steady" => Some(RunMode::Load),
            "stress" | "escalating" => Some(RunMode::Stress),
            _ => None,
        }
    }
}

/// How an escalating plan is laid out when no explicit targets are given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, derive_more::Display)]
pub enum StageStyle {
    /// Stair-step plateaus.
    #[default]
    #[display("auto")]
    Auto,
    /// Many small, evenly spaced steps of a fixed duration.
    #[display("progressive")]
    Progressive,
}

impl StageStyle {
    /// Anything other than `progressive` means [StageStyle::Auto].
    pub fn parse_lenient(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("progressive") {
            StageStyle::Progressive
        } else {
            StageStyle::Auto
        }
    }
}

/// Inputs to [plan].
///
/// The steady fields (`target_level`, `ramp_up`, `hold`, `ramp_down`) are only read in
/// [RunMode::Load], the rest only in [RunMode::Stress].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanParams {
    pub total: Duration,
    pub target_level: u64,
    pub ramp_up: Duration,
    /// Defaults to `total`.
    pub hold: Option<Duration>,
    pub ramp_down: Duration,
    pub start_level: u64,
    pub max_level: u64,
    /// Capped at [MAX_PLAN_STEPS].
    pub step_count: u64,
    /// Plateau length for stair-step plans. Defaults to `total / (step_count + 1)`.
    pub step_hold: Option<Duration>,
    /// Step length for progressive and explicit plans. Defaults to the plateau length.
    pub step_duration: Option<Duration>,
    pub explicit_targets: Vec<u64>,
    pub style: StageStyle,
}

impl Default for PlanParams {
    fn default() -> Self {
        Self {
            total: Duration::from_secs(120),
            target_level: 50,
            ramp_up: Duration::from_secs(120),
            hold: None,
            ramp_down: Duration::from_secs(120),
            start_level: 20,
            max_level: 100,
            step_count: 4,
            step_hold: None,
            step_duration: None,
            explicit_targets: Vec::new(),
            style: StageStyle::Auto,
        }
    }
}

impl PlanParams {
    fn total_secs(&self) -> u64 {
        self.total.as_secs().max(1)
    }

    fn step_count(&self) -> u64 {
        self.step_count.min(MAX_PLAN_STEPS)
    }

    fn step_hold(&self) -> Duration {
        self.step_hold.map(at_least_one_second).unwrap_or_else(|| {
            Duration::from_secs((self.total_secs() / (self.step_count() + 1)).max(1))
        })
    }

    fn step_duration(&self) -> Duration {
        self.step_duration
            .map(at_least_one_second)
            .unwrap_or_else(|| self.step_hold())
    }
}

/// Build the stage plan for `mode`.
pub fn plan(mode: RunMode, params: &PlanParams) -> StagePlan {
    match mode {
        RunMode::Load => steady(params),
        RunMode::Stress => escalating(params),
    }
}

fn steady(params: &PlanParams) -> StagePlan {
    StagePlan::from_non_empty(vec![
        Stage::new(params.target_level, params.ramp_up),
        Stage::new(params.target_level, params.hold.unwrap_or(params.total)),
        Stage::new(0, params.ramp_down),
    ])
}

fn escalating(params: &PlanParams) -> StagePlan {
    if !params.explicit_targets.is_empty() {
        let step = params.step_duration();
        return StagePlan::from_non_empty(
            params
                .explicit_targets
                .iter()
                .map(|target| Stage::new(*target, step))
                .collect(),
        );
    }

    match params.style {
        StageStyle::Progressive => progressive(params),
        StageStyle::Auto => stair_step(params),
    }
}

fn progressive(params: &PlanParams) -> StagePlan {
    let step = params.step_duration();
    let count = (params.total_secs() / step.as_secs().max(1)).clamp(1, MAX_PLAN_STEPS);
    let inc = (params.max_level.saturating_sub(params.start_level) / count).max(1);

    StagePlan::from_non_empty(
        (0..count)
            .map(|i| {
                Stage::new(
                    params
                        .start_level
                        .saturating_add(inc.saturating_mul(i))
                        .min(params.max_level),
                    step,
                )
            })
            .collect(),
    )
}

fn stair_step(params: &PlanParams) -> StagePlan {
    let hold = params.step_hold();
    let steps = params.step_count().max(1);
    let inc = (params.max_level.saturating_sub(params.start_level) / steps).max(1);

    let mut stages = Vec::with_capacity(steps as usize + 1);
    stages.push(Stage::new(params.start_level, hold));
    stages.extend((1..=steps).map(|i| {
        Stage::new(
            params
                .start_level
                .saturating_add(inc.saturating_mul(i))
                .min(params.max_level),
            hold,
        )
    }));

    StagePlan::from_non_empty(stages)
}

/// Parse a comma separated target list such as `"10, 20,5"`.
///
/// Entries that are not numbers or are negative are dropped.
pub fn parse_targets(raw: &str) -> Vec<u64> {
    raw.split(',')
        .filter_map(|t| parse_int_prefix(t.trim()))
        .filter(|n| *n >= 0)
        .map(|n| n as u64)
        .collect()
}

fn at_least_one_second(d: Duration) -> Duration {
    d.max(Duration::from_secs(1))
}
