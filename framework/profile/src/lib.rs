//! Describes the shape of a load test run.
//!
//! A [prelude::StagePlan] is planned from a handful of high level parameters and packaged with an
//! executor, tags and thresholds into a [prelude::Scenario], which the runner then drives.

mod duration;
mod planner;
mod scenario;
mod stage;

pub mod prelude {
    pub use crate::duration::{
        format_seconds, parse_duration, parse_int_prefix, parse_seconds, parse_seconds_as,
        BareUnit, MAX_DURATION_SECS,
    };
    pub use crate::planner::{
        parse_targets, plan, PlanParams, RunMode, StageStyle, MAX_PLAN_STEPS,
    };
    pub use crate::scenario::{ExecutorKind, Scenario, ScenarioBuilder, Threshold};
    pub use crate::stage::{EmptyStagePlanError, Stage, StagePlan};
}
