use std::fmt::{Display, Formatter};
use std::time::Duration;

use crate::duration::format_seconds;

/// One segment of a load profile: move towards `target` over `duration`.
///
/// The target is a number of concurrent workers or a number of iterations per time unit,
/// depending on the executor that runs the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub target: u64,
    pub duration: Duration,
}

impl Stage {
    pub fn new(target: u64, duration: Duration) -> Self {
        Self { target, duration }
    }

    pub fn secs(target: u64, seconds: u64) -> Self {
        Self::new(target, Duration::from_secs(seconds))
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.target, format_seconds(self.duration))
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
#[display("a stage plan needs at least one stage")]
pub struct EmptyStagePlanError;

/// An ordered, non-empty sequence of [Stage]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    stages: Vec<Stage>,
}

impl StagePlan {
    pub fn new(stages: Vec<Stage>) -> Result<Self, EmptyStagePlanError> {
        if stages.is_empty() {
            return Err(EmptyStagePlanError);
        }
        Ok(Self { stages })
    }

    /// A single stage that holds `level` for `duration`.
    pub fn constant(level: u64, duration: Duration) -> Self {
        Self {
            stages: vec![Stage::new(level, duration)],
        }
    }

    /// Callers guarantee the vector is non-empty.
    pub(crate) fn from_non_empty(stages: Vec<Stage>) -> Self {
        debug_assert!(!stages.is_empty());
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn targets(&self) -> Vec<u64> {
        self.stages.iter().map(|s| s.target).collect()
    }

    pub fn total_duration(&self) -> Duration {
        self.stages
            .iter()
            .fold(Duration::ZERO, |total, s| total.saturating_add(s.duration))
    }

    pub fn peak_target(&self) -> u64 {
        self.stages.iter().map(|s| s.target).max().unwrap_or_default()
    }

    /// The level the plan asks for at `elapsed` into the run.
    ///
    /// Each stage moves linearly from the previous stage's target (or `start_level` for the first
    /// stage) to its own target. Past the end of the plan the last target is held.
    pub fn level_at(&self, start_level: u64, elapsed: Duration) -> f64 {
        let mut from = start_level as f64;
        let mut stage_start = Duration::ZERO;

        for stage in &self.stages {
            let stage_end = stage_start.saturating_add(stage.duration);
            if elapsed < stage_end {
                let span = stage.duration.as_secs_f64();
                let progress = if span > 0.0 {
                    (elapsed - stage_start).as_secs_f64() / span
                } else {
                    1.0
                };
                return from + (stage.target as f64 - from) * progress;
            }

            from = stage.target as f64;
            stage_start = stage_end;
        }

        from
    }
}

impl Display for StagePlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for stage in &self.stages {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{stage}")?;
        }
        Ok(())
    }
}
