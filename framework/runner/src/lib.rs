mod cli;
mod context;
mod definition;
mod executor;
mod gate;
mod init;
mod monitor;
mod progress;
mod run;
mod shutdown;
mod threshold;
mod types;

pub mod prelude {
    pub use crate::cli::{GustScenarioCli, ReporterOpt};
    pub use crate::context::UserValuesConstraint;
    pub use crate::context::{AgentContext, RunnerContext};
    pub use crate::definition::{HookResult, ScenarioDefinitionBuilder};
    pub use crate::executor::Executor;
    pub use crate::init::init;
    pub use crate::run::{run, RunOutcome, THRESHOLD_FAILURE_EXIT_CODE};
    pub use crate::threshold::ThresholdResult;
    pub use crate::types::GustResult;

    // Re-export of the `core` prelude for convenience.
    pub use gust_core::prelude::*;
    pub use gust_instruments::prelude::*;
    pub use gust_profile::prelude::*;
}
