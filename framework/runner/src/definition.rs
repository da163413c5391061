use std::sync::Arc;
use std::time::Duration;

use gust_profile::prelude::Scenario;

use crate::cli::GustScenarioCli;
use crate::context::{AgentContext, RunnerContext, UserValuesConstraint};
use crate::init::init;

pub type HookResult = anyhow::Result<()>;

pub type GlobalHookMut<RV> = fn(&mut RunnerContext<RV>) -> HookResult;
pub type GlobalHook<RV> = fn(Arc<RunnerContext<RV>>) -> HookResult;
pub type AgentHookMut<RV, V> = fn(&mut AgentContext<RV, V>) -> HookResult;

/// A named flow and the [Scenario] that decides how often it runs.
pub(crate) struct BehaviourDefinition<RV: UserValuesConstraint, V: UserValuesConstraint> {
    pub(crate) name: String,
    pub(crate) scenario: Arc<Scenario>,
    pub(crate) hook: AgentHookMut<RV, V>,
}

/// The builder for a scenario definition.
///
/// This must be used at the start of a test to define the scenario that you want to run.
pub struct ScenarioDefinitionBuilder<RV: UserValuesConstraint, V: UserValuesConstraint> {
    /// The name of the scenario, which should be unique within the test suite.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")`.
    name: String,
    cli: GustScenarioCli,
    /// Initial value of the shared runner context, passed to the setup hook.
    runner_values: Option<RV>,
    /// Global setup hook for this scenario. It will be run once, before any workers are started.
    setup_fn: Option<GlobalHookMut<RV>>,
    /// Setup hook for a worker, which will be run once for each worker as it starts.
    setup_agent_fn: Option<AgentHookMut<RV, V>>,
    /// The behaviours to run, each driven by its own [Scenario]. Behaviours run side by side.
    behaviours: Vec<BehaviourDefinition<RV, V>>,
    /// Teardown hook for a worker, which will be run once for each worker as it stops.
    ///
    /// Errors from this hook are logged and do not stop the run.
    teardown_agent_fn: Option<AgentHookMut<RV, V>>,
    /// Global teardown hook, run once after every worker has stopped.
    ///
    /// Errors from this hook are logged and do not stop the run.
    teardown_fn: Option<GlobalHook<RV>>,
    /// Environment variables to record in the run summary.
    capture_env: Vec<String>,
}

pub(crate) struct ScenarioDefinition<RV: UserValuesConstraint, V: UserValuesConstraint> {
    pub(crate) name: String,
    pub(crate) cli: GustScenarioCli,
    pub(crate) runner_values: RV,
    /// How long to run for, `None` for a soak test.
    pub(crate) duration: Option<Duration>,
    pub(crate) setup_fn: Option<GlobalHookMut<RV>>,
    pub(crate) setup_agent_fn: Option<AgentHookMut<RV, V>>,
    pub(crate) behaviours: Vec<BehaviourDefinition<RV, V>>,
    pub(crate) teardown_agent_fn: Option<AgentHookMut<RV, V>>,
    pub(crate) teardown_fn: Option<GlobalHook<RV>>,
    pub(crate) capture_env: Vec<String>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> ScenarioDefinitionBuilder<RV, V> {
    /// Create a scenario definition from a name and an already parsed command line.
    pub fn new(name: &str, cli: GustScenarioCli) -> Self {
        Self {
            name: name.to_string(),
            cli,
            runner_values: None,
            setup_fn: None,
            setup_agent_fn: None,
            behaviours: Vec::new(),
            teardown_agent_fn: None,
            teardown_fn: None,
            capture_env: Vec::new(),
        }
    }

    /// Initialise logging, parse the command line and create a scenario definition.
    pub fn new_with_init(name: &str) -> Self {
        Self::new(name, init())
    }

    /// Start the runner context with `values` instead of `RV::default()`.
    pub fn with_runner_values(mut self, values: RV) -> Self {
        self.runner_values = Some(values);
        self
    }

    /// Set the global setup hook [ScenarioDefinitionBuilder::setup_fn] for this scenario.
    pub fn use_setup(mut self, setup_fn: GlobalHookMut<RV>) -> Self {
        self.setup_fn = Some(setup_fn);
        self
    }

    /// Set the worker setup hook [ScenarioDefinitionBuilder::setup_agent_fn] for this scenario.
    pub fn use_agent_setup(mut self, setup_agent_fn: AgentHookMut<RV, V>) -> Self {
        self.setup_agent_fn = Some(setup_agent_fn);
        self
    }

    /// Register a named behaviour, driven by `scenario`.
    ///
    /// Panics if a behaviour with the same name is already registered.
    pub fn use_behaviour(
        mut self,
        name: &str,
        scenario: Scenario,
        behaviour: AgentHookMut<RV, V>,
    ) -> Self {
        if self.behaviours.iter().any(|b| b.name == name) {
            panic!("Behaviour [{}] is already defined", name);
        }

        self.behaviours.push(BehaviourDefinition {
            name: name.to_string(),
            scenario: Arc::new(scenario),
            hook: behaviour,
        });
        self
    }

    /// Set the worker teardown hook [ScenarioDefinitionBuilder::teardown_agent_fn] for this scenario.
    pub fn use_agent_teardown(mut self, teardown_agent_fn: AgentHookMut<RV, V>) -> Self {
        self.teardown_agent_fn = Some(teardown_agent_fn);
        self
    }

    /// Set the global teardown hook [ScenarioDefinitionBuilder::teardown_fn] for this scenario.
    pub fn use_teardown(mut self, teardown_fn: GlobalHook<RV>) -> Self {
        self.teardown_fn = Some(teardown_fn);
        self
    }

    /// How long the run will last with the behaviours registered so far, `None` for a soak test.
    ///
    /// `--duration` wins over the longest behaviour plan.
    pub fn planned_duration(&self) -> Option<Duration> {
        if self.cli.soak {
            None
        } else if let Some(seconds) = self.cli.duration {
            Some(Duration::from_secs(seconds))
        } else {
            self.behaviours
                .iter()
                .map(|b| b.scenario.total_duration())
                .max()
        }
    }

    /// Record the value of environment variable `key` in the run summary.
    pub fn add_capture_env(mut self, key: &str) -> Self {
        self.capture_env.push(key.to_string());
        self
    }

    pub(crate) fn build(self) -> anyhow::Result<ScenarioDefinition<RV, V>> {
        if self.behaviours.is_empty() {
            anyhow::bail!("Scenario [{}] has no behaviours", self.name);
        }

        let duration = self.planned_duration();

        Ok(ScenarioDefinition {
            name: self.name,
            cli: self.cli,
            runner_values: self.runner_values.unwrap_or_default(),
            duration,
            setup_fn: self.setup_fn,
            setup_agent_fn: self.setup_agent_fn,
            behaviours: self.behaviours,
            teardown_agent_fn: self.teardown_agent_fn,
            teardown_fn: self.teardown_fn,
            capture_env: self.capture_env,
        })
    }
}
