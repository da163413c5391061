use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use gust_core::prelude::{DelegatedShutdownListener, ShutdownHandle};
use gust_instruments::{CheckRecord, Reporter};
use gust_profile::prelude::Scenario;

use crate::executor::Executor;

pub trait UserValuesConstraint: Default + Debug + Send + Sync + 'static {}

/// State shared by every worker in the run.
///
/// The setup hook receives this mutably. Once setup has finished it is frozen behind an [Arc] and
/// workers can only read it.
#[derive(Debug)]
pub struct RunnerContext<RV: UserValuesConstraint> {
    executor: Arc<Executor>,
    reporter: Arc<Reporter>,
    shutdown_handle: ShutdownHandle,
    run_id: String,
    value: RV,
}

impl<RV: UserValuesConstraint> RunnerContext<RV> {
    pub(crate) fn new(
        executor: Arc<Executor>,
        reporter: Arc<Reporter>,
        shutdown_handle: ShutdownHandle,
        run_id: String,
        value: RV,
    ) -> Self {
        Self {
            executor,
            reporter,
            shutdown_handle,
            run_id,
            value,
        }
    }

    /// A handle to the executor for running async code in hooks.
    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    /// A handle to the reporter for the current run.
    pub fn reporter(&self) -> Arc<Reporter> {
        self.reporter.clone()
    }

    /// The id of this run, either chosen on the command line or generated.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get a new shutdown listener that will be triggered when the runner is shutdown.
    pub fn new_shutdown_listener(&self) -> DelegatedShutdownListener {
        self.shutdown_handle.new_listener()
    }

    /// End the run early. Every worker stops after its current iteration.
    pub fn force_stop_scenario(&self) {
        self.shutdown_handle.shutdown();
    }

    pub fn get_mut(&mut self) -> &mut RV {
        &mut self.value
    }

    pub fn get(&self) -> &RV {
        &self.value
    }
}

/// State owned by a single worker.
///
/// A worker belongs to one behaviour and its [Scenario], and keeps its own value `V` between
/// iterations.
pub struct AgentContext<RV: UserValuesConstraint, V: UserValuesConstraint> {
    agent_index: usize,
    worker_index: usize,
    agent_id: String,
    behaviour_name: String,
    scenario: Arc<Scenario>,
    iteration: u64,
    runner_context: Arc<RunnerContext<RV>>,
    shutdown_listener: DelegatedShutdownListener,
    value: V,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> AgentContext<RV, V> {
    pub(crate) fn new(
        agent_index: usize,
        worker_index: usize,
        behaviour_name: String,
        scenario: Arc<Scenario>,
        runner_context: Arc<RunnerContext<RV>>,
        shutdown_listener: DelegatedShutdownListener,
    ) -> Self {
        Self {
            agent_index,
            worker_index,
            agent_id: format!("agent-{agent_index}"),
            behaviour_name,
            scenario,
            iteration: 0,
            runner_context,
            shutdown_listener,
            value: Default::default(),
        }
    }

    /// Position of this worker among all workers in the run.
    pub fn agent_index(&self) -> usize {
        self.agent_index
    }

    /// Position of this worker within its scenario's pool.
    pub fn worker_index(&self) -> usize {
        self.worker_index
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn behaviour_name(&self) -> &str {
        &self.behaviour_name
    }

    pub fn scenario(&self) -> &Arc<Scenario> {
        &self.scenario
    }

    /// Number of iterations this worker has started before the current one.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub(crate) fn next_iteration(&mut self) {
        self.iteration += 1;
    }

    pub fn runner_context(&self) -> &Arc<RunnerContext<RV>> {
        &self.runner_context
    }

    pub fn shutdown_listener(&mut self) -> &mut DelegatedShutdownListener {
        &mut self.shutdown_listener
    }

    /// Record the outcome of a named check, tagged with the scenario's tags.
    ///
    /// A failed check is only counted, it never stops the worker. Returns `passed`.
    pub fn check(&self, name: &str, passed: bool) -> bool {
        self.runner_context
            .reporter
            .add_check(&CheckRecord::new(name, passed).with_attrs(self.scenario.tags()));
        passed
    }

    /// Tags attached to everything this worker reports.
    pub fn tags(&self) -> &BTreeMap<String, String> {
        self.scenario.tags()
    }

    pub fn get_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub fn get(&self) -> &V {
        &self.value
    }
}
