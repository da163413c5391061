use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use gust_core::prelude::{AgentBailError, ShutdownSignalError};
use gust_instruments::{ReportConfig, ReportMetric, Reporter};
use gust_profile::prelude::Scenario;
use gust_summary_model::{RunSummary, ScenarioSummary, StageSummary, ThresholdSummary};

use crate::cli::{GustScenarioCli, ReporterOpt};
use crate::context::{AgentContext, RunnerContext, UserValuesConstraint};
use crate::definition::{ScenarioDefinition, ScenarioDefinitionBuilder};
use crate::executor::Executor;
use crate::gate::Gate;
use crate::monitor::start_monitor;
use crate::progress::start_progress;
use crate::shutdown::start_shutdown_listener;
use crate::threshold::{evaluate, print_thresholds, ThresholdResult};

/// Process exit code for a run that finished but breached at least one threshold.
pub const THRESHOLD_FAILURE_EXIT_CODE: u8 = 99;

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    /// Workers that were still running when the run ended. Workers that bailed or failed their
    /// setup hook are not counted.
    pub agents_at_end: usize,
    pub thresholds: Vec<ThresholdResult>,
    /// Completed iterations per behaviour.
    pub iterations: BTreeMap<String, u64>,
    /// Iterations an arrival rate behaviour could not start because every worker was busy.
    pub dropped_iterations: BTreeMap<String, u64>,
}

impl RunOutcome {
    pub fn passed(&self) -> bool {
        self.thresholds.iter().all(|t| t.passed)
    }

    /// `0` when every threshold passed, [THRESHOLD_FAILURE_EXIT_CODE] otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.passed() {
            0
        } else {
            THRESHOLD_FAILURE_EXIT_CODE
        }
    }
}

struct BehaviourRun {
    name: String,
    scenario: Arc<Scenario>,
    gate: Arc<Gate>,
    workers: usize,
    iterations: Arc<AtomicU64>,
}

pub fn run<RV: UserValuesConstraint, V: UserValuesConstraint>(
    definition: ScenarioDefinitionBuilder<RV, V>,
) -> anyhow::Result<RunOutcome> {
    let definition = definition.build()?;
    let run_id = definition
        .cli
        .run_id
        .clone()
        .unwrap_or_else(|| nanoid::nanoid!());

    log::info!("Running scenario: {} (run id {})", definition.name, run_id);
    for behaviour in &definition.behaviours {
        log::info!(
            "Behaviour {}: {} [{}] start level {}",
            behaviour.name,
            behaviour.scenario.executor_label(),
            behaviour.scenario.plan(),
            behaviour.scenario.start_level(),
        );
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime);
    let executor = Arc::new(Executor::new(runtime, shutdown_handle.clone()));
    let reporter = Arc::new(build_reporter(&definition.cli, &definition.name)?);

    let ScenarioDefinition {
        name,
        cli,
        runner_values,
        duration,
        setup_fn,
        setup_agent_fn,
        behaviours,
        teardown_agent_fn,
        teardown_fn,
        capture_env,
    } = definition;

    let mut runner_context = RunnerContext::new(
        executor,
        reporter.clone(),
        shutdown_handle.clone(),
        run_id.clone(),
        runner_values,
    );

    if let Some(setup_fn) = setup_fn {
        setup_fn(&mut runner_context)?;
    }

    let started_at = chrono::Utc::now().timestamp();
    let started = Instant::now();

    // After the setup has run, and if this is a time bounded run, then we need to take additional actions
    if let Some(duration) = duration {
        if !cli.no_progress {
            if let Err(e) = start_progress(duration, shutdown_handle.new_listener()) {
                log::warn!("Could not start the progress bar: {e:?}");
            }
        }

        // Set a timer to shut down the run after the duration has elapsed
        let shutdown_handle = shutdown_handle.clone();
        runner_context.executor().spawn(async move {
            tokio::time::sleep(duration).await;
            shutdown_handle.shutdown();
        });
    }

    let runner_context = Arc::new(runner_context);

    // Ready to start spawning workers so start the resource monitor to report high usage by the
    // generator, which might lead to a misleading outcome.
    if let Err(e) = start_monitor(shutdown_handle.new_listener()) {
        log::warn!("Could not start the resource monitor: {e:?}");
    }

    let behaviour_runs = behaviours
        .iter()
        .map(|behaviour| {
            let gate = Arc::new(Gate::new(behaviour.scenario.clone(), started));
            if let Some(schedule) = gate.arrival_schedule() {
                runner_context.executor().spawn(schedule.clone().run(
                    behaviour.scenario.clone(),
                    started,
                    shutdown_handle.new_listener(),
                ));
            }

            BehaviourRun {
                name: behaviour.name.clone(),
                scenario: behaviour.scenario.clone(),
                gate,
                workers: behaviour.scenario.worker_pool_size(),
                iterations: Arc::new(AtomicU64::new(0)),
            }
        })
        .collect::<Vec<_>>();

    let mut handles = Vec::new();
    let mut agent_index = 0;
    for (behaviour, behaviour_run) in behaviours.iter().zip(&behaviour_runs) {
        for worker_index in 0..behaviour_run.workers {
            let runner_context = runner_context.clone();
            let gate = behaviour_run.gate.clone();
            let iterations = behaviour_run.iterations.clone();
            let behaviour_fn = behaviour.hook;
            let behaviour_name = behaviour.name.clone();
            let scenario = behaviour.scenario.clone();

            // For us to check if the worker should shut down between iterations
            let mut cycle_shutdown_listener = shutdown_handle.new_listener();
            // For the behaviour implementation to listen for shutdown and respond appropriately
            let delegated_shutdown_listener = shutdown_handle.new_listener();

            let agent_id = format!("agent-{agent_index}");
            let this_agent_index = agent_index;
            agent_index += 1;

            let spawned = std::thread::Builder::new()
                .name(agent_id.clone())
                .spawn(move || {
                    let mut context = AgentContext::new(
                        this_agent_index,
                        worker_index,
                        behaviour_name,
                        scenario,
                        runner_context,
                        delegated_shutdown_listener,
                    );
                    if let Some(setup_agent_fn) = setup_agent_fn {
                        if let Err(e) = setup_agent_fn(&mut context) {
                            log::error!("Agent setup failed for agent {agent_id}: {e:?}");
                            return false;
                        }
                    }

                    let mut still_running = true;
                    loop {
                        let executor = context.runner_context().executor().clone();
                        match gate.wait_turn(worker_index, &executor, &mut cycle_shutdown_listener)
                        {
                            Ok(()) => {}
                            Err(e) if e.is::<ShutdownSignalError>() => break,
                            Err(e) => {
                                log::error!("Agent {agent_id} could not wait for its turn: {e:?}");
                                break;
                            }
                        }

                        let result = behaviour_fn(&mut context);
                        context.next_iteration();
                        iterations.fetch_add(1, Ordering::Relaxed);

                        match result {
                            Ok(()) => {}
                            Err(e) if e.is::<ShutdownSignalError>() => {
                                // Expected while the run is ending. The next wait will stop the loop.
                            }
                            Err(e) if e.is::<AgentBailError>() => {
                                log::warn!("Agent {agent_id} is bailing: {e}");
                                still_running = false;
                                break;
                            }
                            Err(e) => {
                                log::error!("Agent behaviour failed for agent {agent_id}: {e:?}");
                            }
                        }
                    }

                    if let Some(teardown_agent_fn) = teardown_agent_fn {
                        if let Err(e) = teardown_agent_fn(&mut context) {
                            log::error!("Agent teardown failed for agent {agent_id}: {e:?}");
                        }
                    }

                    still_running
                });

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    shutdown_handle.shutdown();
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(e).context("Failed to spawn thread for test agent");
                }
            }
        }
    }
    let peer_count = handles.len();

    let mut agents_at_end = 0;
    for handle in handles {
        let still_running = handle
            .join()
            .map_err(|e| anyhow::anyhow!("Error joining thread for test agent: {:?}", e))?;
        if still_running {
            agents_at_end += 1;
        }
    }

    // Every worker may have stopped early, make sure background tasks stop too.
    shutdown_handle.shutdown();

    if let Some(teardown_fn) = teardown_fn {
        // Don't crash the runner if the teardown fails. We still want the reporting and runner
        // shutdown to happen cleanly. The hook is documented as 'best effort'
        if let Err(e) = teardown_fn(runner_context.clone()) {
            log::error!("Teardown failed: {:?}", e);
        }
    }

    let mut iterations = BTreeMap::new();
    let mut dropped_iterations = BTreeMap::new();
    for behaviour_run in &behaviour_runs {
        let completed = behaviour_run.iterations.load(Ordering::Relaxed);
        reporter.add_custom(
            ReportMetric::new("iterations")
                .with_tag("scenario", behaviour_run.scenario.name())
                .with_field("value", completed),
        );
        iterations.insert(behaviour_run.name.clone(), completed);

        if let Some(schedule) = behaviour_run.gate.arrival_schedule() {
            let dropped = schedule.dropped();
            reporter.add_custom(
                ReportMetric::new("dropped_iterations")
                    .with_tag("scenario", behaviour_run.scenario.name())
                    .with_field("value", dropped),
            );
            dropped_iterations.insert(behaviour_run.name.clone(), dropped);
        }
    }

    let scenarios = behaviour_runs
        .iter()
        .map(|b| b.scenario.clone())
        .collect::<Vec<_>>();
    let thresholds = evaluate(&scenarios, &reporter.aggregate());

    reporter.finalize();
    print_thresholds(&thresholds);

    let outcome = RunOutcome {
        run_id,
        agents_at_end,
        thresholds,
        iterations,
        dropped_iterations,
    };

    if let Some(summary_file) = &cli.summary_file {
        let mut summary = RunSummary::new(
            outcome.run_id.clone(),
            name,
            started_at,
            duration.map(|d| d.as_secs()),
            peer_count,
            env!("CARGO_PKG_VERSION").to_string(),
        );
        summary.set_peer_end_count(outcome.agents_at_end);
        for behaviour_run in &behaviour_runs {
            summary.add_scenario(scenario_summary(behaviour_run, &outcome));
        }
        for result in &outcome.thresholds {
            summary.add_threshold(ThresholdSummary {
                scenario: result.scenario.clone(),
                metric: result.threshold.metric().to_string(),
                threshold: result.threshold.to_string(),
                observed: result.observed,
                passed: result.passed,
            });
        }
        for key in capture_env {
            if let Ok(value) = std::env::var(&key) {
                summary.add_env(key, value);
            }
        }

        gust_summary_model::append_run_summary(&summary, summary_file)
            .with_context(|| format!("Failed to write run summary to {summary_file:?}"))?;
    }

    log::info!(
        "Run {} finished after {:.1}s, thresholds {}",
        outcome.run_id,
        started.elapsed().as_secs_f64(),
        if outcome.passed() { "passed" } else { "FAILED" }
    );

    Ok(outcome)
}

fn build_reporter(cli: &GustScenarioCli, scenario_name: &str) -> anyhow::Result<Reporter> {
    match cli.reporter {
        ReporterOpt::InMemory => ReportConfig::new().enable_in_memory().init(),
        ReporterOpt::JsonlFile => ReportConfig::new()
            .enable_jsonl_file(cli.report_dir.clone(), scenario_name)
            .init(),
        ReporterOpt::Noop => Ok(Reporter::noop()),
    }
}

fn scenario_summary(behaviour_run: &BehaviourRun, outcome: &RunOutcome) -> ScenarioSummary {
    let scenario = &behaviour_run.scenario;
    ScenarioSummary {
        name: scenario.name().to_string(),
        executor: scenario.executor_label().to_string(),
        start_level: scenario.start_level(),
        stages: scenario
            .plan()
            .stages()
            .iter()
            .map(|stage| StageSummary {
                target: stage.target,
                duration_s: stage.duration.as_secs(),
            })
            .collect(),
        workers: behaviour_run.workers,
        iterations: outcome
            .iterations
            .get(&behaviour_run.name)
            .copied()
            .unwrap_or_default(),
        dropped_iterations: outcome.dropped_iterations.get(&behaviour_run.name).copied(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(passed: &[bool]) -> RunOutcome {
        RunOutcome {
            run_id: "test".to_string(),
            agents_at_end: 1,
            thresholds: passed
                .iter()
                .map(|passed| ThresholdResult {
                    scenario: "load".to_string(),
                    threshold: gust_profile::prelude::Threshold::FailureRate { max_rate: 0.5 },
                    observed: Some(0.1),
                    passed: *passed,
                })
                .collect(),
            iterations: BTreeMap::new(),
            dropped_iterations: BTreeMap::new(),
        }
    }

    #[test]
    fn exit_code_reflects_thresholds() {
        assert_eq!(0, outcome(&[]).exit_code());
        assert_eq!(0, outcome(&[true, true]).exit_code());
        assert_eq!(99, outcome(&[true, false]).exit_code());
    }
}
