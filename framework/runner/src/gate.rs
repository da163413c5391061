use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use gust_core::prelude::{DelegatedShutdownListener, ShutdownSignalError};
use gust_profile::prelude::{ExecutorKind, Scenario};
use tokio::sync::Semaphore;

use crate::executor::Executor;

/// How often an idle concurrency worker re-checks the current level.
const IDLE_POLL: Duration = Duration::from_millis(50);

/// How often the arrival scheduler releases iterations.
const ARRIVAL_TICK: Duration = Duration::from_millis(10);

/// Decides when a worker may start its next iteration.
pub(crate) enum Gate {
    /// Worker `i` runs while `i` is below the scenario's current level.
    Concurrency {
        scenario: Arc<Scenario>,
        started: Instant,
    },
    /// Workers take iterations released by an [ArrivalSchedule].
    ArrivalRate(Arc<ArrivalSchedule>),
}

impl Gate {
    pub(crate) fn new(scenario: Arc<Scenario>, started: Instant) -> Self {
        match scenario.executor() {
            ExecutorKind::Concurrency => Gate::Concurrency { scenario, started },
            ExecutorKind::ArrivalRate => Gate::ArrivalRate(Arc::new(ArrivalSchedule::new())),
        }
    }

    /// Block until worker `worker_index` may start an iteration.
    ///
    /// Returns a [ShutdownSignalError] once the run is over.
    pub(crate) fn wait_turn(
        &self,
        worker_index: usize,
        executor: &Executor,
        shutdown_listener: &mut DelegatedShutdownListener,
    ) -> anyhow::Result<()> {
        match self {
            Gate::Concurrency { scenario, started } => loop {
                if shutdown_listener.should_shutdown() {
                    return Err(ShutdownSignalError::default().into());
                }
                if is_active(worker_index, scenario.level_at(started.elapsed())) {
                    return Ok(());
                }
                std::thread::sleep(IDLE_POLL);
            },
            Gate::ArrivalRate(schedule) => schedule.acquire(executor),
        }
    }

    pub(crate) fn arrival_schedule(&self) -> Option<&Arc<ArrivalSchedule>> {
        match self {
            Gate::ArrivalRate(schedule) => Some(schedule),
            Gate::Concurrency { .. } => None,
        }
    }
}

/// A worker is active while its index is below the whole part of the level.
pub(crate) fn is_active(worker_index: usize, level: f64) -> bool {
    (worker_index as f64) < level.floor()
}

/// Releases iterations at the rate a scenario asks for.
///
/// An iteration that is due while no worker is free is dropped and counted rather than queued.
pub(crate) struct ArrivalSchedule {
    permits: Semaphore,
    idle_workers: AtomicUsize,
    dropped: AtomicU64,
}

impl ArrivalSchedule {
    fn new() -> Self {
        Self {
            permits: Semaphore::new(0),
            idle_workers: AtomicUsize::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    fn acquire(&self, executor: &Executor) -> anyhow::Result<()> {
        self.idle_workers.fetch_add(1, Ordering::SeqCst);
        let result = executor.execute_in_place(async {
            match self.permits.acquire().await {
                Ok(permit) => {
                    permit.forget();
                    Ok(())
                }
                // Closed once the schedule has finished.
                Err(_) => Err(ShutdownSignalError::default().into()),
            }
        });
        self.idle_workers.fetch_sub(1, Ordering::SeqCst);
        result
    }

    /// Release `count` due iterations, dropping those no idle worker can take.
    pub(crate) fn release(&self, count: u64) {
        for _ in 0..count {
            if self.permits.available_permits() < self.idle_workers.load(Ordering::SeqCst) {
                self.permits.add_permits(1);
            } else {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn close(&self) {
        self.permits.close();
    }

    /// Drive the schedule until shutdown, then close it so waiting workers are released.
    pub(crate) async fn run(
        self: Arc<Self>,
        scenario: Arc<Scenario>,
        started: Instant,
        mut shutdown_listener: DelegatedShutdownListener,
    ) {
        let mut interval = tokio::time::interval(ARRIVAL_TICK);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let time_unit = scenario.time_unit().as_secs_f64();
        let mut owed = 0.0_f64;
        let mut last = started;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown_listener.wait_for_shutdown() => break,
            }

            let now = Instant::now();
            let rate = scenario.level_at(now.duration_since(started)).max(0.0);
            owed += rate * now.duration_since(last).as_secs_f64() / time_unit;
            last = now;

            let due = owed.floor();
            owed -= due;
            self.release(due as u64);
        }

        log::debug!(
            "Arrival schedule for {} finished, {} iterations dropped",
            scenario.name(),
            self.dropped()
        );
        self.close();
    }
}
