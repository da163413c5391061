use std::future::Future;
use std::time::Duration;

use gust_core::prelude::{ShutdownHandle, ShutdownSignalError};

/// Runs async work for hooks, which are plain synchronous functions.
#[derive(Debug)]
pub struct Executor {
    runtime: tokio::runtime::Runtime,
    shutdown_handle: ShutdownHandle,
}

impl Executor {
    pub(crate) fn new(runtime: tokio::runtime::Runtime, shutdown_handle: ShutdownHandle) -> Self {
        Self {
            runtime,
            shutdown_handle,
        }
    }

    /// Run async code in place, blocking until it completes.
    ///
    /// Note that the future will be cancelled if the runner is shutdown. You do not need to do anything
    /// special to handle this, but you should be aware that submitting a future which does not support
    /// cancelling may prevent the runner from shutting down.
    pub fn execute_in_place<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        let mut shutdown_listener = self.shutdown_handle.new_listener();
        self.runtime.block_on(async move {
            tokio::select! {
                result = fut => result,
                _ = shutdown_listener.wait_for_shutdown() => {
                    Err(anyhow::anyhow!(ShutdownSignalError::default()))
                },
            }
        })
    }

    /// Pause the calling worker for `duration`, waking early if the run is shut down.
    ///
    /// Used for think time between iterations. Returns a [ShutdownSignalError] if the run ended
    /// while sleeping.
    pub fn sleep(&self, duration: Duration) -> anyhow::Result<()> {
        self.execute_in_place(async move {
            tokio::time::sleep(duration).await;
            Ok(())
        })
    }

    /// Submit async code to be run in the background.
    ///
    /// Note that the future will not be cancelled if the runner is shutdown. It is also not guaranteed
    /// that the runner will wait for the future to complete before shutting down.
    pub fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        self.runtime.spawn(fut);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor() -> (Executor, ShutdownHandle) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let handle = ShutdownHandle::new();
        (Executor::new(runtime, handle.clone()), handle)
    }

    #[test]
    fn runs_future_to_completion() {
        let (executor, _handle) = executor();
        assert_eq!(3, executor.execute_in_place(async { Ok(1 + 2) }).unwrap());
    }

    #[test]
    fn sleep_is_cut_short_by_shutdown() {
        let (executor, handle) = executor();

        let trigger = handle.clone();
        executor.spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.shutdown();
        });

        let started = std::time::Instant::now();
        let err = executor.sleep(Duration::from_secs(30)).unwrap_err();

        assert!(err.is::<ShutdownSignalError>());
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
