use std::sync::Arc;

use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::{Receiver, Sender};
use tokio::sync::Mutex;

/// Broadcasts the end of a run to every listener.
///
/// The run is ended either by the planned duration elapsing or by the user pressing Ctrl-C.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Sender<()>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: tokio::sync::broadcast::channel(1).0,
        }
    }

    pub fn shutdown(&self) {
        if let Err(e) = self.sender.send(()) {
            // Will fail if nobody is listening for a shutdown signal, in which case the log message
            // can be ignored.
            log::warn!("Failed to send shutdown signal: {e:?}");
        }
    }

    pub fn new_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener::new(self.sender.subscribe())
    }
}

/// A listener for the shutdown signal which can be handed to a worker or a background task.
///
/// Listeners must be created before the signal is sent, a listener created afterwards will not see it.
#[derive(Clone, Debug)]
pub struct DelegatedShutdownListener {
    receiver: Arc<Mutex<Receiver<()>>>,
}

impl DelegatedShutdownListener {
    pub(crate) fn new(receiver: Receiver<()>) -> Self {
        Self {
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Point in time check if the shutdown signal has been received. If this returns true then work
    /// should be stopped so that the run can finish.
    pub fn should_shutdown(&mut self) -> bool {
        match self.receiver.try_lock() {
            Ok(mut guard) => match guard.try_recv() {
                Ok(_) => true,
                Err(TryRecvError::Closed) | Err(TryRecvError::Lagged(_)) => true,
                Err(TryRecvError::Empty) => false,
            },
            Err(_) => false,
        }
    }

    /// Wait for the shutdown signal to be received. It is safe to race this with another future so
    /// that the shutdown signal can be used to cancel other work in progress.
    ///
    /// A closed or lagged channel also counts as a shutdown, the handle has either gone away or the
    /// signal was sent more than once.
    pub async fn wait_for_shutdown(&mut self) {
        let _ = self.receiver.lock().await.recv().await;
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct ShutdownSignalError {
    msg: String,
}

impl Default for ShutdownSignalError {
    fn default() -> Self {
        Self {
            msg: "Execution cancelled by shutdown signal".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_sees_shutdown_once_sent() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();

        assert!(!listener.should_shutdown());
        handle.shutdown();
        assert!(listener.should_shutdown());
    }

    #[test]
    fn every_listener_is_notified() {
        let handle = ShutdownHandle::new();
        let mut first = handle.new_listener();
        let mut second = handle.new_listener();

        handle.shutdown();

        assert!(first.should_shutdown());
        assert!(second.should_shutdown());
    }

    #[tokio::test]
    async fn wait_returns_after_repeated_signals() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();

        // Timer and Ctrl-C can both fire, which lags a channel with capacity 1.
        handle.shutdown();
        handle.shutdown();

        tokio::time::timeout(std::time::Duration::from_secs(1), listener.wait_for_shutdown())
            .await
            .expect("listener should observe shutdown");
    }

    #[test]
    fn shutdown_error_is_displayable() {
        assert_eq!(
            "Execution cancelled by shutdown signal",
            ShutdownSignalError::default().to_string()
        );
    }
}
