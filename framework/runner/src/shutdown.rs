use tokio::signal;

use gust_core::prelude::ShutdownHandle;

/// Create the run's [ShutdownHandle] and trigger it when the user presses Ctrl-C.
pub(crate) fn start_shutdown_listener(runtime: &tokio::runtime::Runtime) -> ShutdownHandle {
    let handle = ShutdownHandle::default();

    let listener_handle = handle.clone();
    runtime.spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                println!("Received shutdown signal, shutting down...");
                listener_handle.shutdown();
            }
            Err(e) => {
                log::warn!("Unable to listen for Ctrl-C, stop the run with a signal instead: {e}");
            }
        }
    });

    handle
}
