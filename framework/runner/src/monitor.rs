use gust_core::prelude::DelegatedShutdownListener;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Share of the machine's CPU above which the load generator itself may be skewing results.
const HIGH_CPU_PERCENT: f32 = 10.0;

/// Monitor the resource usage of the load generator and report high usage.
///
/// Note that this won't stop the test proceeding, it will just log a warning so the user knows that
/// latencies might be inflated by the generator rather than the service under test.
pub(crate) fn start_monitor(mut shutdown_listener: DelegatedShutdownListener) -> anyhow::Result<()> {
    std::thread::Builder::new()
        .name("monitor".to_string())
        .spawn(move || {
            let this_process_pid = Pid::from_u32(std::process::id());
            let mut sys = System::new();

            sys.refresh_cpu_all();
            let cpu_count = sys.cpus().len().max(1);

            loop {
                if shutdown_listener.should_shutdown() {
                    break;
                }

                sys.refresh_processes_specifics(
                    ProcessesToUpdate::Some(&[this_process_pid]),
                    true,
                    ProcessRefreshKind::nothing().with_cpu(),
                );

                let Some(process) = sys.process(this_process_pid) else {
                    log::debug!("Resource monitor could not read process info, stopping");
                    break;
                };

                let usage = process.cpu_usage() / cpu_count as f32;
                if usage > HIGH_CPU_PERCENT {
                    log::warn!(
                        "High CPU usage detected. The load generator is using {usage:.2}% of the CPU, with {cpu_count} available cores"
                    );
                }

                std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL.max(std::time::Duration::from_secs(1)));
            }
        })?;

    Ok(())
}
