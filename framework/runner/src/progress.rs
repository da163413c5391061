use std::fmt::Write;
use std::time::{Duration, Instant};

use gust_core::prelude::DelegatedShutdownListener;
use indicatif::{ProgressBar, ProgressState, ProgressStyle};

/// Displays a progress bar while the test is running to show the user how long is left.
pub(crate) fn start_progress(
    planned_runtime: Duration,
    mut shutdown_listener: DelegatedShutdownListener,
) -> anyhow::Result<()> {
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{wide_bar:.cyan/blue}] [{elapsed_precise} / {planned_runtime}]",
    )?
    .with_key("planned_runtime", {
        let planned = format_hms(planned_runtime);
        move |_state: &ProgressState, w: &mut dyn Write| {
            let _ = w.write_str(&planned);
        }
    })
    .progress_chars("#>-");

    std::thread::Builder::new()
        .name("progress".to_string())
        .spawn(move || {
            let start_time = Instant::now();
            let pb = ProgressBar::new(planned_runtime.as_secs());
            pb.set_style(style);

            loop {
                if shutdown_listener.should_shutdown() {
                    log::trace!("Progress thread shutting down");
                    pb.finish_and_clear();
                    break;
                }

                pb.set_position(
                    start_time
                        .elapsed()
                        .as_secs()
                        .min(planned_runtime.as_secs()),
                );
                std::thread::sleep(Duration::from_millis(500));
            }
        })?;

    Ok(())
}

fn format_hms(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_planned_runtime() {
        assert_eq!("00:03:00", format_hms(Duration::from_secs(180)));
        assert_eq!("01:01:01", format_hms(Duration::from_secs(3661)));
    }
}
