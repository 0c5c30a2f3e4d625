use std::future::Future;
use std::io::Write;

use tokio::time::{self, MissedTickBehavior};

use crate::config::Config;
use crate::cycle::Watcher;
use crate::render;
use crate::summary::{self, SummaryError};

fn print_frame(frame: &str) {
    let mut stdout = std::io::stdout().lock();
    if let Err(why) = stdout.write_all(frame.as_bytes()).and_then(|_| stdout.flush()) {
        tracing::warn!(error = %why, "couldn't write to stdout");
    }
}

/// Polls until `shutdown` resolves, then writes the summary and, if
/// configured, removes the log.
///
/// A shutdown arriving mid-cycle lets that cycle finish first. The log is
/// only removed once the summary has been written.
pub async fn run<S>(mut watcher: Watcher, config: &Config, shutdown: S) -> Result<(), SummaryError>
where
    S: Future<Output = ()>,
{
    // Cycles are awaited inline, so a slow cycle skips ticks instead of overlapping.
    let mut interval = time::interval(config.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,
            _ = interval.tick() => {
                let frame = watcher.run_cycle().await;
                print_frame(&frame);
            }
        }
    }

    tracing::info!("shutting down");
    watcher.log_mut().flush().await;

    if watcher.log().entries().is_empty() {
        tracing::info!("no cycles completed, skipping summary");
        return Ok(());
    }

    let entries = summary::run_summary(&config.log_path, &config.summary_path).await?;
    print_frame(&render::render_summary(&entries, config.display_tz));

    if config.clear_log_on_exit {
        watcher.log_mut().clear().await;
    }

    Ok(())
}
