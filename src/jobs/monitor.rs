use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};

use crate::app_context::AppContext;

pub(super) fn start_monitor_job(
    app_context: AppContext,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if app_context.config.simulation.enabled {
            log::warn!(
                "simulation_mode_enabled servers={} source=monitor_provider",
                app_context.config.simulation.server_count
            );
        }
        let mut previous_tick = None;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let runtime_config = app_context.runtime_config.read().await.clone();
            let now = Utc::now();

            if let Some(previous) = previous_tick {
                let elapsed_ms = now
                    .signed_duration_since(previous)
                    .num_milliseconds()
                    .max(0);
                let threshold_ms = runtime_config.sampling_interval_ms.saturating_mul(2) as i64;
                if elapsed_ms > threshold_ms {
                    log::warn!(
                        "monitor_loop_delayed elapsed_ms={} threshold_ms={}",
                        elapsed_ms,
                        threshold_ms
                    );
                }
            }
            previous_tick = Some(now);

            // Runs to completion; shutdown is only observed between ticks.
            app_context.monitor.tick_at(now).await;

            let sleep_duration = Duration::from_millis(runtime_config.sampling_interval_ms);
            tokio::select! {
                _ = sleep(sleep_duration) => {}
                _ = app_context.runtime_update_notify.notified() => {
                    log::info!(
                        "monitor_interval_change_interrupt_applied previous_sleep_ms={}",
                        runtime_config.sampling_interval_ms
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        log::info!("monitor_job_stopped");
    })
}
