use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};

use crate::app_context::AppContext;
use crate::audit::AuditRecorder;

pub(super) fn run_retention_pruning(recorder: &AuditRecorder) -> Option<usize> {
    match recorder.prune_expired(Utc::now()) {
        Ok(removed) => {
            log::info!("audit_retention_pruned removed={}", removed);
            Some(removed)
        }
        Err(error) => {
            log::warn!("audit_retention_prune_failed error={}", error);
            None
        }
    }
}

pub(super) fn start_maintenance_job(
    app_context: AppContext,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = Duration::from_secs(app_context.config.audit.prune_interval_secs.max(1));
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    run_retention_pruning(&app_context.recorder);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        log::info!("maintenance_job_stopped");
    })
}
