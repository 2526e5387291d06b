use std::path::{Path, PathBuf};

use notify::{Config as NotifyConfig, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};

use crate::app_context::AppContext;
use crate::audit::{AuditAction, AuditEntry, NewAuditEntry, Severity};
use crate::config::{RuntimeConfig, load_config};

const RELOAD_SETTLE: Duration = Duration::from_millis(250);

async fn apply_runtime_reload_from_path(
    app_context: &AppContext,
    config_path: &Path,
) -> Result<RuntimeConfig, String> {
    let new_config = load_config(config_path).map_err(|error| error.to_string())?;
    let runtime_config = RuntimeConfig::from_config(&new_config);
    app_context
        .update_runtime_config(runtime_config.clone())
        .await;
    Ok(runtime_config)
}

/// Applies the file at `config_path` if it is valid and leaves an audit
/// entry either way.
pub(super) async fn reload_and_record(app_context: &AppContext, config_path: &Path) -> AuditEntry {
    match apply_runtime_reload_from_path(app_context, config_path).await {
        Ok(runtime_config) => {
            let thresholds = runtime_config
                .thresholds
                .configured()
                .map(|(metric, threshold)| {
                    (
                        metric.as_str().to_string(),
                        json!({
                            "enter_value": threshold.enter_value,
                            "clear_value": threshold.effective_clear_value(),
                            "consecutive_breaches": threshold.consecutive_breaches,
                        }),
                    )
                })
                .collect::<serde_json::Map<_, _>>();
            log::info!(
                "config_hot_reload_applied target=runtime sampling_interval_ms={} cooldown_ms={} thresholds={}",
                runtime_config.sampling_interval_ms,
                runtime_config.cooldown_ms,
                thresholds.len()
            );

            app_context
                .record_and_dispatch(
                    NewAuditEntry::new(
                        AuditAction::ConfigReloaded,
                        Severity::Info,
                        "runtime configuration reloaded",
                    )
                    .with_subject(config_path.display().to_string())
                    .with_metadata(json!({
                        "sampling_interval_ms": runtime_config.sampling_interval_ms,
                        "cooldown_ms": runtime_config.cooldown_ms,
                        "thresholds": thresholds,
                    })),
                )
                .await
        }
        Err(error) => {
            log::warn!("config hot-reload ignored invalid config: {}", error);
            app_context
                .record_and_dispatch(
                    NewAuditEntry::new(
                        AuditAction::ConfigReloadRejected,
                        Severity::Warning,
                        "configuration change rejected, keeping last valid runtime settings",
                    )
                    .with_subject(config_path.display().to_string())
                    .with_metadata(json!({ "error": error })),
                )
                .await
        }
    }
}

pub(super) fn start_config_hot_reload_job(
    app_context: AppContext,
    config_path: PathBuf,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let mut watcher = match RecommendedWatcher::new(
            move |result| {
                let _ = tx.send(result);
            },
            NotifyConfig::default(),
        ) {
            Ok(watcher) => watcher,
            Err(error) => {
                log::warn!("config hot-reload disabled: watcher init failed: {}", error);
                return;
            }
        };

        if let Err(error) = watcher.watch(&config_path, RecursiveMode::NonRecursive) {
            log::warn!(
                "config hot-reload disabled: failed to watch {}: {}",
                config_path.display(),
                error
            );
            return;
        }

        loop {
            let event_result = tokio::select! {
                received = rx.recv() => match received {
                    Some(event_result) => event_result,
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };

            let event: notify::Event = match event_result {
                Ok(event) => event,
                Err(error) => {
                    log::warn!("config hot-reload event error: {}", error);
                    continue;
                }
            };

            let should_reload = matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any
            );
            if !should_reload {
                continue;
            }

            // Editors emit bursts of events per save; reload once.
            sleep(RELOAD_SETTLE).await;
            while rx.try_recv().is_ok() {}

            reload_and_record(&app_context, &config_path).await;
        }

        log::info!("config_reload_job_stopped");
    })
}

#[cfg(test)]
mod tests;
