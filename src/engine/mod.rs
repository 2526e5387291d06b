use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::json;
use thiserror::Error;
use tokio::sync::{Mutex, Notify, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::app_context::AppContext;
use crate::audit::{
    AuditAction, AuditEntry, AuditFilter, AuditRecorder, NewAuditEntry, Severity,
};
use crate::audit_store::{DurableStore, SledAuditStore, StoreError};
use crate::config::{Config, ConfigError, RuntimeConfig};
use crate::dispatch::sinks::{ChatChannelSink, ConsoleSink, Sink, StoreSink};
use crate::dispatch::Dispatcher;
use crate::jobs::start_background_jobs;
use crate::monitor::{
    AlertEvent, AlertKey, AlertSnapshot, EntityId, HostProbe, Metric, MetricSample, Monitor,
    MuteActionError, NoResourceProvider, ResourceProvider, SimulatedHostProbe,
    SimulatedResourceProvider, SystemHostProbe,
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The injectable capabilities an engine runs on.
pub struct EngineParts {
    pub host_probe: Box<dyn HostProbe>,
    pub provider: Box<dyn ResourceProvider>,
    pub store: Option<Arc<dyn DurableStore>>,
    pub sinks: Vec<Arc<dyn Sink>>,
}

impl EngineParts {
    /// Real probes, or simulated ones when `simulation.enabled`, plus the
    /// sinks switched on in `[sinks]`.
    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        let store: Option<Arc<dyn DurableStore>> = if config.sinks.durable_store {
            Some(Arc::new(SledAuditStore::open(&config.audit.store_path)?))
        } else {
            None
        };

        let (host_probe, provider): (Box<dyn HostProbe>, Box<dyn ResourceProvider>) =
            if config.simulation.enabled {
                (
                    Box::new(SimulatedHostProbe::new()),
                    Box::new(SimulatedResourceProvider::new(
                        config.simulation.server_count,
                    )),
                )
            } else {
                (
                    Box::new(SystemHostProbe::new(config.network_capacity_mbit)),
                    Box::new(NoResourceProvider),
                )
            };

        let sinks = build_sinks(config, store.as_ref())?;

        Ok(Self {
            host_probe,
            provider,
            store,
            sinks,
        })
    }
}

fn build_sinks(
    config: &Config,
    store: Option<&Arc<dyn DurableStore>>,
) -> Result<Vec<Arc<dyn Sink>>, ConfigError> {
    let mut sinks: Vec<Arc<dyn Sink>> = Vec::new();

    if config.sinks.console {
        sinks.push(Arc::new(ConsoleSink::new()));
    }
    if config.sinks.durable_store
        && let Some(store) = store
    {
        sinks.push(Arc::new(StoreSink::new(store.clone())));
    }
    if config.sinks.chat_channel {
        let chat_id = config.chat_channel_id()?;
        let bot_token = config.sinks.bot_token.as_deref().ok_or_else(|| {
            ConfigError::Validation("sinks.bot_token is required for the chat channel".to_string())
        })?;
        sinks.push(Arc::new(ChatChannelSink::new(
            bot_token,
            chat_id,
            config.sinks.chat_min_severity,
        )));
    }

    Ok(sinks)
}

enum Lifecycle {
    Idle,
    Running(Vec<JoinHandle<()>>),
    Stopped,
}

/// One self-contained monitoring engine. Several can live in one process
/// without sharing any state.
pub struct Engine {
    context: AppContext,
    shutdown_tx: watch::Sender<bool>,
    lifecycle: Mutex<Lifecycle>,
}

impl Engine {
    pub fn from_config(config: Config, config_path: Option<PathBuf>) -> Result<Self, EngineError> {
        let parts = EngineParts::from_config(&config)?;
        Self::new(config, config_path, parts)
    }

    pub fn new(
        config: Config,
        config_path: Option<PathBuf>,
        parts: EngineParts,
    ) -> Result<Self, EngineError> {
        let recorder = Arc::new(AuditRecorder::new(&config.audit, parts.store)?);
        let dispatcher = Dispatcher::new(&config.dispatch, parts.sinks, recorder.clone());
        let runtime_config = Arc::new(RwLock::new(RuntimeConfig::from_config(&config)));
        let monitor = Arc::new(Monitor::new(
            &config,
            runtime_config.clone(),
            parts.host_probe,
            parts.provider,
            recorder.clone(),
            dispatcher.clone(),
        ));
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            context: AppContext {
                config,
                config_path,
                runtime_config,
                runtime_update_notify: Arc::new(Notify::new()),
                monitor,
                recorder,
                dispatcher,
            },
            shutdown_tx,
            lifecycle: Mutex::new(Lifecycle::Idle),
        })
    }

    pub(crate) fn context(&self) -> &AppContext {
        &self.context
    }

    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.context.monitor
    }

    /// Starts the dispatch worker and the background jobs. Only the first
    /// call on an idle engine has any effect.
    pub async fn start(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if !matches!(*lifecycle, Lifecycle::Idle) {
            return;
        }

        self.context.dispatcher.start().await;
        self.context
            .record_and_dispatch(
                NewAuditEntry::new(
                    AuditAction::SystemStartup,
                    Severity::Info,
                    "monitoring engine started",
                )
                .with_metadata(json!({
                    "sampling_interval_ms": self.context.config.sampling_interval_ms,
                    "sinks": self.context.dispatcher.sink_names(),
                    "durable_store": self.context.recorder.has_store(),
                })),
            )
            .await;

        let handles = start_background_jobs(self.context.clone(), self.shutdown_tx.subscribe());
        log::info!("engine_started jobs={}", handles.len());
        *lifecycle = Lifecycle::Running(handles);
    }

    /// Stops the jobs, records the shutdown and drains the dispatch queue
    /// within the configured grace period.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if !matches!(*lifecycle, Lifecycle::Running(_)) {
            return;
        }
        let Lifecycle::Running(handles) = std::mem::replace(&mut *lifecycle, Lifecycle::Stopped)
        else {
            return;
        };

        self.shutdown_tx.send_replace(true);
        for handle in handles {
            if let Err(error) = handle.await {
                log::warn!("background_job_join_failed error={}", error);
            }
        }

        self.context
            .record_and_dispatch(NewAuditEntry::new(
                AuditAction::SystemShutdown,
                Severity::Info,
                "monitoring engine stopped",
            ))
            .await;

        let grace = Duration::from_millis(self.context.config.dispatch.shutdown_grace_ms);
        self.context.dispatcher.shutdown(grace).await;

        if let Err(error) = self.context.recorder.flush() {
            log::warn!("audit_store_flush_failed error={}", error);
        }
        log::info!("engine_stopped");
    }

    pub async fn recent_alerts(&self, limit: usize) -> Vec<AlertEvent> {
        self.context.monitor.recent_alerts(limit).await
    }

    pub async fn entity_history(
        &self,
        entity_id: &EntityId,
        metric: Metric,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Vec<MetricSample> {
        self.context
            .monitor
            .entity_history(entity_id, metric, Some(since), Some(until))
            .await
    }

    pub async fn audit_log(&self, filter: &AuditFilter, limit: usize) -> Vec<AuditEntry> {
        self.context.recorder.query(filter, limit).await
    }

    pub async fn alert_snapshot(&self) -> AlertSnapshot {
        self.context.monitor.alert_snapshot().await
    }

    pub async fn current_runtime_config(&self) -> RuntimeConfig {
        self.context.runtime_config.read().await.clone()
    }

    pub async fn mute_alerts_for(
        &self,
        actor: &str,
        duration: ChronoDuration,
    ) -> Result<DateTime<Utc>, MuteActionError> {
        let until = self.context.monitor.mute_alerts_for(duration).await?;
        self.context
            .record_and_dispatch(
                NewAuditEntry::new(
                    AuditAction::UserAction,
                    Severity::Info,
                    format!("alerts muted until {}", until.to_rfc3339()),
                )
                .with_actor(actor)
                .with_subject("mute")
                .with_metadata(json!({
                    "muted_until": until.to_rfc3339(),
                    "duration_secs": duration.num_seconds(),
                })),
            )
            .await;
        Ok(until)
    }

    pub async fn unmute_alerts(&self, actor: &str) -> Result<(), MuteActionError> {
        self.context.monitor.unmute_alerts().await?;
        self.context
            .record_and_dispatch(
                NewAuditEntry::new(AuditAction::UserAction, Severity::Info, "alerts unmuted")
                    .with_actor(actor)
                    .with_subject("mute"),
            )
            .await;
        Ok(())
    }

    /// Drops the alert state for `key`; recorded only when there was state.
    pub async fn reset_alert(&self, actor: &str, key: &AlertKey) -> bool {
        let reset = self.context.monitor.reset_alert(key).await;
        if reset {
            self.context
                .record_and_dispatch(
                    NewAuditEntry::new(
                        AuditAction::UserAction,
                        Severity::Info,
                        format!("alert state for {} reset", key),
                    )
                    .with_actor(actor)
                    .with_subject(key.to_string()),
                )
                .await;
        }
        reset
    }

    /// Records an externally reported event and queues it for every sink.
    pub async fn record_event(&self, entry: NewAuditEntry) -> AuditEntry {
        self.context.record_and_dispatch(entry).await
    }
}
