use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;

use crate::audit::{AuditAction, AuditRecorder, NewAuditEntry, Severity};
use crate::config::{Config, RuntimeConfig};
use crate::dispatch::{Delivery, Dispatcher, Notification};

use super::super::{
    evaluator::evaluate_samples,
    history::HistoryStore,
    model::{AlertEvent, AlertTransition, EntityId, EntityReading, MetricSample, ResourceUsage},
    presence::{PresenceChange, PresenceTracker},
    provider::{HostProbe, ProbeError, ResourceProvider},
    state::{AlertBook, CooldownTracker},
};

const RECENT_ALERTS_LIMIT: usize = 100;

pub(crate) struct MonitorState {
    pub(crate) history: HistoryStore,
    pub(crate) alerts: AlertBook,
    pub(crate) presence: PresenceTracker,
    pub(crate) recent_alerts: VecDeque<AlertEvent>,
    pub(crate) muted_until: Option<DateTime<Utc>>,
    pub(crate) last_mute_action_at: Option<DateTime<Utc>>,
    pub(crate) last_tick_at: Option<DateTime<Utc>>,
}

impl MonitorState {
    fn new(history_capacity: usize, max_misses: u32) -> Self {
        Self {
            history: HistoryStore::new(history_capacity),
            alerts: AlertBook::default(),
            presence: PresenceTracker::new(max_misses),
            recent_alerts: VecDeque::with_capacity(RECENT_ALERTS_LIMIT),
            muted_until: None,
            last_mute_action_at: None,
            last_tick_at: None,
        }
    }

    pub(crate) fn is_muted(&self, now: DateTime<Utc>) -> bool {
        self.muted_until.is_some_and(|until| now < until)
    }

    fn remember_alert(&mut self, event: &AlertEvent) {
        while self.recent_alerts.len() >= RECENT_ALERTS_LIMIT {
            self.recent_alerts.pop_front();
        }
        self.recent_alerts.push_back(event.clone());
    }
}

/// What one sampling tick produced.
#[derive(Debug, Default)]
pub struct TickReport {
    pub samples: usize,
    pub suppressed: usize,
    pub notifications: Vec<Notification>,
}

struct PresenceEvent {
    entity_id: EntityId,
    name: Option<String>,
    change: PresenceChange,
}

/// Owns sampling, history, alert state and presence for all entities.
pub struct Monitor {
    pub(crate) state: Mutex<MonitorState>,
    host_probe: Mutex<Box<dyn HostProbe>>,
    provider: Mutex<Box<dyn ResourceProvider>>,
    runtime_config: Arc<RwLock<RuntimeConfig>>,
    probe_timeout_ms: u64,
    recorder: Arc<AuditRecorder>,
    dispatcher: Dispatcher,
}

impl Monitor {
    pub fn new(
        config: &Config,
        runtime_config: Arc<RwLock<RuntimeConfig>>,
        host_probe: Box<dyn HostProbe>,
        provider: Box<dyn ResourceProvider>,
        recorder: Arc<AuditRecorder>,
        dispatcher: Dispatcher,
    ) -> Self {
        let history_capacity = config.retention_window.capacity(config.sampling_interval_ms);
        Self {
            state: Mutex::new(MonitorState::new(
                history_capacity,
                config.max_consecutive_misses,
            )),
            host_probe: Mutex::new(host_probe),
            provider: Mutex::new(provider),
            runtime_config,
            probe_timeout_ms: config.probe_timeout_ms,
            recorder,
            dispatcher,
        }
    }

    pub async fn tick(&self) -> TickReport {
        self.tick_at(Utc::now()).await
    }

    /// Runs one full sampling tick as of `now`: read, append, evaluate,
    /// gate through cooldown, record and queue notifications.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> TickReport {
        let runtime_config = self.runtime_config.read().await.clone();
        let host_reading = self.read_host().await;
        let server_readings = self.read_servers().await;

        let mut report = TickReport::default();
        let mut admitted = Vec::new();
        let mut presence_events = Vec::new();
        let muted;
        {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let mut samples = Vec::new();

            let host = EntityId::host();
            match &host_reading {
                Ok(usage) => {
                    push_samples(&mut samples, &host, usage, now);
                    if let Some(change) = state.presence.record_success(&host) {
                        presence_events.push(PresenceEvent {
                            entity_id: host.clone(),
                            name: None,
                            change,
                        });
                    }
                }
                Err(error) => {
                    log::warn!("probe_failed source=host error={}", error);
                    if let Some(change) = state.presence.record_miss(&host) {
                        presence_events.push(PresenceEvent {
                            entity_id: host.clone(),
                            name: None,
                            change,
                        });
                    }
                }
            }

            match &server_readings {
                Ok(readings) => {
                    let mut seen = HashSet::new();
                    for reading in readings {
                        seen.insert(reading.entity_id.clone());
                        let change = match &reading.usage {
                            Some(usage) => {
                                push_samples(&mut samples, &reading.entity_id, usage, now);
                                state.presence.record_success(&reading.entity_id)
                            }
                            None => state.presence.record_miss(&reading.entity_id),
                        };
                        if let Some(change) = change {
                            presence_events.push(PresenceEvent {
                                entity_id: reading.entity_id.clone(),
                                name: Some(reading.name.clone()),
                                change,
                            });
                        }
                    }

                    for vanished in state
                        .presence
                        .known_servers()
                        .into_iter()
                        .filter(|id| !seen.contains(id))
                    {
                        if let Some(change) = state.presence.record_miss(&vanished) {
                            presence_events.push(PresenceEvent {
                                entity_id: vanished,
                                name: None,
                                change,
                            });
                        }
                    }
                }
                Err(error) => {
                    log::warn!("probe_failed source=resource_provider error={}", error);
                    for known in state.presence.known_servers() {
                        if let Some(change) = state.presence.record_miss(&known) {
                            presence_events.push(PresenceEvent {
                                entity_id: known,
                                name: None,
                                change,
                            });
                        }
                    }
                }
            }

            for sample in &samples {
                state
                    .history
                    .append(&sample.entity_id, sample.metric, sample.value, sample.taken_at);
            }
            report.samples = samples.len();

            let candidates =
                evaluate_samples(&mut state.alerts, &runtime_config.thresholds, &samples);
            let cooldown = CooldownTracker::from_millis(runtime_config.cooldown_ms);
            for event in candidates {
                let Some(alert_state) = state.alerts.get_mut(&event.key) else {
                    continue;
                };
                if cooldown.admit(alert_state, &event, now) {
                    state.remember_alert(&event);
                    admitted.push(event);
                } else {
                    report.suppressed += 1;
                }
            }

            state.last_tick_at = Some(now);
            muted = state.is_muted(now);
        }

        if let Ok(usage) = &host_reading {
            tracing::info!(
                target: "monitor",
                module = "monitor",
                cpu = usage.cpu,
                memory = usage.memory,
                disk = usage.disk,
                network = ?usage.network,
                samples = report.samples,
                alerts = admitted.len(),
                suppressed = report.suppressed,
                muted,
                "monitor_metrics"
            );
        }

        for event in admitted {
            let entry = self.recorder.record_at(alert_audit_entry(&event), now).await;
            let delivery = if muted {
                Delivery::LocalOnly
            } else {
                Delivery::All
            };
            let notification = Notification::alert(event, entry).with_delivery(delivery);
            self.dispatcher.dispatch(notification.clone()).await;
            report.notifications.push(notification);
        }

        for event in presence_events {
            let entry = self.recorder.record_at(presence_audit_entry(&event), now).await;
            let notification = Notification::audit(entry);
            self.dispatcher.dispatch(notification.clone()).await;
            report.notifications.push(notification);
        }

        report
    }

    async fn read_host(&self) -> Result<ResourceUsage, ProbeError> {
        let mut probe = self.host_probe.lock().await;
        match timeout(
            Duration::from_millis(self.probe_timeout_ms),
            probe.sample_host(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout {
                source_name: "host_probe",
                timeout_ms: self.probe_timeout_ms,
            }),
        }
    }

    async fn read_servers(&self) -> Result<Vec<EntityReading>, ProbeError> {
        let mut provider = self.provider.lock().await;
        match timeout(
            Duration::from_millis(self.probe_timeout_ms),
            provider.sample_entities(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout {
                source_name: "resource_provider",
                timeout_ms: self.probe_timeout_ms,
            }),
        }
    }
}

fn push_samples(
    samples: &mut Vec<MetricSample>,
    entity_id: &EntityId,
    usage: &ResourceUsage,
    taken_at: DateTime<Utc>,
) {
    samples.extend(usage.values().map(|(metric, value)| MetricSample {
        entity_id: entity_id.clone(),
        metric,
        value,
        taken_at,
    }));
}

fn alert_audit_entry(event: &AlertEvent) -> NewAuditEntry {
    let action = match event.transition {
        AlertTransition::Fired => AuditAction::AlertFired,
        AlertTransition::Repeated => AuditAction::AlertRepeated,
        AlertTransition::Cleared => AuditAction::AlertCleared,
    };

    NewAuditEntry::new(action, event.severity, event.summary())
        .with_subject(event.key.to_string())
        .with_metadata(json!({
            "entity_id": event.key.entity_id.as_str(),
            "metric": event.key.metric.as_str(),
            "value": event.value,
            "threshold": event.threshold,
            "first_breach_at": event.first_breach_at.to_rfc3339(),
        }))
}

fn presence_audit_entry(event: &PresenceEvent) -> NewAuditEntry {
    let label = event
        .name
        .clone()
        .unwrap_or_else(|| event.entity_id.to_string());

    match event.change {
        PresenceChange::WentOffline { misses } => {
            let severity = if event.entity_id.is_host() {
                Severity::Critical
            } else {
                Severity::Error
            };
            NewAuditEntry::new(
                AuditAction::ServerOffline,
                severity,
                format!("{} stopped reporting after {} missed samples", label, misses),
            )
            .with_subject(event.entity_id.as_str())
            .with_metadata(json!({
                "entity_id": event.entity_id.as_str(),
                "misses": misses,
            }))
        }
        PresenceChange::Recovered => NewAuditEntry::new(
            AuditAction::ServerRecovered,
            Severity::Info,
            format!("{} is reporting again", label),
        )
        .with_subject(event.entity_id.as_str())
        .with_metadata(json!({ "entity_id": event.entity_id.as_str() })),
    }
}
