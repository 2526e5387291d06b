use chrono::{DateTime, Utc};
use serde::Serialize;

use super::super::{
    model::{AlertEvent, AlertKey, EntityId, Metric, MetricSample},
    presence::Presence,
};
use super::core::Monitor;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertKeySnapshot {
    pub key: AlertKey,
    pub active: bool,
    pub consecutive_breach_count: u32,
    pub last_fired_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityPresenceSnapshot {
    pub entity_id: EntityId,
    pub presence: Presence,
    pub consecutive_misses: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertSnapshot {
    pub alerts: Vec<AlertKeySnapshot>,
    pub entities: Vec<EntityPresenceSnapshot>,
    pub muted_until: Option<DateTime<Utc>>,
    pub last_tick_at: Option<DateTime<Utc>>,
}

impl AlertSnapshot {
    pub fn active_count(&self) -> usize {
        self.alerts.iter().filter(|alert| alert.active).count()
    }
}

impl Monitor {
    pub async fn alert_snapshot(&self) -> AlertSnapshot {
        let state = self.state.lock().await;

        let mut alerts = state
            .alerts
            .iter()
            .map(|(key, alert)| AlertKeySnapshot {
                key: key.clone(),
                active: alert.is_active(),
                consecutive_breach_count: alert.consecutive_breach_count(),
                last_fired_at: alert.last_fired_at(),
            })
            .collect::<Vec<_>>();
        alerts.sort_by(|a, b| a.key.cmp(&b.key));

        let entities = state
            .presence
            .entities()
            .into_iter()
            .map(|(entity_id, presence, consecutive_misses)| EntityPresenceSnapshot {
                entity_id,
                presence,
                consecutive_misses,
            })
            .collect();

        AlertSnapshot {
            alerts,
            entities,
            muted_until: state.muted_until.filter(|until| Utc::now() < *until),
            last_tick_at: state.last_tick_at,
        }
    }

    /// Dispatched alert events, newest first.
    pub async fn recent_alerts(&self, limit: usize) -> Vec<AlertEvent> {
        let state = self.state.lock().await;
        state.recent_alerts.iter().rev().take(limit).cloned().collect()
    }

    pub async fn entity_history(
        &self,
        entity_id: &EntityId,
        metric: Metric,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Vec<MetricSample> {
        let state = self.state.lock().await;
        state.history.range(entity_id, metric, since, until)
    }

    pub async fn latest_window(
        &self,
        entity_id: &EntityId,
        metric: Metric,
        n: usize,
    ) -> Vec<MetricSample> {
        let state = self.state.lock().await;
        state.history.window(entity_id, metric, n)
    }

    /// Forgets the alert state for `key`, so the next breach starts from
    /// idle. Returns whether there was any state to forget.
    pub async fn reset_alert(&self, key: &AlertKey) -> bool {
        let mut state = self.state.lock().await;
        state.alerts.reset(key)
    }

    pub async fn tracked_entities(&self) -> Vec<EntityId> {
        let state = self.state.lock().await;
        state.history.entities()
    }
}
