use std::collections::HashMap;

use serde::Serialize;

use super::model::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Online,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceChange {
    WentOffline { misses: u32 },
    Recovered,
}

#[derive(Debug, Default)]
struct PresenceRecord {
    misses: u32,
    unknown: bool,
}

/// Consecutive-miss counters per entity.
#[derive(Debug)]
pub struct PresenceTracker {
    records: HashMap<EntityId, PresenceRecord>,
    max_misses: u32,
}

impl PresenceTracker {
    pub fn new(max_misses: u32) -> Self {
        Self {
            records: HashMap::new(),
            max_misses: max_misses.max(1),
        }
    }

    pub fn record_success(&mut self, entity_id: &EntityId) -> Option<PresenceChange> {
        let record = self.records.entry(entity_id.clone()).or_default();
        record.misses = 0;
        if record.unknown {
            record.unknown = false;
            return Some(PresenceChange::Recovered);
        }
        None
    }

    /// Reports `WentOffline` once per outage, on the miss that reaches the limit.
    pub fn record_miss(&mut self, entity_id: &EntityId) -> Option<PresenceChange> {
        let record = self.records.entry(entity_id.clone()).or_default();
        record.misses = record.misses.saturating_add(1);
        if !record.unknown && record.misses >= self.max_misses {
            record.unknown = true;
            return Some(PresenceChange::WentOffline {
                misses: record.misses,
            });
        }
        None
    }

    pub fn presence(&self, entity_id: &EntityId) -> Option<Presence> {
        self.records.get(entity_id).map(|record| {
            if record.unknown {
                Presence::Unknown
            } else {
                Presence::Online
            }
        })
    }

    pub fn misses(&self, entity_id: &EntityId) -> u32 {
        self.records
            .get(entity_id)
            .map(|record| record.misses)
            .unwrap_or(0)
    }

    /// Tracked game-server entities, sorted. The host is excluded.
    pub fn known_servers(&self) -> Vec<EntityId> {
        let mut ids = self
            .records
            .keys()
            .filter(|id| !id.is_host())
            .cloned()
            .collect::<Vec<_>>();
        ids.sort();
        ids
    }

    pub fn entities(&self) -> Vec<(EntityId, Presence, u32)> {
        let mut entries = self
            .records
            .iter()
            .map(|(id, record)| {
                let presence = if record.unknown {
                    Presence::Unknown
                } else {
                    Presence::Online
                };
                (id.clone(), presence, record.misses)
            })
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
