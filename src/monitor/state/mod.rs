use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::model::AlertKey;

mod alert_logic;
mod cooldown;

pub use cooldown::CooldownTracker;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlertState {
    pub(crate) active: bool,
    pub(crate) consecutive_breach_count: u32,
    pub(crate) first_breach_at: Option<DateTime<Utc>>,
    pub(crate) last_fired_at: Option<DateTime<Utc>>,
}

impl AlertState {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn consecutive_breach_count(&self) -> u32 {
        self.consecutive_breach_count
    }

    pub fn last_fired_at(&self) -> Option<DateTime<Utc>> {
        self.last_fired_at
    }
}

/// Alert states keyed by `(entity, metric)`, created on the first breach.
#[derive(Debug, Default)]
pub struct AlertBook {
    states: HashMap<AlertKey, AlertState>,
}

impl AlertBook {
    pub fn get(&self, key: &AlertKey) -> Option<&AlertState> {
        self.states.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: &AlertKey) -> Option<&mut AlertState> {
        self.states.get_mut(key)
    }

    pub(crate) fn entry(&mut self, key: AlertKey) -> &mut AlertState {
        self.states.entry(key).or_default()
    }

    pub fn reset(&mut self, key: &AlertKey) -> bool {
        self.states.remove(key).is_some()
    }

    pub fn active_keys(&self) -> Vec<AlertKey> {
        let mut keys = self
            .states
            .iter()
            .filter(|(_, state)| state.active)
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>();
        keys.sort();
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AlertKey, &AlertState)> {
        self.states.iter()
    }
}
