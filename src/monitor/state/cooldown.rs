use chrono::{DateTime, Duration, Utc};

use crate::monitor::model::AlertEvent;

use super::AlertState;

/// Bounds repeat notifications of an active alert to one per cooldown window.
#[derive(Debug, Clone, Copy)]
pub struct CooldownTracker {
    cooldown: Duration,
}

impl CooldownTracker {
    pub fn from_millis(cooldown_ms: u64) -> Self {
        Self {
            cooldown: Duration::milliseconds(i64::try_from(cooldown_ms).unwrap_or(i64::MAX)),
        }
    }

    /// Returns whether `event` may be dispatched, stamping `last_fired_at`
    /// when it is.
    pub fn admit(&self, state: &mut AlertState, event: &AlertEvent, now: DateTime<Utc>) -> bool {
        if !event.transition.is_edge()
            && let Some(last) = state.last_fired_at
            && now.signed_duration_since(last) < self.cooldown
        {
            return false;
        }

        state.last_fired_at = Some(now);
        true
    }
}
