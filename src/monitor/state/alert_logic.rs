use chrono::{DateTime, Utc};

use crate::audit::Severity;
use crate::config::ThresholdConfig;
use crate::monitor::model::{AlertEvent, AlertKey, AlertTransition};

use super::AlertState;

impl AlertState {
    /// Feeds one fresh sample through the enter/clear state machine and
    /// returns the candidate event it produces, if any.
    pub(crate) fn observe(
        &mut self,
        key: &AlertKey,
        value: f32,
        threshold: &ThresholdConfig,
        taken_at: DateTime<Utc>,
    ) -> Option<AlertEvent> {
        let breaching = value > threshold.enter_value;
        let required = threshold.consecutive_breaches.max(1);

        if !self.active {
            if !breaching {
                self.consecutive_breach_count = 0;
                self.first_breach_at = None;
                return None;
            }

            self.consecutive_breach_count = self.consecutive_breach_count.saturating_add(1);
            let first_breach_at = *self.first_breach_at.get_or_insert(taken_at);
            if self.consecutive_breach_count < required {
                return None;
            }

            self.active = true;
            return Some(AlertEvent {
                key: key.clone(),
                transition: AlertTransition::Fired,
                severity: threshold.severity,
                value,
                threshold: threshold.enter_value,
                first_breach_at,
                fired_at: taken_at,
            });
        }

        let first_breach_at = self.first_breach_at.unwrap_or(taken_at);
        let clear_value = threshold.effective_clear_value();
        if value <= clear_value {
            self.active = false;
            self.consecutive_breach_count = 0;
            self.first_breach_at = None;
            return Some(AlertEvent {
                key: key.clone(),
                transition: AlertTransition::Cleared,
                severity: Severity::Info,
                value,
                threshold: clear_value,
                first_breach_at,
                fired_at: taken_at,
            });
        }

        if breaching {
            self.consecutive_breach_count = self.consecutive_breach_count.saturating_add(1);
            return Some(AlertEvent {
                key: key.clone(),
                transition: AlertTransition::Repeated,
                severity: threshold.severity,
                value,
                threshold: threshold.enter_value,
                first_breach_at,
                fired_at: taken_at,
            });
        }

        // Inside the hysteresis band: stay active without a new event.
        None
    }
}
