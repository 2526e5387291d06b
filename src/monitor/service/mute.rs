use chrono::{DateTime, Duration as ChronoDuration, Utc};
use thiserror::Error;

use super::core::{Monitor, MonitorState};

const MUTE_ACTION_COOLDOWN_SECS: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MuteActionError {
    #[error("mute settings changed too recently, retry in {retry_after_secs}s")]
    Cooldown { retry_after_secs: i64 },
}

fn ensure_mute_action_allowed(
    state: &mut MonitorState,
    now: DateTime<Utc>,
) -> Result<(), MuteActionError> {
    if let Some(last) = state.last_mute_action_at {
        let remaining = MUTE_ACTION_COOLDOWN_SECS - now.signed_duration_since(last).num_seconds();
        if remaining > 0 {
            return Err(MuteActionError::Cooldown {
                retry_after_secs: remaining,
            });
        }
    }

    state.last_mute_action_at = Some(now);
    Ok(())
}

impl Monitor {
    /// Keeps alert notifications off remote sinks until the returned time.
    pub async fn mute_alerts_for(
        &self,
        duration: ChronoDuration,
    ) -> Result<DateTime<Utc>, MuteActionError> {
        let now = Utc::now();
        let until = now + duration;
        let mut state = self.state.lock().await;
        ensure_mute_action_allowed(&mut state, now)?;
        state.muted_until = Some(until);
        Ok(until)
    }

    pub async fn unmute_alerts(&self) -> Result<(), MuteActionError> {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        ensure_mute_action_allowed(&mut state, now)?;
        state.muted_until = None;
        Ok(())
    }

    pub async fn muted_until(&self) -> Option<DateTime<Utc>> {
        let state = self.state.lock().await;
        state.muted_until.filter(|until| Utc::now() < *until)
    }
}
