use std::time::Duration;

use tokio::time::{sleep, timeout};

use crate::config::DispatchConfig;

use super::notification::Notification;
use super::sinks::{Sink, SinkError};

const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.backoff_ms),
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms.max(1)),
        }
    }

    /// Wait before attempt `attempt + 1`, doubling each time.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }

    /// Delivers to one sink, retrying failures and timeouts. On success
    /// returns the number of attempts used.
    pub async fn deliver(
        &self,
        sink: &dyn Sink,
        notification: &Notification,
    ) -> Result<u32, (u32, SinkError)> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match timeout(self.attempt_timeout, sink.notify(notification)).await {
                Ok(Ok(())) => return Ok(attempt),
                Ok(Err(error)) => error,
                Err(_) => SinkError::Timeout {
                    timeout_ms: self.attempt_timeout.as_millis() as u64,
                },
            };

            if attempt >= self.max_attempts {
                return Err((attempt, error));
            }

            log::warn!(
                "sink_delivery_retry sink={} entry_id={} attempt={} error={}",
                sink.name(),
                notification.entry().id,
                attempt,
                error
            );
            sleep(self.backoff_after(attempt)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::RetryPolicy;

    #[test]
    fn backoff_doubles_and_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(1),
        };

        assert_eq!(policy.backoff_after(1), Duration::from_millis(500));
        assert_eq!(policy.backoff_after(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff_after(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff_after(40), Duration::from_secs(60));
    }
}
