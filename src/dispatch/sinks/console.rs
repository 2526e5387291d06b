use async_trait::async_trait;

use crate::audit::Severity;
use crate::dispatch::notification::Notification;

use super::{Sink, SinkError, SinkKind};

/// Writes notifications into the structured log.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }

    pub(crate) fn emit(notification: &Notification) {
        let entry = notification.entry();
        let subject = entry.subject.as_deref().unwrap_or("-");
        let headline = notification.headline();
        match entry.severity {
            Severity::Info => tracing::info!(
                target: "audit",
                id = entry.id,
                action = entry.action.as_str(),
                severity = entry.severity.as_str(),
                subject,
                "{}",
                headline
            ),
            Severity::Warning => tracing::warn!(
                target: "audit",
                id = entry.id,
                action = entry.action.as_str(),
                severity = entry.severity.as_str(),
                subject,
                "{}",
                headline
            ),
            Severity::Error | Severity::Critical => tracing::error!(
                target: "audit",
                id = entry.id,
                action = entry.action.as_str(),
                severity = entry.severity.as_str(),
                subject,
                "{}",
                headline
            ),
        }
    }
}

#[async_trait]
impl Sink for ConsoleSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Console
    }

    fn name(&self) -> &str {
        "console"
    }

    async fn notify(&self, notification: &Notification) -> Result<(), SinkError> {
        Self::emit(notification);
        Ok(())
    }
}
