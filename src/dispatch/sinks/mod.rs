use async_trait::async_trait;
use thiserror::Error;

use crate::audit_store::StoreError;

use super::notification::Notification;

mod chat;
mod console;
mod store;

pub use chat::{ChatChannelSink, format_chat_message};
pub use console::ConsoleSink;
pub use store::StoreSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Console,
    Store,
    Chat,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("delivery timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("chat delivery failed: {0}")]
    Chat(String),
    #[error("{0}")]
    Rejected(String),
}

/// A destination for notifications.
#[async_trait]
pub trait Sink: Send + Sync {
    fn kind(&self) -> SinkKind;

    fn name(&self) -> &str;

    /// Whether this sink wants the notification at all.
    fn accepts(&self, notification: &Notification) -> bool {
        let _ = notification;
        true
    }

    async fn notify(&self, notification: &Notification) -> Result<(), SinkError>;
}
