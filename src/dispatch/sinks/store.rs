use std::sync::Arc;

use async_trait::async_trait;

use crate::audit_store::DurableStore;
use crate::dispatch::notification::Notification;

use super::{Sink, SinkError, SinkKind};

/// Makes sure the entry behind a notification reached the durable store.
/// The recorder already writes through, so this normally finds the entry
/// present and leaves it untouched.
pub struct StoreSink {
    store: Arc<dyn DurableStore>,
}

impl StoreSink {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Sink for StoreSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Store
    }

    fn name(&self) -> &str {
        "durable_store"
    }

    async fn notify(&self, notification: &Notification) -> Result<(), SinkError> {
        let entry = notification.entry();
        if self.store.write_audit_entry(entry)? {
            log::info!("audit_store_backfilled id={} action={}", entry.id, entry.action);
        }
        Ok(())
    }
}
