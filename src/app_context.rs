use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Notify, RwLock};

use crate::audit::{AuditEntry, AuditRecorder, NewAuditEntry};
use crate::config::{Config, RuntimeConfig};
use crate::dispatch::{Dispatcher, Notification};
use crate::monitor::Monitor;

/// Shared handles passed to background jobs.
#[derive(Clone)]
pub struct AppContext {
    pub config: Config,
    pub config_path: Option<PathBuf>,
    pub runtime_config: Arc<RwLock<RuntimeConfig>>,
    pub runtime_update_notify: Arc<Notify>,
    pub monitor: Arc<Monitor>,
    pub recorder: Arc<AuditRecorder>,
    pub dispatcher: Dispatcher,
}

impl AppContext {
    pub async fn update_runtime_config(&self, runtime_config: RuntimeConfig) {
        {
            let mut current = self.runtime_config.write().await;
            *current = runtime_config;
        }
        self.runtime_update_notify.notify_waiters();
    }

    /// Records an entry and queues it for every sink.
    pub async fn record_and_dispatch(&self, entry: NewAuditEntry) -> AuditEntry {
        let entry = self.recorder.record(entry).await;
        self.dispatcher
            .dispatch(Notification::audit(entry.clone()))
            .await;
        entry
    }
}
