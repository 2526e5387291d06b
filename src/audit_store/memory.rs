use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};

use crate::audit::{AuditEntry, AuditFilter};

use super::{DurableStore, StoreError};

/// In-process store for deployments without a data directory and for tests.
/// It can be switched into a failing mode to exercise degraded paths.
#[derive(Default)]
pub struct MemoryAuditStore {
    entries: Mutex<BTreeMap<u64, AuditEntry>>,
    unavailable: AtomicBool,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<u64, AuditEntry>>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl DurableStore for MemoryAuditStore {
    fn write_audit_entry(&self, entry: &AuditEntry) -> Result<bool, StoreError> {
        let mut entries = self.entries()?;
        if entries.contains_key(&entry.id) {
            return Ok(false);
        }
        entries.insert(entry.id, entry.clone());
        Ok(true)
    }

    fn query_audit_entries(
        &self,
        filter: &AuditFilter,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        let entries = self.entries()?;
        Ok(entries
            .values()
            .rev()
            .filter(|entry| filter.matches(entry))
            .take(limit)
            .cloned()
            .collect())
    }

    fn delete_audit_entries_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|_, entry| entry.created_at >= cutoff);
        Ok(before - entries.len())
    }

    fn last_audit_id(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.entries()?.keys().next_back().copied())
    }
}
