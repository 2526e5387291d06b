use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::audit::{AuditEntry, AuditFilter};

mod memory;
mod persistent;

pub use memory::MemoryAuditStore;
pub use persistent::SledAuditStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("audit store backend error: {0}")]
    Backend(#[from] sled::Error),
    #[error("failed to encode audit entry {id}: {source}")]
    Encode {
        id: u64,
        source: serde_json::Error,
    },
    #[error("audit store unavailable: {0}")]
    Unavailable(String),
}

/// Persistent side of the audit trail. Entries are append-only: a write
/// for an id that already exists leaves the stored entry untouched.
pub trait DurableStore: Send + Sync {
    /// Returns `false` when an entry with the same id was already stored.
    fn write_audit_entry(&self, entry: &AuditEntry) -> Result<bool, StoreError>;

    /// Matching entries, newest first.
    fn query_audit_entries(
        &self,
        filter: &AuditFilter,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, StoreError>;

    fn delete_audit_entries_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;

    fn last_audit_id(&self) -> Result<Option<u64>, StoreError>;

    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests;
