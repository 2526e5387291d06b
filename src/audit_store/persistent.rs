use std::path::Path;

use chrono::{DateTime, Utc};

use crate::audit::{AuditEntry, AuditFilter};

use super::{DurableStore, StoreError};

/// sled-backed audit trail.
///
/// `entries` maps the big-endian id to the JSON entry; `by_time` maps
/// `created_at` millis followed by the id to nothing and drives pruning.
#[derive(Clone)]
pub struct SledAuditStore {
    entries: sled::Tree,
    by_time: sled::Tree,
}

impl SledAuditStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::from_db(&db)
    }

    pub fn from_db(db: &sled::Db) -> Result<Self, StoreError> {
        Ok(Self {
            entries: db.open_tree("audit_entries")?,
            by_time: db.open_tree("audit_by_time")?,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Walks the time index newest first, so a bounded window never
    /// depends on ids following timestamps.
    fn query_by_time(
        &self,
        filter: &AuditFilter,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        let lower = filter
            .since
            .map(|since| time_key(since, 0))
            .unwrap_or([0u8; 16]);
        let upper = filter
            .until
            .map(|until| time_key(until, u64::MAX))
            .unwrap_or([u8::MAX; 16]);
        if lower > upper {
            return Ok(Vec::new());
        }

        let mut matched = Vec::new();
        for key in self.by_time.range(lower..=upper).keys().rev() {
            let key = key?;
            let Some(id) = key.get(8..).and_then(id_from_key) else {
                continue;
            };
            let Some(entry) = self
                .entries
                .get(id.to_be_bytes())?
                .and_then(|value| Self::decode(&value))
            else {
                continue;
            };
            if filter.matches(&entry) {
                matched.push(entry);
                if matched.len() >= limit {
                    break;
                }
            }
        }

        Ok(matched)
    }

    fn decode(value: &[u8]) -> Option<AuditEntry> {
        match serde_json::from_slice::<AuditEntry>(value) {
            Ok(entry) => Some(entry),
            Err(error) => {
                log::warn!("audit_store_decode_failed error={}", error);
                None
            }
        }
    }
}

fn time_key(created_at: DateTime<Utc>, id: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&created_at.timestamp_millis().to_be_bytes());
    key[8..].copy_from_slice(&id.to_be_bytes());
    key
}

fn id_from_key(key: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = key.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

impl DurableStore for SledAuditStore {
    fn write_audit_entry(&self, entry: &AuditEntry) -> Result<bool, StoreError> {
        let value = serde_json::to_vec(entry).map_err(|source| StoreError::Encode {
            id: entry.id,
            source,
        })?;

        let inserted = self
            .entries
            .compare_and_swap(entry.id.to_be_bytes(), None as Option<&[u8]>, Some(value))?
            .is_ok();
        if inserted {
            self.by_time
                .insert(time_key(entry.created_at, entry.id), &[] as &[u8])?;
        }

        Ok(inserted)
    }

    fn query_audit_entries(
        &self,
        filter: &AuditFilter,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        if let Some(id) = filter.id {
            let entry = self
                .entries
                .get(id.to_be_bytes())?
                .and_then(|value| Self::decode(&value))
                .filter(|entry| filter.matches(entry));
            return Ok(entry.into_iter().collect());
        }

        if filter.since.is_some() || filter.until.is_some() {
            return self.query_by_time(filter, limit);
        }

        let mut matched = Vec::new();
        for item in self.entries.iter().rev() {
            let (_, value) = item?;
            let Some(entry) = Self::decode(&value) else {
                continue;
            };
            if filter.matches(&entry) {
                matched.push(entry);
                if matched.len() >= limit {
                    break;
                }
            }
        }

        Ok(matched)
    }

    fn delete_audit_entries_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let cutoff_millis = cutoff.timestamp_millis();
        let cutoff_prefix = cutoff_millis.to_be_bytes();
        let bucket_end = cutoff_millis.saturating_add(1).to_be_bytes();
        let candidates = self
            .by_time
            .range(..bucket_end.as_slice())
            .keys()
            .collect::<Result<Vec<_>, _>>()?;

        let mut removed = 0;
        for key in candidates {
            let Some(id) = key.get(8..).and_then(id_from_key) else {
                self.by_time.remove(key)?;
                continue;
            };

            // Keys only carry millis; the cutoff's own millisecond needs the
            // stored timestamp to decide.
            if key.get(..8) == Some(cutoff_prefix.as_slice()) {
                let still_fresh = self
                    .entries
                    .get(id.to_be_bytes())?
                    .and_then(|value| Self::decode(&value))
                    .is_some_and(|entry| entry.created_at >= cutoff);
                if still_fresh {
                    continue;
                }
            }

            if self.entries.remove(id.to_be_bytes())?.is_some() {
                removed += 1;
            }
            self.by_time.remove(key)?;
        }

        Ok(removed)
    }

    fn last_audit_id(&self) -> Result<Option<u64>, StoreError> {
        Ok(self
            .entries
            .last()?
            .and_then(|(key, _)| id_from_key(&key)))
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.entries.flush()?;
        self.by_time.flush()?;
        Ok(())
    }
}
