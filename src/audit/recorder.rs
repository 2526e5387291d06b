use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::Mutex;

use crate::audit_store::{DurableStore, StoreError};
use crate::config::AuditConfig;

use super::cache::RecentAuditCache;
use super::detail::apply_detail_level;
use super::model::{AuditEntry, AuditFilter, DetailLevel, NewAuditEntry};

pub struct AuditRecorder {
    detail_level: DetailLevel,
    retention_days: u16,
    next_id: AtomicU64,
    cache: Mutex<RecentAuditCache>,
    store: Option<Arc<dyn DurableStore>>,
}

impl AuditRecorder {
    /// Seeds the id sequence past whatever the store already holds.
    pub fn new(
        config: &AuditConfig,
        store: Option<Arc<dyn DurableStore>>,
    ) -> Result<Self, StoreError> {
        let last_id = match &store {
            Some(store) => store.last_audit_id()?.unwrap_or(0),
            None => 0,
        };

        Ok(Self {
            detail_level: config.detail_level,
            retention_days: config.retention_days,
            next_id: AtomicU64::new(last_id.saturating_add(1)),
            cache: Mutex::new(RecentAuditCache::new(config.cache_size)),
            store,
        })
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    pub fn retention_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - ChronoDuration::days(i64::from(self.retention_days))
    }

    pub async fn record(&self, entry: NewAuditEntry) -> AuditEntry {
        self.record_at(entry, Utc::now()).await
    }

    pub async fn record_at(&self, entry: NewAuditEntry, now: DateTime<Utc>) -> AuditEntry {
        let mut cache = self.cache.lock().await;
        // Assigned under the cache lock so ids and timestamps never run
        // backwards relative to each other.
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let created_at = cache
            .latest_created_at()
            .map_or(now, |latest| latest.max(now));
        let entry = AuditEntry {
            id,
            action: entry.action,
            severity: entry.severity,
            actor: entry.actor,
            subject: entry.subject,
            message: entry.message,
            metadata: apply_detail_level(self.detail_level, entry.metadata),
            created_at,
        };

        if let Some(store) = &self.store
            && let Err(error) = store.write_audit_entry(&entry)
        {
            log::warn!(
                "audit_write_through_failed id={} action={} error={}",
                entry.id,
                entry.action,
                error
            );
        }

        cache.insert(entry.clone());
        entry
    }

    /// Newest first. Served from the cache when it can answer completely,
    /// from the durable store otherwise.
    pub async fn query(&self, filter: &AuditFilter, limit: usize) -> Vec<AuditEntry> {
        if limit == 0 {
            return Vec::new();
        }

        let cutoff = self.retention_cutoff(Utc::now());
        let (cached, cache_is_complete) = {
            let cache = self.cache.lock().await;
            let cached = cache
                .newest_first()
                .filter(|entry| entry.created_at >= cutoff && filter.matches(entry))
                .take(limit)
                .cloned()
                .collect::<Vec<_>>();

            let complete = cached.len() >= limit
                || filter.id.is_some_and(|id| cache.covers_id(id))
                || filter
                    .since
                    .zip(cache.horizon())
                    .is_some_and(|(since, horizon)| since >= horizon);
            (cached, complete)
        };

        let Some(store) = &self.store else {
            return cached;
        };
        if cache_is_complete {
            return cached;
        }

        match store.query_audit_entries(filter, limit) {
            Ok(entries) => entries,
            Err(error) => {
                log::warn!("audit_query_store_failed error={} fallback=cache", error);
                cached
            }
        }
    }

    pub async fn cached_len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        match &self.store {
            Some(store) => store.flush(),
            None => Ok(()),
        }
    }

    /// Deletes durable entries older than the retention window.
    pub fn prune_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        store.delete_audit_entries_older_than(self.retention_cutoff(now))
    }
}
