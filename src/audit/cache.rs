use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use super::model::AuditEntry;

/// The most recent audit entries in insertion order, bounded.
#[derive(Debug)]
pub struct RecentAuditCache {
    entries: VecDeque<AuditEntry>,
    capacity: usize,
}

impl RecentAuditCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn insert(&mut self, entry: AuditEntry) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Timestamp of the oldest entry still held.
    pub fn horizon(&self) -> Option<DateTime<Utc>> {
        self.entries.front().map(|entry| entry.created_at)
    }

    /// Timestamp of the newest entry held.
    pub fn latest_created_at(&self) -> Option<DateTime<Utc>> {
        self.entries.back().map(|entry| entry.created_at)
    }

    pub fn covers_id(&self, id: u64) -> bool {
        match (self.entries.front(), self.entries.back()) {
            (Some(oldest), Some(newest)) => oldest.id <= id && id <= newest.id,
            _ => false,
        }
    }

    pub fn newest_first(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter().rev()
    }
}
