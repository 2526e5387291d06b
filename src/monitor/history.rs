use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};

use super::model::{EntityId, Metric, MetricSample};

/// Fixed-capacity series for one `(entity, metric)` pair.
#[derive(Debug)]
pub struct MetricHistory {
    samples: VecDeque<MetricSample>,
    capacity: usize,
}

impl MetricHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: MetricSample) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&MetricSample> {
        self.samples.back()
    }

    pub fn last_n(&self, n: usize) -> impl Iterator<Item = &MetricSample> {
        self.samples.iter().skip(self.samples.len().saturating_sub(n))
    }

    pub fn between(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> impl Iterator<Item = &MetricSample> {
        self.samples.iter().filter(move |sample| {
            since.is_none_or(|since| sample.taken_at >= since)
                && until.is_none_or(|until| sample.taken_at <= until)
        })
    }
}

#[derive(Debug)]
pub struct HistoryStore {
    series: HashMap<(EntityId, Metric), MetricHistory>,
    capacity: usize,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            series: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn append(
        &mut self,
        entity_id: &EntityId,
        metric: Metric,
        value: f32,
        taken_at: DateTime<Utc>,
    ) {
        let capacity = self.capacity;
        self.series
            .entry((entity_id.clone(), metric))
            .or_insert_with(|| MetricHistory::with_capacity(capacity))
            .push(MetricSample {
                entity_id: entity_id.clone(),
                metric,
                value,
                taken_at,
            });
    }

    /// The last `n` samples, oldest first.
    pub fn window(&self, entity_id: &EntityId, metric: Metric, n: usize) -> Vec<MetricSample> {
        self.series
            .get(&(entity_id.clone(), metric))
            .map(|history| history.last_n(n).cloned().collect())
            .unwrap_or_default()
    }

    pub fn latest(&self, entity_id: &EntityId, metric: Metric) -> Option<&MetricSample> {
        self.series
            .get(&(entity_id.clone(), metric))
            .and_then(MetricHistory::latest)
    }

    pub fn range(
        &self,
        entity_id: &EntityId,
        metric: Metric,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Vec<MetricSample> {
        self.series
            .get(&(entity_id.clone(), metric))
            .map(|history| history.between(since, until).cloned().collect())
            .unwrap_or_default()
    }

    pub fn series_len(&self, entity_id: &EntityId, metric: Metric) -> usize {
        self.series
            .get(&(entity_id.clone(), metric))
            .map(MetricHistory::len)
            .unwrap_or(0)
    }

    pub fn entities(&self) -> Vec<EntityId> {
        let mut entities = self
            .series
            .keys()
            .map(|(entity_id, _)| entity_id.clone())
            .collect::<Vec<_>>();
        entities.sort();
        entities.dedup();
        entities
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::config::RetentionWindow;
    use crate::monitor::model::{EntityId, Metric};

    use super::HistoryStore;

    #[test]
    fn capacity_follows_retention_window() {
        assert_eq!(RetentionWindow::Samples(12).capacity(300_000), 12);
        assert_eq!(RetentionWindow::DurationSecs(3600).capacity(300_000), 12);
        assert_eq!(RetentionWindow::DurationSecs(60).capacity(300_000), 1);
    }

    #[test]
    fn series_never_exceeds_capacity() {
        let mut store = HistoryStore::new(5);
        let host = EntityId::host();
        let start = Utc::now();

        for index in 0..40 {
            store.append(
                &host,
                Metric::Cpu,
                index as f32,
                start + Duration::minutes(index),
            );
            assert!(store.series_len(&host, Metric::Cpu) <= 5);
        }

        let window = store.window(&host, Metric::Cpu, 10);
        assert_eq!(window.len(), 5);
        let values = window.iter().map(|sample| sample.value).collect::<Vec<_>>();
        assert_eq!(values, vec![35.0, 36.0, 37.0, 38.0, 39.0]);
    }

    #[test]
    fn window_returns_most_recent_in_time_order() {
        let mut store = HistoryStore::new(100);
        let server = EntityId::new("server-1");
        let start = Utc::now();
        for (offset, value) in [10.0, 20.0, 30.0, 40.0].into_iter().enumerate() {
            store.append(&server, Metric::Memory, value, start + Duration::minutes(offset as i64));
        }

        let window = store.window(&server, Metric::Memory, 2);
        assert_eq!(window.len(), 2);
        assert!(window[0].taken_at < window[1].taken_at);
        assert_eq!(window[0].value, 30.0);
        assert_eq!(window[1].value, 40.0);
        assert!(store.window(&server, Metric::Disk, 2).is_empty());
    }

    #[test]
    fn range_filters_by_time_bounds() {
        let mut store = HistoryStore::new(100);
        let host = EntityId::host();
        let start = Utc::now();
        for offset in 0..6 {
            store.append(
                &host,
                Metric::Disk,
                offset as f32,
                start + Duration::minutes(offset * 10),
            );
        }

        let samples = store.range(
            &host,
            Metric::Disk,
            Some(start + Duration::minutes(10)),
            Some(start + Duration::minutes(30)),
        );
        let values = samples.iter().map(|sample| sample.value).collect::<Vec<_>>();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);

        assert_eq!(store.range(&host, Metric::Disk, None, None).len(), 6);
    }

    #[test]
    fn series_are_independent_per_entity_and_metric() {
        let mut store = HistoryStore::new(2);
        let host = EntityId::host();
        let server = EntityId::new("server-1");
        let now = Utc::now();

        store.append(&host, Metric::Cpu, 1.0, now);
        store.append(&host, Metric::Memory, 2.0, now);
        store.append(&server, Metric::Cpu, 3.0, now);

        assert_eq!(store.series_len(&host, Metric::Cpu), 1);
        assert_eq!(store.series_len(&server, Metric::Cpu), 1);
        assert_eq!(store.entities(), vec![EntityId::host(), server.clone()]);
        assert_eq!(store.latest(&server, Metric::Cpu).map(|s| s.value), Some(3.0));
    }
}
