use crate::config::Thresholds;

use super::model::{AlertEvent, AlertKey, MetricSample};
use super::state::AlertBook;

/// Runs this tick's fresh samples through their alert state machines.
/// Series without a configured threshold are skipped, and state for a key
/// only comes into existence with its first breach.
pub(crate) fn evaluate_samples(
    book: &mut AlertBook,
    thresholds: &Thresholds,
    samples: &[MetricSample],
) -> Vec<AlertEvent> {
    let mut candidates = Vec::new();

    for sample in samples {
        let Some(threshold) = thresholds.for_metric(sample.metric) else {
            continue;
        };

        let key = AlertKey::new(sample.entity_id.clone(), sample.metric);
        if book.get(&key).is_none() && sample.value <= threshold.enter_value {
            continue;
        }

        let state = book.entry(key.clone());
        if let Some(event) = state.observe(&key, sample.value, threshold, sample.taken_at) {
            candidates.push(event);
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::audit::Severity;
    use crate::config::{ThresholdConfig, Thresholds};
    use crate::monitor::model::{AlertKey, AlertTransition, EntityId, Metric, MetricSample};
    use crate::monitor::state::AlertBook;

    use super::evaluate_samples;

    fn sample(entity: &EntityId, metric: Metric, value: f32) -> MetricSample {
        MetricSample {
            entity_id: entity.clone(),
            metric,
            value,
            taken_at: Utc::now(),
        }
    }

    fn cpu_only(enter: f32) -> Thresholds {
        Thresholds {
            cpu: Some(ThresholdConfig {
                enter_value: enter,
                clear_value: None,
                consecutive_breaches: 1,
                severity: Severity::Critical,
            }),
            ..Thresholds::default()
        }
    }

    #[test]
    fn unconfigured_metrics_and_quiet_series_create_no_state() {
        let mut book = AlertBook::default();
        let host = EntityId::host();
        let events = evaluate_samples(
            &mut book,
            &cpu_only(90.0),
            &[sample(&host, Metric::Cpu, 10.0), sample(&host, Metric::Memory, 99.0)],
        );

        assert!(events.is_empty());
        assert!(book.get(&AlertKey::new(host.clone(), Metric::Cpu)).is_none());
        assert!(book.get(&AlertKey::new(host, Metric::Memory)).is_none());
    }

    #[test]
    fn keys_are_independent_per_entity() {
        let mut book = AlertBook::default();
        let host = EntityId::host();
        let server = EntityId::new("server-1");

        let events = evaluate_samples(
            &mut book,
            &cpu_only(90.0),
            &[sample(&host, Metric::Cpu, 95.0), sample(&server, Metric::Cpu, 50.0)],
        );

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].key, AlertKey::new(host.clone(), Metric::Cpu));
        assert_eq!(events[0].transition, AlertTransition::Fired);
        assert_eq!(events[0].severity, Severity::Critical);
        assert_eq!(book.active_keys(), vec![AlertKey::new(host, Metric::Cpu)]);
    }
}
