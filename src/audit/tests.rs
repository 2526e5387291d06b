use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use crate::audit_store::{DurableStore, MemoryAuditStore, SledAuditStore};
use crate::config::AuditConfig;

use super::{AuditAction, AuditFilter, AuditRecorder, DetailLevel, NewAuditEntry, Severity};

fn audit_config(cache_size: usize, detail_level: DetailLevel) -> AuditConfig {
    AuditConfig {
        detail_level,
        cache_size,
        retention_days: 1,
        ..AuditConfig::default()
    }
}

fn user_action(message: &str) -> NewAuditEntry {
    NewAuditEntry::new(AuditAction::UserAction, Severity::Info, message).with_actor("operator")
}

#[tokio::test]
async fn record_then_query_by_id_returns_equal_entry() {
    let store = Arc::new(MemoryAuditStore::new());
    let recorder = AuditRecorder::new(
        &audit_config(10, DetailLevel::Full),
        Some(store.clone() as Arc<dyn DurableStore>),
    )
    .expect("recorder");

    let recorded = recorder
        .record(
            NewAuditEntry::new(AuditAction::AlertFired, Severity::Warning, "CPU usage is high")
                .with_subject("host/cpu")
                .with_metadata(json!({"value": 93.5, "threshold": 90.0})),
        )
        .await;

    let found = recorder.query(&AuditFilter::by_id(recorded.id), 1).await;
    assert_eq!(found, vec![recorded.clone()]);

    let stored = store
        .query_audit_entries(&AuditFilter::by_id(recorded.id), 1)
        .expect("store query");
    assert_eq!(stored, vec![recorded]);
}

#[tokio::test]
async fn ids_are_monotonic_and_seeded_from_store() {
    let temp = tempfile::tempdir().expect("temp dir");
    let last_id = {
        let store = Arc::new(SledAuditStore::open(temp.path()).expect("open store"));
        let recorder = AuditRecorder::new(
            &audit_config(10, DetailLevel::Medium),
            Some(store.clone() as Arc<dyn DurableStore>),
        )
        .expect("recorder");

        let first = recorder.record(user_action("first")).await;
        let second = recorder.record(user_action("second")).await;
        assert!(second.id > first.id);
        store.flush().expect("flush");
        second.id
    };

    let store = Arc::new(SledAuditStore::open(temp.path()).expect("reopen store"));
    let recorder = AuditRecorder::new(
        &audit_config(10, DetailLevel::Medium),
        Some(store as Arc<dyn DurableStore>),
    )
    .expect("recorder after restart");
    let third = recorder.record(user_action("third")).await;
    assert_eq!(third.id, last_id + 1);
}

#[tokio::test]
async fn cache_keeps_only_newest_entries() {
    let recorder =
        AuditRecorder::new(&audit_config(3, DetailLevel::Minimal), None).expect("recorder");
    for index in 0..4 {
        recorder.record(user_action(&format!("action {index}"))).await;
    }

    assert_eq!(recorder.cached_len().await, 3);
    let entries = recorder.query(&AuditFilter::default(), 10).await;
    let messages = entries
        .iter()
        .map(|entry| entry.message.as_str())
        .collect::<Vec<_>>();
    assert_eq!(messages, vec!["action 3", "action 2", "action 1"]);
}

#[tokio::test]
async fn evicted_entries_are_served_from_store() {
    let store = Arc::new(MemoryAuditStore::new());
    let recorder = AuditRecorder::new(
        &audit_config(2, DetailLevel::Medium),
        Some(store as Arc<dyn DurableStore>),
    )
    .expect("recorder");

    let first = recorder.record(user_action("first")).await;
    for index in 0..3 {
        recorder.record(user_action(&format!("later {index}"))).await;
    }

    let found = recorder.query(&AuditFilter::by_id(first.id), 1).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].message, "first");

    let all = recorder.query(&AuditFilter::default(), 10).await;
    assert_eq!(all.len(), 4);
    assert_eq!(all[0].message, "later 2");
}

#[tokio::test]
async fn store_failure_degrades_to_cache() {
    let store = Arc::new(MemoryAuditStore::new());
    let recorder = AuditRecorder::new(
        &audit_config(5, DetailLevel::Medium),
        Some(store.clone() as Arc<dyn DurableStore>),
    )
    .expect("recorder");

    store.set_unavailable(true);
    let entry = recorder.record(user_action("during outage")).await;

    let found = recorder.query(&AuditFilter::default(), 10).await;
    assert_eq!(found, vec![entry]);
    store.set_unavailable(false);
    assert!(store.is_empty());
}

#[tokio::test]
async fn detail_level_is_applied_on_record() {
    let recorder =
        AuditRecorder::new(&audit_config(5, DetailLevel::Minimal), None).expect("recorder");
    let entry = recorder
        .record(
            NewAuditEntry::new(AuditAction::ServerOffline, Severity::Error, "server-1 is offline")
                .with_metadata(json!({"misses": 3})),
        )
        .await;

    assert_eq!(entry.metadata, json!({}));
    assert_eq!(entry.action, AuditAction::ServerOffline);
    assert_eq!(entry.severity, Severity::Error);
}

#[tokio::test]
async fn query_filters_by_actor_and_minimum_severity() {
    let recorder =
        AuditRecorder::new(&audit_config(10, DetailLevel::Medium), None).expect("recorder");
    recorder.record(user_action("muted alerts")).await;
    recorder
        .record(NewAuditEntry::new(AuditAction::ServerOffline, Severity::Critical, "host offline"))
        .await;
    recorder
        .record(NewAuditEntry::new(AuditAction::AlertFired, Severity::Warning, "disk high"))
        .await;

    let by_actor = AuditFilter {
        actor: Some("operator".to_string()),
        ..AuditFilter::default()
    };
    let operator_entries = recorder.query(&by_actor, 10).await;
    assert_eq!(operator_entries.len(), 1);
    assert_eq!(operator_entries[0].message, "muted alerts");

    let severe = AuditFilter {
        severity: Some(Severity::Error),
        ..AuditFilter::default()
    };
    let critical = recorder.query(&severe, 10).await;
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].severity, Severity::Critical);
}

#[tokio::test]
async fn prune_uses_retention_window() {
    let store = Arc::new(MemoryAuditStore::new());
    let recorder = AuditRecorder::new(
        &audit_config(10, DetailLevel::Medium),
        Some(store.clone() as Arc<dyn DurableStore>),
    )
    .expect("recorder");

    let now = Utc::now();
    recorder
        .record_at(user_action("two days old"), now - Duration::days(2))
        .await;
    recorder
        .record_at(user_action("an hour old"), now - Duration::hours(1))
        .await;

    assert_eq!(recorder.prune_expired(now).expect("prune"), 1);
    let remaining = store
        .query_audit_entries(&AuditFilter::default(), 10)
        .expect("store query");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].message, "an hour old");

    let visible = recorder.query(&AuditFilter::default(), 10).await;
    assert!(visible.iter().all(|entry| entry.message != "two days old"));
}

#[test]
fn actions_parse_from_their_names() {
    for action in AuditAction::ALL {
        assert_eq!(action.as_str().parse::<AuditAction>(), Ok(action));
    }
    assert!("alert_exploded".parse::<AuditAction>().is_err());
    assert!(Severity::Info < Severity::Warning);
    assert!(Severity::Error < Severity::Critical);
}

#[tokio::test]
async fn late_stamped_entries_stay_visible_to_since_queries() {
    let temp = tempfile::tempdir().expect("temp dir");
    let store = Arc::new(SledAuditStore::open(temp.path()).expect("open sled"));
    let recorder = AuditRecorder::new(
        &audit_config(1, DetailLevel::Medium),
        Some(store as Arc<dyn DurableStore>),
    )
    .expect("recorder");

    let t0 = Utc::now() - Duration::minutes(1);
    let first = recorder
        .record_at(user_action("muted from chat"), t0 + Duration::seconds(5))
        .await;
    // A tick that captured its clock before the mute finishes afterwards.
    let second = recorder
        .record_at(
            NewAuditEntry::new(AuditAction::AlertFired, Severity::Warning, "CPU usage is high"),
            t0,
        )
        .await;
    assert!(second.id > first.id);
    assert_eq!(second.created_at, first.created_at);

    let recent = recorder
        .query(
            &AuditFilter {
                since: Some(t0 + Duration::seconds(1)),
                ..AuditFilter::default()
            },
            10,
        )
        .await;
    assert_eq!(
        recent.iter().map(|entry| entry.id).collect::<Vec<_>>(),
        vec![second.id, first.id]
    );
}
