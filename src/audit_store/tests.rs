use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use crate::audit::{AuditAction, AuditEntry, AuditFilter, Severity};

use super::{DurableStore, MemoryAuditStore, SledAuditStore};

fn entry(
    id: u64,
    action: AuditAction,
    severity: Severity,
    created_at: DateTime<Utc>,
) -> AuditEntry {
    AuditEntry {
        id,
        action,
        severity,
        actor: None,
        subject: Some("host".to_string()),
        message: format!("entry {id}"),
        metadata: json!({"id": id}),
        created_at,
    }
}

fn open_sled(path: &std::path::Path) -> SledAuditStore {
    SledAuditStore::open(path).expect("open sled audit store")
}

#[test]
fn write_is_insert_if_absent() {
    let temp = tempfile::tempdir().expect("temp dir");
    let store = open_sled(temp.path());
    let now = Utc::now();

    let original = entry(1, AuditAction::AlertFired, Severity::Warning, now);
    assert!(store.write_audit_entry(&original).expect("first write"));

    let mut altered = original.clone();
    altered.message = "rewritten".to_string();
    assert!(!store.write_audit_entry(&altered).expect("second write"));

    let stored = store
        .query_audit_entries(&AuditFilter::by_id(1), 10)
        .expect("query by id");
    assert_eq!(stored, vec![original]);
    assert_eq!(store.len(), 1);
}

#[test]
fn query_returns_newest_first_with_filters() {
    let temp = tempfile::tempdir().expect("temp dir");
    let store = open_sled(temp.path());
    let now = Utc::now();

    let entries = [
        entry(1, AuditAction::SystemStartup, Severity::Info, now - Duration::minutes(30)),
        entry(2, AuditAction::AlertFired, Severity::Warning, now - Duration::minutes(20)),
        entry(3, AuditAction::ServerOffline, Severity::Error, now - Duration::minutes(10)),
        entry(4, AuditAction::AlertCleared, Severity::Info, now),
    ];
    for item in &entries {
        store.write_audit_entry(item).expect("write entry");
    }

    let all = store
        .query_audit_entries(&AuditFilter::default(), 10)
        .expect("query all");
    assert_eq!(all.iter().map(|e| e.id).collect::<Vec<_>>(), vec![4, 3, 2, 1]);

    let limited = store
        .query_audit_entries(&AuditFilter::default(), 2)
        .expect("query limited");
    assert_eq!(limited.iter().map(|e| e.id).collect::<Vec<_>>(), vec![4, 3]);

    let at_least_warning = AuditFilter {
        severity: Some(Severity::Warning),
        ..AuditFilter::default()
    };
    let severe = store
        .query_audit_entries(&at_least_warning, 10)
        .expect("query severity");
    assert_eq!(severe.iter().map(|e| e.id).collect::<Vec<_>>(), vec![3, 2]);

    let window = AuditFilter {
        since: Some(now - Duration::minutes(25)),
        until: Some(now - Duration::minutes(5)),
        ..AuditFilter::default()
    };
    let windowed = store.query_audit_entries(&window, 10).expect("query window");
    assert_eq!(windowed.iter().map(|e| e.id).collect::<Vec<_>>(), vec![3, 2]);

    let by_action = AuditFilter {
        action: Some(AuditAction::SystemStartup),
        ..AuditFilter::default()
    };
    let startup = store.query_audit_entries(&by_action, 10).expect("query action");
    assert_eq!(startup.len(), 1);
    assert_eq!(startup[0].id, 1);
}

#[test]
fn prune_removes_exactly_entries_older_than_cutoff() {
    let temp = tempfile::tempdir().expect("temp dir");
    let store = open_sled(temp.path());
    let now = Utc::now();

    store
        .write_audit_entry(&entry(
            1,
            AuditAction::AlertFired,
            Severity::Warning,
            now - Duration::days(2),
        ))
        .expect("write old entry");
    store
        .write_audit_entry(&entry(
            2,
            AuditAction::AlertCleared,
            Severity::Info,
            now - Duration::hours(1),
        ))
        .expect("write recent entry");

    let removed = store
        .delete_audit_entries_older_than(now - Duration::days(1))
        .expect("prune");
    assert_eq!(removed, 1);

    let remaining = store
        .query_audit_entries(&AuditFilter::default(), 10)
        .expect("query remaining");
    assert_eq!(remaining.iter().map(|e| e.id).collect::<Vec<_>>(), vec![2]);

    let removed_again = store
        .delete_audit_entries_older_than(now - Duration::days(1))
        .expect("prune again");
    assert_eq!(removed_again, 0);
}

#[test]
fn last_id_survives_reopen() {
    let temp = tempfile::tempdir().expect("temp dir");
    let now = Utc::now();
    {
        let store = open_sled(temp.path());
        assert_eq!(store.last_audit_id().expect("empty last id"), None);
        for id in [3, 7, 5] {
            store
                .write_audit_entry(&entry(id, AuditAction::UserAction, Severity::Info, now))
                .expect("write entry");
        }
        store.flush().expect("flush");
    }

    let reopened = open_sled(temp.path());
    assert_eq!(reopened.last_audit_id().expect("last id"), Some(7));
    assert_eq!(reopened.len(), 3);
}

#[test]
fn memory_store_matches_sled_semantics() {
    let store = MemoryAuditStore::new();
    let now = Utc::now();

    assert!(store
        .write_audit_entry(&entry(
            1,
            AuditAction::AlertFired,
            Severity::Warning,
            now - Duration::days(2),
        ))
        .expect("write old"));
    assert!(store
        .write_audit_entry(&entry(
            2,
            AuditAction::AlertCleared,
            Severity::Info,
            now - Duration::hours(1),
        ))
        .expect("write recent"));
    assert!(!store
        .write_audit_entry(&entry(2, AuditAction::AlertCleared, Severity::Info, now))
        .expect("duplicate write"));

    assert_eq!(store.last_audit_id().expect("last id"), Some(2));
    assert_eq!(
        store
            .delete_audit_entries_older_than(now - Duration::days(1))
            .expect("prune"),
        1
    );
    assert_eq!(store.len(), 1);

    store.set_unavailable(true);
    assert!(store.query_audit_entries(&AuditFilter::default(), 10).is_err());
    store.set_unavailable(false);
    assert_eq!(
        store
            .query_audit_entries(&AuditFilter::default(), 10)
            .expect("query")
            .len(),
        1
    );
}

#[test]
fn since_query_does_not_assume_ids_follow_time() {
    let temp = tempfile::tempdir().expect("temp dir");
    let store = open_sled(temp.path());
    let t0 = Utc::now() - Duration::minutes(5);

    let later = t0 + Duration::seconds(5);
    store
        .write_audit_entry(&entry(1, AuditAction::UserAction, Severity::Info, later))
        .expect("write later timestamp");
    store
        .write_audit_entry(&entry(2, AuditAction::AlertFired, Severity::Warning, t0))
        .expect("write earlier timestamp");

    let recent = store
        .query_audit_entries(
            &AuditFilter {
                since: Some(t0 + Duration::seconds(1)),
                ..AuditFilter::default()
            },
            10,
        )
        .expect("since query");
    assert_eq!(recent.iter().map(|entry| entry.id).collect::<Vec<_>>(), vec![1]);

    let older = store
        .query_audit_entries(
            &AuditFilter {
                until: Some(t0 + Duration::seconds(1)),
                ..AuditFilter::default()
            },
            10,
        )
        .expect("until query");
    assert_eq!(older.iter().map(|entry| entry.id).collect::<Vec<_>>(), vec![2]);
}

#[test]
fn prune_is_exact_within_the_cutoff_millisecond() {
    let temp = tempfile::tempdir().expect("temp dir");
    let store = open_sled(temp.path());
    let cutoff = DateTime::from_timestamp(1_700_000_000, 500_600_000).expect("valid timestamp");

    let before = cutoff - Duration::microseconds(300);
    let after = cutoff + Duration::microseconds(200);
    assert_eq!(before.timestamp_millis(), cutoff.timestamp_millis());
    assert_eq!(after.timestamp_millis(), cutoff.timestamp_millis());

    store
        .write_audit_entry(&entry(1, AuditAction::UserAction, Severity::Info, before))
        .expect("write entry before cutoff");
    store
        .write_audit_entry(&entry(2, AuditAction::UserAction, Severity::Info, cutoff))
        .expect("write entry at cutoff");
    store
        .write_audit_entry(&entry(3, AuditAction::UserAction, Severity::Info, after))
        .expect("write entry after cutoff");

    assert_eq!(store.delete_audit_entries_older_than(cutoff).expect("prune"), 1);

    let remaining = store
        .query_audit_entries(&AuditFilter::default(), 10)
        .expect("query remaining");
    assert_eq!(remaining.iter().map(|entry| entry.id).collect::<Vec<_>>(), vec![3, 2]);
}
