//! File-backed record store behavior across process restarts.

use serde_json::json;
use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::Write;
use syncbridge_core::{
    Config, CoreError, FlowType, JournalRecordStore, SyncRecordStore, SyncStatus,
    SynchronizationRecord,
};
use tempfile::TempDir;

fn record(sync_id: &str) -> SynchronizationRecord {
    SynchronizationRecord::new(FlowType::Outcoming, "products", "PRODUCT_OUT")
        .with_sync_id(sync_id)
        .with_operation_id("op-1")
        .with_payload(json!({"data": {"syncId": sync_id}}))
}

#[test]
fn records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sync").join("records.journal");

    let (a, b) = {
        let store = JournalRecordStore::open_path(&path, &Config::default()).unwrap();
        let a = store.insert(&record("s1")).unwrap().unwrap();
        let b = store.insert(&record("s2")).unwrap().unwrap();
        store
            .update_status(b, &SyncStatus::TransportError, Some("timeout"), 10)
            .unwrap();
        (a, b)
    };

    let store = JournalRecordStore::open_path(&path, &Config::default()).unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(store.get(a).unwrap().unwrap().status, SyncStatus::BeforeSync);
    let failed = store.get(b).unwrap().unwrap();
    assert_eq!(failed.status, SyncStatus::TransportError);
    assert_eq!(failed.error_message.as_deref(), Some("timeout"));

    let found = store.find_by_operation("op-1", "s2").unwrap().unwrap();
    assert_eq!(found.id, Some(b));
    let codes = BTreeSet::from(["PRODUCT_OUT".to_string()]);
    assert_eq!(store.find_by_sync_id("s1", &codes).unwrap().len(), 1);
}

#[test]
fn second_writer_is_locked_out() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.journal");

    let _writer = JournalRecordStore::open_path(&path, &Config::default()).unwrap();
    let err = JournalRecordStore::open_path(&path, &Config::default()).unwrap_err();
    assert!(matches!(err, CoreError::Storage(_)));
}

#[test]
fn torn_tail_is_dropped_on_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.journal");

    {
        let store = JournalRecordStore::open_path(&path, &Config::default()).unwrap();
        store.insert(&record("s1")).unwrap();
    }
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0x40, 0, 0, 0, 1, 0xAA]).unwrap();
    }

    let store = JournalRecordStore::open_path(&path, &Config::default()).unwrap();
    assert_eq!(store.len(), 1);
    assert!(store.verify().unwrap().is_clean());
    let id = store.insert(&record("s2")).unwrap().unwrap();
    assert_eq!(id, 2);
}

#[test]
fn compaction_on_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("records.journal");

    {
        let store = JournalRecordStore::open_path(&path, &Config::default()).unwrap();
        let id = store.insert(&record("s1")).unwrap().unwrap();
        for _ in 0..5 {
            store
                .update_payload_and_status(id, &json!({"n": 1}), &SyncStatus::InProgress)
                .unwrap();
        }
        let stats = store.compact().unwrap();
        assert_eq!(stats.frames_before, 6);
        assert_eq!(stats.frames_after, 2);
    }

    let store = JournalRecordStore::open_read_only(&path).unwrap();
    let all = store.all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].payload, json!({"n": 1}));
}
