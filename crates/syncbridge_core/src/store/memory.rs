//! Map-backed record store.

use super::table::RecordTable;
use super::SyncRecordStore;
use crate::error::CoreResult;
use crate::record::{RecordId, SyncStatus, SynchronizationRecord};
use parking_lot::RwLock;
use serde_json::Value as JsonValue;

/// Record store that keeps everything in memory.
///
/// Ids start at 1 and are never reused.
#[derive(Debug)]
pub struct MemoryRecordStore {
    table: RwLock<RecordTable>,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            table: RwLock::new(RecordTable::new()),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SyncRecordStore for MemoryRecordStore {
    fn insert(&self, record: &SynchronizationRecord) -> CoreResult<Option<RecordId>> {
        let mut table = self.table.write();
        let staged = table.stage_insert(record);
        let id = staged.id;
        table.put(staged);
        Ok(id)
    }

    fn get(&self, id: RecordId) -> CoreResult<Option<SynchronizationRecord>> {
        Ok(self.table.read().get(id).cloned())
    }

    fn update_payload_and_status(
        &self,
        id: RecordId,
        payload: &JsonValue,
        status: &SyncStatus,
    ) -> CoreResult<()> {
        let mut table = self.table.write();
        let staged = table.stage_payload_and_status(id, payload, status)?;
        table.put(staged);
        Ok(())
    }

    fn update_status(
        &self,
        id: RecordId,
        status: &SyncStatus,
        message: Option<&str>,
        updated_at: u64,
    ) -> CoreResult<()> {
        let mut table = self.table.write();
        let staged = table.stage_status(id, status, message, updated_at)?;
        table.put(staged);
        Ok(())
    }

    fn delete(&self, id: RecordId) -> CoreResult<bool> {
        Ok(self.table.write().remove(id))
    }

    fn all(&self) -> CoreResult<Vec<SynchronizationRecord>> {
        Ok(self.table.read().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::record::FlowType;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn record(code: &str, sync_id: &str) -> SynchronizationRecord {
        SynchronizationRecord::new(FlowType::Outcoming, "products", code)
            .with_sync_id(sync_id)
            .with_operation_id("op1")
    }

    #[test]
    fn insert_assigns_increasing_ids() {
        let store = MemoryRecordStore::new();
        let a = store.insert(&record("A", "s1")).unwrap().unwrap();
        let b = store.insert(&record("A", "s2")).unwrap().unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(store.get(b).unwrap().unwrap().id, Some(2));

        assert!(store.delete(b).unwrap());
        let c = store.insert(&record("A", "s3")).unwrap().unwrap();
        assert_eq!(c, 3);
    }

    #[test]
    fn updates_touch_only_their_fields() {
        let store = MemoryRecordStore::new();
        let id = store.insert(&record("A", "s1")).unwrap().unwrap();

        store
            .update_payload_and_status(id, &json!({"x": 1}), &SyncStatus::InProgress)
            .unwrap();
        store
            .update_status(id, &SyncStatus::TransportError, Some("down"), 42)
            .unwrap();

        let stored = store.get(id).unwrap().unwrap();
        assert_eq!(stored.payload, json!({"x": 1}));
        assert_eq!(stored.status, SyncStatus::TransportError);
        assert_eq!(stored.error_message.as_deref(), Some("down"));
        assert_eq!(stored.updated_at, Some(42));
    }

    #[test]
    fn update_of_missing_record_is_not_found() {
        let store = MemoryRecordStore::new();
        let err = store
            .update_status(7, &SyncStatus::Ok, None, 1)
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn lookups() {
        let store = MemoryRecordStore::new();
        store.insert(&record("A", "s1")).unwrap();
        store.insert(&record("B", "s1")).unwrap();
        store.insert(&record("A", "s2")).unwrap();

        let found = store.find_by_operation("op1", "s2").unwrap().unwrap();
        assert_eq!(found.sync_id.as_deref(), Some("s2"));
        assert!(store.find_by_operation("op2", "s2").unwrap().is_none());

        let codes: BTreeSet<String> = ["A".to_string()].into();
        let by_sync = store.find_by_sync_id("s1", &codes).unwrap();
        assert_eq!(by_sync.len(), 1);
        assert_eq!(by_sync[0].operation_code, "A");
    }
}
