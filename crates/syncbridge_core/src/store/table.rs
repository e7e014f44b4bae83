//! In-memory record table shared by both stores.

use crate::error::{CoreError, CoreResult};
use crate::record::{RecordId, SyncStatus, SynchronizationRecord};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub(crate) struct RecordTable {
    records: BTreeMap<RecordId, SynchronizationRecord>,
    next_id: RecordId,
}

impl RecordTable {
    pub(crate) fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Copy of `record` carrying the next free id.
    pub(crate) fn stage_insert(&self, record: &SynchronizationRecord) -> SynchronizationRecord {
        let mut staged = record.clone();
        staged.id = Some(self.next_id);
        staged
    }

    /// Stores a record that already carries its id.
    pub(crate) fn put(&mut self, record: SynchronizationRecord) {
        if let Some(id) = record.id {
            self.next_id = self.next_id.max(id + 1);
            self.records.insert(id, record);
        }
    }

    /// Makes sure ids below `next_id` are never handed out again.
    pub(crate) fn reserve(&mut self, next_id: RecordId) {
        self.next_id = self.next_id.max(next_id);
    }

    pub(crate) fn next_id(&self) -> RecordId {
        self.next_id
    }

    pub(crate) fn remove(&mut self, id: RecordId) -> bool {
        self.records.remove(&id).is_some()
    }

    pub(crate) fn get(&self, id: RecordId) -> Option<&SynchronizationRecord> {
        self.records.get(&id)
    }

    pub(crate) fn contains(&self, id: RecordId) -> bool {
        self.records.contains_key(&id)
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &SynchronizationRecord> {
        self.records.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn stage_payload_and_status(
        &self,
        id: RecordId,
        payload: &JsonValue,
        status: &SyncStatus,
    ) -> CoreResult<SynchronizationRecord> {
        let mut staged = self.existing(id)?.clone();
        staged.payload = payload.clone();
        staged.status = status.clone();
        Ok(staged)
    }

    pub(crate) fn stage_status(
        &self,
        id: RecordId,
        status: &SyncStatus,
        message: Option<&str>,
        updated_at: u64,
    ) -> CoreResult<SynchronizationRecord> {
        let mut staged = self.existing(id)?.clone();
        staged.status = status.clone();
        staged.error_message = message.map(str::to_string);
        staged.updated_at = Some(updated_at);
        Ok(staged)
    }

    fn existing(&self, id: RecordId) -> CoreResult<&SynchronizationRecord> {
        self.records
            .get(&id)
            .ok_or_else(|| CoreError::not_found(format!("Synchronization not found by id: {id}")))
    }
}
