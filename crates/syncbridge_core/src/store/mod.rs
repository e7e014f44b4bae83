//! Persistence of synchronization records.
//!
//! [`SyncRecordStore`] is the seam the inbox and outbox services write
//! through. [`MemoryRecordStore`] keeps records in a map;
//! [`JournalRecordStore`] appends every change to a checksummed journal and
//! rebuilds its index on open.

mod journal;
mod memory;
mod table;

pub use journal::{CompactionStats, JournalRecordStore, ENTRY_DELETE, ENTRY_PUT};
pub use memory::MemoryRecordStore;

use crate::error::CoreResult;
use crate::record::{RecordId, SyncStatus, SynchronizationRecord};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

/// Durable storage of synchronization records.
///
/// Writes are independent: a failure in one call never undoes an earlier
/// successful one.
pub trait SyncRecordStore: Send + Sync {
    /// Persists a new record and returns the id the store assigned.
    ///
    /// Any id already set on `record` is ignored. `None` means the store
    /// accepted the write but could not report an id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn insert(&self, record: &SynchronizationRecord) -> CoreResult<Option<RecordId>>;

    /// Loads a record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, id: RecordId) -> CoreResult<Option<SynchronizationRecord>>;

    /// Replaces the payload and the status of a stored record.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if no record has `id`.
    fn update_payload_and_status(
        &self,
        id: RecordId,
        payload: &JsonValue,
        status: &SyncStatus,
    ) -> CoreResult<()>;

    /// Writes status, message and update time of a stored record.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if no record has `id`.
    fn update_status(
        &self,
        id: RecordId,
        status: &SyncStatus,
        message: Option<&str>,
        updated_at: u64,
    ) -> CoreResult<()>;

    /// Removes a record; returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn delete(&self, id: RecordId) -> CoreResult<bool>;

    /// Every stored record in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn all(&self) -> CoreResult<Vec<SynchronizationRecord>>;

    /// First record of batch `operation_id` carrying `sync_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn find_by_operation(
        &self,
        operation_id: &str,
        sync_id: &str,
    ) -> CoreResult<Option<SynchronizationRecord>> {
        Ok(self.all()?.into_iter().find(|r| {
            r.operation_id == operation_id && r.sync_id.as_deref() == Some(sync_id)
        }))
    }

    /// Every record carrying `sync_id` whose operation code is in
    /// `operation_codes`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn find_by_sync_id(
        &self,
        sync_id: &str,
        operation_codes: &BTreeSet<String>,
    ) -> CoreResult<Vec<SynchronizationRecord>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|r| {
                r.sync_id.as_deref() == Some(sync_id)
                    && operation_codes.contains(&r.operation_code)
            })
            .collect())
    }
}

/// Inserts `record` and returns it carrying its new id.
///
/// A store that reports no id leaves the caller without a way to update the
/// record later, so that is treated as corruption.
pub(crate) fn insert_with_id(
    store: &dyn SyncRecordStore,
    mut record: SynchronizationRecord,
) -> CoreResult<SynchronizationRecord> {
    match store.insert(&record)? {
        Some(id) => {
            record.id = Some(id);
            Ok(record)
        }
        None => Err(crate::error::CoreError::corrupted(format!(
            "Can not insert new {} synchronization entity. OperationCode: {}, syncId: {}, \
             operationId: {}, status: {}, errorMessage: {}",
            record.flow_type,
            record.operation_code,
            record.sync_id.as_deref().unwrap_or_default(),
            record.operation_id,
            record.status,
            record.error_message.as_deref().unwrap_or_default(),
        ))),
    }
}
