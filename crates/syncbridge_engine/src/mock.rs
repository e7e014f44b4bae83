//! In-memory clients for tests.

use crate::client::{InputClient, OutputClient, OutputSupport, SyncClient};
use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use syncbridge_core::{
    ChangeCollection, ClientDescriptor, ReceiveOperation, RelationExtractor,
    SynchronizationRecord, TransferEnvelope, TransferItem, TransferObject,
};

/// An input client that records every applied item.
#[derive(Debug)]
pub struct MockInputClient {
    descriptor: ClientDescriptor,
    build_failure: Mutex<Option<String>>,
    failing: Mutex<BTreeSet<String>>,
    dropped: Mutex<BTreeSet<String>>,
    applied: Mutex<Vec<TransferItem>>,
}

impl MockInputClient {
    /// Creates a client for `descriptor`.
    pub fn new(descriptor: ClientDescriptor) -> Self {
        Self {
            descriptor,
            build_failure: Mutex::new(None),
            failing: Mutex::new(BTreeSet::new()),
            dropped: Mutex::new(BTreeSet::new()),
            applied: Mutex::new(Vec::new()),
        }
    }

    /// Makes decoding of every request fail with `message`.
    pub fn fail_build(&self, message: impl Into<String>) {
        *self.build_failure.lock() = Some(message.into());
    }

    /// Makes applying the item `sync_id` fail with a transport error.
    pub fn fail_item(&self, sync_id: impl Into<String>) {
        self.failing.lock().insert(sync_id.into());
    }

    /// Leaves the item `sync_id` out of the decoded envelope.
    pub fn drop_item(&self, sync_id: impl Into<String>) {
        self.dropped.lock().insert(sync_id.into());
    }

    /// Items applied so far.
    pub fn applied(&self) -> Vec<TransferItem> {
        self.applied.lock().clone()
    }
}

impl SyncClient for MockInputClient {
    fn descriptor(&self) -> &ClientDescriptor {
        &self.descriptor
    }

    fn name(&self) -> &str {
        "MockInputClient"
    }
}

impl InputClient for MockInputClient {
    fn build_transferable_input(&self, request: &ReceiveOperation) -> SyncResult<TransferEnvelope> {
        if let Some(message) = self.build_failure.lock().clone() {
            return Err(SyncError::client(message));
        }
        let dropped = self.dropped.lock();
        let items = request
            .data
            .iter()
            .filter_map(|item| {
                let sync_id = item.get("syncId").and_then(JsonValue::as_str)?;
                (!dropped.contains(sync_id)).then(|| TransferItem::new(sync_id, item.clone()))
            })
            .collect();
        Ok(TransferEnvelope::new(
            request.operation_id.as_str(),
            request.operation_code.as_str(),
            items,
        ))
    }

    fn synchronize_input(
        &self,
        _record: &SynchronizationRecord,
        item: &TransferItem,
    ) -> SyncResult<()> {
        if self.failing.lock().contains(&item.sync_id) {
            return Err(SyncError::transport(format!(
                "remote rejected item {}",
                item.sync_id
            )));
        }
        self.applied.lock().push(item.clone());
        Ok(())
    }
}

/// How a [`MockOutputClient`] fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    /// Building the transfer object fails with an invalid output error.
    Mapping(String),
    /// Sending fails with a transport error.
    Transport(String),
}

/// An output client that keeps every transfer object it was asked to send.
///
/// The transfer object lists the identities of the changes that belong to
/// the record's aggregate.
#[derive(Debug)]
pub struct MockOutputClient {
    descriptor: ClientDescriptor,
    support: OutputSupport,
    failure: Mutex<Option<MockFailure>>,
    nothing_to_send: AtomicBool,
    unsupported: AtomicBool,
    sent: Mutex<Vec<TransferObject>>,
}

impl MockOutputClient {
    /// Creates a client for `descriptor`.
    pub fn new(descriptor: ClientDescriptor, extractor: Arc<RelationExtractor>) -> Self {
        Self {
            descriptor,
            support: OutputSupport::new(extractor),
            failure: Mutex::new(None),
            nothing_to_send: AtomicBool::new(false),
            unsupported: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Sets or clears the failure mode.
    pub fn set_failure(&self, failure: Option<MockFailure>) {
        *self.failure.lock() = failure;
    }

    /// Makes the client report that there is nothing to send.
    pub fn set_nothing_to_send(&self, value: bool) {
        self.nothing_to_send.store(value, Ordering::SeqCst);
    }

    /// `false` makes the client refuse every change set; `true` restores the
    /// declared operation check.
    pub fn set_supported(&self, value: bool) {
        self.unsupported.store(!value, Ordering::SeqCst);
    }

    /// Transfer objects sent so far.
    pub fn sent(&self) -> Vec<TransferObject> {
        self.sent.lock().clone()
    }
}

impl SyncClient for MockOutputClient {
    fn descriptor(&self) -> &ClientDescriptor {
        &self.descriptor
    }

    fn name(&self) -> &str {
        "MockOutputClient"
    }
}

impl OutputClient for MockOutputClient {
    fn is_supported(&self, applied: &dyn ChangeCollection) -> bool {
        !self.unsupported.load(Ordering::SeqCst)
            && self
                .support
                .declares_operation(applied, self.operation_code())
    }

    fn build_transferable_output(
        &self,
        applied: &dyn ChangeCollection,
        _chronology: &dyn ChangeCollection,
        record: &SynchronizationRecord,
    ) -> SyncResult<Option<TransferObject>> {
        if let Some(MockFailure::Mapping(message)) = self.failure.lock().clone() {
            return Err(SyncError::invalid_output(message));
        }
        if self.nothing_to_send.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let mut changes = Vec::new();
        for change in applied.iter() {
            if self
                .support
                .skip_by_sync_id(change, record, self.operation_code())?
            {
                continue;
            }
            changes.push(json!({
                "resource": change.identity(),
                "crud": change.crud_type().as_str(),
            }));
        }
        Ok(Some(TransferObject(json!({
            "syncId": record.sync_id,
            "changes": changes,
        }))))
    }

    fn synchronize_output(&self, transfer: &TransferObject) -> SyncResult<()> {
        if let Some(MockFailure::Transport(message)) = self.failure.lock().clone() {
            return Err(SyncError::transport(message));
        }
        self.sent.lock().push(transfer.clone());
        Ok(())
    }
}
