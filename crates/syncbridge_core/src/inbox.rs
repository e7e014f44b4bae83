//! Durable records of inbound synchronization attempts.

use crate::client::ClientDescriptor;
use crate::error::CoreResult;
use crate::record::{FlowType, SyncStatus, SynchronizationRecord};
use crate::store::{insert_with_id, SyncRecordStore};
use crate::transfer::{ReceiveOperation, TransferEnvelope};
use serde_json::{json, Value as JsonValue};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Writes inbox records before and while an input client runs.
#[derive(Clone)]
pub struct InboxService {
    store: Arc<dyn SyncRecordStore>,
    receiver_route: String,
}

impl InboxService {
    /// Creates a service writing to `store`; payloads carry `receiver_route`.
    pub fn new(store: Arc<dyn SyncRecordStore>, receiver_route: impl Into<String>) -> Self {
        Self {
            store,
            receiver_route: receiver_route.into(),
        }
    }

    /// Persists a request that could not be turned into items.
    ///
    /// The record keeps the raw request data and `error_message`, with status
    /// `error_on_sync_mapping`.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the store reports no id, or any store error.
    pub fn insert_emergency(
        &self,
        request: &ReceiveOperation,
        client: &ClientDescriptor,
        error_message: &str,
    ) -> CoreResult<SynchronizationRecord> {
        let mut record = SynchronizationRecord::new(
            FlowType::Incoming,
            client.client_type.as_str(),
            request.operation_code.as_str(),
        )
        .with_payload(JsonValue::Array(request.data.clone()))
        .with_status(SyncStatus::MappingError)
        .with_error_message(error_message);
        if !request.operation_id.is_empty() {
            record.operation_id = request.operation_id.clone();
        }

        let record = insert_with_id(self.store.as_ref(), record)?;
        warn!(
            id = record.id,
            operation_id = %record.operation_id,
            operation_code = %record.operation_code,
            "emergency inbox record written"
        );
        Ok(record)
    }

    /// Persists one `sync_in_progress` record per item of `envelope`.
    ///
    /// Items repeating an earlier sync id are skipped. Records come back in
    /// item order.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the store reports no id, or any store
    /// error. Records written before the failure stay written.
    pub fn prepare_incoming(
        &self,
        envelope: &TransferEnvelope,
        client: &ClientDescriptor,
    ) -> CoreResult<Vec<SynchronizationRecord>> {
        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(envelope.items.len());

        for item in &envelope.items {
            if !seen.insert(item.sync_id.as_str()) {
                warn!(sync_id = %item.sync_id, "duplicate sync id in inbound batch, skipping");
                continue;
            }
            let record = SynchronizationRecord::new(
                FlowType::Incoming,
                client.client_type.as_str(),
                client.operation_code.as_str(),
            )
            .with_sync_id(item.sync_id.as_str())
            .with_operation_id(envelope.operation_id.as_str())
            .with_status(SyncStatus::InProgress)
            .with_payload(json!({
                "route": self.receiver_route,
                "data": item.data,
            }));

            let record = insert_with_id(self.store.as_ref(), record)?;
            debug!(id = record.id, sync_id = %item.sync_id, "inbox record written");
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::CrudType;
    use crate::error::CoreError;
    use crate::record::RecordId;
    use crate::store::MemoryRecordStore;
    use crate::transfer::TransferItem;

    struct NoIdStore;

    impl SyncRecordStore for NoIdStore {
        fn insert(&self, _: &SynchronizationRecord) -> CoreResult<Option<RecordId>> {
            Ok(None)
        }
        fn get(&self, _: RecordId) -> CoreResult<Option<SynchronizationRecord>> {
            Ok(None)
        }
        fn update_payload_and_status(
            &self,
            _: RecordId,
            _: &JsonValue,
            _: &SyncStatus,
        ) -> CoreResult<()> {
            Ok(())
        }
        fn update_status(
            &self,
            _: RecordId,
            _: &SyncStatus,
            _: Option<&str>,
            _: u64,
        ) -> CoreResult<()> {
            Ok(())
        }
        fn delete(&self, _: RecordId) -> CoreResult<bool> {
            Ok(false)
        }
        fn all(&self) -> CoreResult<Vec<SynchronizationRecord>> {
            Ok(Vec::new())
        }
    }

    fn client() -> ClientDescriptor {
        ClientDescriptor::new("X", "products", CrudType::ALL)
    }

    #[test]
    fn emergency_record_keeps_raw_data() {
        let store = Arc::new(MemoryRecordStore::new());
        let inbox = InboxService::new(store.clone(), "receive");
        let request = ReceiveOperation::new("op1", "X", vec![json!({"bad": true})]);

        let record = inbox
            .insert_emergency(&request, &client(), "cannot decode")
            .unwrap();

        let stored = store.get(record.id.unwrap()).unwrap().unwrap();
        assert_eq!(stored.status, SyncStatus::MappingError);
        assert_eq!(stored.flow_type, FlowType::Incoming);
        assert_eq!(stored.operation_id, "op1");
        assert_eq!(stored.payload, json!([{"bad": true}]));
        assert_eq!(stored.error_message.as_deref(), Some("cannot decode"));
        assert!(stored.sync_id.is_none());
    }

    #[test]
    fn one_record_per_sync_id() {
        let store = Arc::new(MemoryRecordStore::new());
        let inbox = InboxService::new(store.clone(), "receive");
        let envelope = TransferEnvelope::new(
            "op1",
            "X",
            vec![
                TransferItem::new("s1", json!({"n": 1})),
                TransferItem::new("s2", json!({"n": 2})),
                TransferItem::new("s1", json!({"n": 3})),
            ],
        );

        let records = inbox.prepare_incoming(&envelope, &client()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(store.len(), 2);

        let first = &records[0];
        assert_eq!(first.sync_id.as_deref(), Some("s1"));
        assert_eq!(first.status, SyncStatus::InProgress);
        assert_eq!(first.payload, json!({"route": "receive", "data": {"n": 1}}));
        assert_eq!(first.operation_id, "op1");
    }

    #[test]
    fn missing_id_is_corruption() {
        let inbox = InboxService::new(Arc::new(NoIdStore), "receive");
        let envelope = TransferEnvelope::new("op1", "X", vec![TransferItem::new("s1", json!({}))]);

        let err = inbox.prepare_incoming(&envelope, &client()).unwrap_err();
        assert!(matches!(err, CoreError::Corrupted { .. }));
        assert!(err
            .to_string()
            .contains("Can not insert new incoming synchronization entity."));
    }
}
