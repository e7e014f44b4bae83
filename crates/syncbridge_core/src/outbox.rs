//! Durable records of outbound synchronization attempts.

use crate::aggregate::AggregateStore;
use crate::change::{ChangeCollection, ChangeRecord, CrudType};
use crate::client::ClientDescriptor;
use crate::context::RequestScope;
use crate::error::{CoreError, CoreResult};
use crate::extractor::RelationExtractor;
use crate::model::ObjectRef;
use crate::record::{now_millis, FlowType, SyncStatus, SynchronizationRecord};
use crate::store::{insert_with_id, SyncRecordStore};
use crate::transfer::TransferObject;
use serde_json::{json, Map, Value as JsonValue};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Class name of synchronization records themselves; never synchronized.
pub const SYNCHRONIZATION_CLASS: &str = "Synchronization";

/// Payload key under which the transfer object is stored.
pub const TRANSFER_OBJECT_KEY: &str = "transfer_object";

/// Turns applied changes into outbound records and maintains them.
#[derive(Clone)]
pub struct OutboxService {
    extractor: Arc<RelationExtractor>,
    store: Arc<dyn SyncRecordStore>,
    aggregates: Arc<dyn AggregateStore>,
    scope: RequestScope,
}

/// Aggregates touched by one batch, keyed by identity in first-touch order.
///
/// A delete snapshot and the live object are separate handles of the same
/// aggregate. Every handle of one identity ends up with one sync id.
#[derive(Default)]
struct Batch {
    order: Vec<String>,
    handles: HashMap<String, Vec<ObjectRef>>,
    sync_ids: HashMap<String, String>,
    data: HashMap<String, Map<String, JsonValue>>,
}

impl Batch {
    fn touch(&mut self, aggregate: &ObjectRef) {
        let key = aggregate.identity();
        if let Some(sync_id) = self.sync_ids.get(&key) {
            assign_sync_id(aggregate, sync_id);
        }
        let handles = match self.handles.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.order.push(entry.key().clone());
                entry.insert(Vec::new())
            }
        };
        if !handles.iter().any(|h| Arc::ptr_eq(h, aggregate)) {
            handles.push(Arc::clone(aggregate));
        }
    }

    /// Sync id of the aggregate `key`, taken from any handle that has one or
    /// freshly generated, and written onto every handle.
    fn sync_id(&mut self, key: &str) -> String {
        if let Some(sync_id) = self.sync_ids.get(key) {
            return sync_id.clone();
        }
        let handles = self.handles.get(key).map(Vec::as_slice).unwrap_or_default();
        let sync_id = handles
            .iter()
            .find_map(|h| h.sync_id())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        for handle in handles {
            assign_sync_id(handle, &sync_id);
        }
        self.sync_ids.insert(key.to_string(), sync_id.clone());
        sync_id
    }

    /// Stores `changes` under `sync_id -> crud -> class -> id`.
    fn add(&mut self, sync_id: &str, record: &ChangeRecord, changes: Map<String, JsonValue>) {
        let resource = record.resource();
        let by_crud = self.data.entry(sync_id.to_string()).or_default();
        let by_class = by_crud
            .entry(record.crud_type().as_str())
            .or_insert_with(|| JsonValue::Object(Map::new()));
        let by_id = by_class
            .as_object_mut()
            .map(|m| {
                m.entry(resource.class())
                    .or_insert_with(|| JsonValue::Object(Map::new()))
            });
        if let Some(JsonValue::Object(ids)) = by_id {
            ids.insert(resource.id().to_string(), JsonValue::Object(changes));
        }
    }
}

impl OutboxService {
    /// Creates a service.
    pub fn new(
        extractor: Arc<RelationExtractor>,
        store: Arc<dyn SyncRecordStore>,
        aggregates: Arc<dyn AggregateStore>,
        scope: RequestScope,
    ) -> Self {
        Self {
            extractor,
            store,
            aggregates,
            scope,
        }
    }

    /// Creates one outbound record per aggregate touched by `applied` that
    /// `client` handles.
    ///
    /// Aggregates without a sync id get a fresh one, which is written back
    /// through the aggregate store after the record is inserted. Every
    /// record of the call shares one operation id.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if an in-scope change reaches no
    /// aggregate, a corruption error if the store reports no id, or any
    /// store error. Records written before the failure stay written.
    pub fn prepare_outgoing(
        &self,
        applied: &dyn ChangeCollection,
        client: &ClientDescriptor,
    ) -> CoreResult<Vec<SynchronizationRecord>> {
        let code = client.operation_code.as_str();
        let mut batch = Batch::default();

        for record in applied.iter() {
            let resource = record.resource();
            if self.is_stop(client, record) {
                continue;
            }

            let aggregate = if self.extractor.is_syncable(resource) {
                Some(Arc::clone(resource))
            } else {
                self.extractor.resolve_aggregate(resource, code)?
            };
            let Some(aggregate) = aggregate else {
                return Err(CoreError::config(format!(
                    "Client: {}, operation: {}, resource: {}. Syncable entities not found.",
                    client.client_type,
                    code,
                    resource.class()
                )));
            };

            batch.touch(&aggregate);
            let changes = payload_changes(record);
            if changes.is_empty() {
                continue;
            }
            let sync_id = batch.sync_id(&aggregate.identity());
            batch.add(&sync_id, record, changes);
        }

        self.create_records(client, batch)
    }

    fn is_stop(&self, client: &ClientDescriptor, record: &ChangeRecord) -> bool {
        let resource = record.resource();
        resource.class() == SYNCHRONIZATION_CLASS
            || !self
                .extractor
                .operation_codes_for(resource)
                .contains(&client.operation_code)
            || !client.supports_crud(record.crud_type())
    }

    fn create_records(
        &self,
        client: &ClientDescriptor,
        mut batch: Batch,
    ) -> CoreResult<Vec<SynchronizationRecord>> {
        let operation_id = Uuid::new_v4().to_string();
        let mut created = Vec::new();

        for key in &batch.order {
            let Some(sync_id) = batch.sync_ids.get(key) else {
                continue;
            };
            let Some(data) = batch.data.remove(sync_id) else {
                continue;
            };
            let Some(aggregate) = batch.handles.get(key).and_then(|h| h.first()) else {
                continue;
            };

            let record = SynchronizationRecord::new(
                FlowType::Outcoming,
                client.client_type.as_str(),
                client.operation_code.as_str(),
            )
            .with_operation_id(operation_id.as_str())
            .with_sync_id(sync_id.as_str())
            .with_payload(json!({
                "user": self.scope.actor(),
                "route": self.scope.route(),
                "data": data,
            }));

            let record = insert_with_id(self.store.as_ref(), record)?;
            self.aggregates.persist_sync_id(aggregate)?;
            debug!(id = record.id, sync_id = %sync_id, aggregate = %aggregate.identity(), "outbox record written");
            created.push(record);
        }

        if !created.is_empty() {
            info!(
                operation_code = %client.operation_code,
                operation_id = %operation_id,
                records = created.len(),
                "outbound batch prepared"
            );
        }
        Ok(created)
    }

    /// Stores `transfer` in the record's payload and flips it to
    /// `sync_in_progress`.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the record was never persisted.
    pub fn update_by_transferable(
        &self,
        record: &mut SynchronizationRecord,
        transfer: &TransferObject,
    ) -> CoreResult<()> {
        let Some(id) = record.id else {
            return Err(CoreError::corrupted(
                "Can not update synchronization's payload: ID is not set.",
            ));
        };

        if !record.payload.is_object() {
            record.payload = JsonValue::Object(Map::new());
        }
        if let JsonValue::Object(payload) = &mut record.payload {
            payload.insert(TRANSFER_OBJECT_KEY.to_string(), transfer.as_json().clone());
        }
        record.status = SyncStatus::InProgress;
        self.store
            .update_payload_and_status(id, &record.payload, &record.status)
    }

    /// Removes a record that turned out to have nothing to send.
    ///
    /// # Errors
    ///
    /// Returns any store error.
    pub fn delete(&self, record: &SynchronizationRecord) -> CoreResult<()> {
        if let Some(id) = record.id {
            self.store.delete(id)?;
            debug!(id, "outbox record deleted");
        }
        Ok(())
    }

    /// Writes a status and optional message, stamping the update time.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the record was never persisted, or any
    /// store error.
    pub fn update_status(
        &self,
        record: &mut SynchronizationRecord,
        status: SyncStatus,
        message: Option<String>,
    ) -> CoreResult<()> {
        let Some(id) = record.id else {
            return Err(CoreError::corrupted(
                "Can not update synchronization's status: ID is not set.",
            ));
        };
        let updated_at = now_millis();
        self.store
            .update_status(id, &status, message.as_deref(), updated_at)?;
        record.status = status;
        record.error_message = message;
        record.updated_at = Some(updated_at);
        Ok(())
    }
}

fn assign_sync_id(aggregate: &ObjectRef, sync_id: &str) {
    if aggregate.sync_id().as_deref() != Some(sync_id) {
        aggregate.set_sync_id(sync_id);
    }
}

/// Attribute diff of one change as stored in the payload.
///
/// Creates and deletes always carry an explicit `id` entry; references
/// collapse to their id.
fn payload_changes(record: &ChangeRecord) -> Map<String, JsonValue> {
    let id = record.resource().id();
    let mut changes = Map::new();
    match record.crud_type() {
        CrudType::Create => {
            changes.insert("id".into(), json!({"old": null, "new": id}));
        }
        CrudType::Delete => {
            changes.insert("id".into(), json!({"old": id, "new": null}));
        }
        CrudType::Update => {}
    }
    for (attribute, change) in record.changes() {
        changes.insert(
            attribute.clone(),
            json!({"old": change.old.to_json(), "new": change.new.to_json()}),
        );
    }
    changes
}
