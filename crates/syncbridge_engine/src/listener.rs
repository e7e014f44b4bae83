//! Hooks called by the unit of work around a flush.

use crate::error::SyncResult;
use crate::processor::SyncProcessor;
use parking_lot::Mutex;
use std::error::Error as StdError;
use std::sync::Arc;
use syncbridge_core::{ChangeApplicator, ChangeMap, ChangeRecord, CrudType, ObjectRef, RawChangeSet};
use tracing::{debug, warn};

/// Prefix of every notification produced after a flush.
pub const NOTIFICATION_PREFIX: &str = "Synchronization: ";

/// Pending work of a unit of work at flush time.
pub trait UnitOfWork {
    /// Objects about to be inserted, with their raw changes.
    fn scheduled_insertions(&self) -> Vec<(ObjectRef, RawChangeSet)>;

    /// Objects about to be updated, with their raw changes.
    fn scheduled_updates(&self) -> Vec<(ObjectRef, RawChangeSet)>;

    /// Objects about to be deleted.
    fn scheduled_deletions(&self) -> Vec<ObjectRef>;
}

/// A unit of work assembled by hand.
#[derive(Debug, Clone, Default)]
pub struct PendingFlush {
    insertions: Vec<(ObjectRef, RawChangeSet)>,
    updates: Vec<(ObjectRef, RawChangeSet)>,
    deletions: Vec<ObjectRef>,
}

impl PendingFlush {
    /// Creates an empty flush.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules an insertion.
    #[must_use]
    pub fn insert(mut self, resource: ObjectRef, changes: RawChangeSet) -> Self {
        self.insertions.push((resource, changes));
        self
    }

    /// Schedules an update.
    #[must_use]
    pub fn update(mut self, resource: ObjectRef, changes: RawChangeSet) -> Self {
        self.updates.push((resource, changes));
        self
    }

    /// Schedules a deletion.
    #[must_use]
    pub fn delete(mut self, resource: ObjectRef) -> Self {
        self.deletions.push(resource);
        self
    }
}

impl UnitOfWork for PendingFlush {
    fn scheduled_insertions(&self) -> Vec<(ObjectRef, RawChangeSet)> {
        self.insertions.clone()
    }

    fn scheduled_updates(&self) -> Vec<(ObjectRef, RawChangeSet)> {
        self.updates.clone()
    }

    fn scheduled_deletions(&self) -> Vec<ObjectRef> {
        self.deletions.clone()
    }
}

/// Feeds flushes into the applicator and runs the outgoing flow after them.
///
/// Nothing is captured or sent while the current request is the inbound
/// endpoint, so imported data never echoes back to its source.
pub struct FlushListener {
    applicator: Arc<Mutex<ChangeApplicator>>,
    processor: Arc<SyncProcessor>,
}

impl FlushListener {
    /// Creates a listener.
    pub fn new(applicator: Arc<Mutex<ChangeApplicator>>, processor: Arc<SyncProcessor>) -> Self {
        Self {
            applicator,
            processor,
        }
    }

    /// Captures the pending changes of `unit`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a deleted object's sync path cannot
    /// be followed; the flush should not proceed.
    pub fn on_flush(&self, unit: &dyn UnitOfWork) -> SyncResult<()> {
        let mut applicator = self.applicator.lock();
        applicator.reset(false);

        if self.processor.is_incoming_operation() {
            debug!("inbound request, change capture skipped");
            return Ok(());
        }

        for (crud_type, pending) in [
            (CrudType::Create, unit.scheduled_insertions()),
            (CrudType::Update, unit.scheduled_updates()),
        ] {
            for (resource, raw) in pending {
                let changes = applicator.prepare_valid_changes(&resource, &raw);
                applicator.apply_change(ChangeRecord::new(resource, changes, crud_type))?;
            }
        }
        for resource in unit.scheduled_deletions() {
            applicator.apply_change(ChangeRecord::new(
                resource,
                ChangeMap::new(),
                CrudType::Delete,
            ))?;
        }
        Ok(())
    }

    /// Sends the captured changes and returns one notification per failure.
    ///
    /// The applicator is unlocked while clients run, so a client whose
    /// transport flushes again does not block on it.
    pub fn post_flush(&self) -> Vec<String> {
        if self.processor.is_incoming_operation() {
            return Vec::new();
        }
        let (applied, chronology) = {
            let applicator = self.applicator.lock();
            if !applicator.has_changes() {
                return Vec::new();
            }
            (applicator.applied().clone(), applicator.chronology().clone())
        };

        self.processor
            .synchronize_outgoing(&applied, &chronology)
            .into_iter()
            .map(|error| format!("{NOTIFICATION_PREFIX}{error}"))
            .collect()
    }
}

/// Drops all diff state after a storage driver failure.
pub struct DriverErrorListener {
    applicator: Arc<Mutex<ChangeApplicator>>,
}

impl DriverErrorListener {
    /// Creates a listener.
    pub fn new(applicator: Arc<Mutex<ChangeApplicator>>) -> Self {
        Self { applicator }
    }

    /// Deep-resets the applicator so a retried flush starts clean.
    pub fn on_driver_error(&self, error: &dyn StdError) {
        warn!(error = %error, "storage driver failed, discarding change history");
        self.applicator.lock().reset(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{OutputClient, SyncClient};
    use crate::mock::{MockFailure, MockOutputClient};
    use std::collections::BTreeMap;
    use syncbridge_core::store::{MemoryRecordStore, SyncRecordStore};
    use syncbridge_core::{
        ChangeCollection, ClassSchema, ClientDescriptor, Config, DomainObject, ExecutionMode,
        FieldValue, InboxService, MemoryAggregateStore, OutboxService, RelationExtractor,
        RequestContext, RequestScope, SchemaRegistry, SynchronizationRecord, TransferObject,
        RECEIVER_ROUTE,
    };

    struct Fixture {
        listener: FlushListener,
        applicator: Arc<Mutex<ChangeApplicator>>,
        client: Arc<MockOutputClient>,
        store: Arc<MemoryRecordStore>,
        scope: RequestScope,
    }

    fn processor_parts() -> (Arc<RelationExtractor>, Arc<MemoryRecordStore>, RequestScope, SyncProcessor) {
        let registry = SchemaRegistry::new()
            .with_class(
                ClassSchema::new("Product")
                    .syncable()
                    .fields(["code", "enabled"])
                    .sync_path(".", ["OUT"]),
            )
            .unwrap();
        let extractor = Arc::new(RelationExtractor::new(
            Arc::new(registry),
            ExecutionMode::Test,
        ));
        let store = Arc::new(MemoryRecordStore::new());
        let scope = RequestScope::default();
        let outbox = OutboxService::new(
            extractor.clone(),
            store.clone(),
            Arc::new(MemoryAggregateStore::new()),
            scope.clone(),
        );
        let processor = SyncProcessor::new(
            scope.clone(),
            extractor.clone(),
            InboxService::new(store.clone(), RECEIVER_ROUTE),
            outbox,
        );
        (extractor, store, scope, processor)
    }

    fn descriptor() -> ClientDescriptor {
        ClientDescriptor::new("OUT", "products", CrudType::ALL)
    }

    fn fixture() -> Fixture {
        let (extractor, store, scope, mut processor) = processor_parts();
        let client = Arc::new(MockOutputClient::new(descriptor(), extractor.clone()));
        processor.add_output_client(client.clone()).unwrap();

        let applicator = Arc::new(Mutex::new(ChangeApplicator::new(
            extractor,
            &Config::default(),
        )));
        Fixture {
            listener: FlushListener::new(applicator.clone(), Arc::new(processor)),
            applicator,
            client,
            store,
            scope,
        }
    }

    /// Output client that notes whether the applicator is free while it sends.
    struct ApplicatorWatchingClient {
        inner: MockOutputClient,
        applicator: Arc<Mutex<ChangeApplicator>>,
        unlocked_on_send: Mutex<Vec<bool>>,
    }

    impl SyncClient for ApplicatorWatchingClient {
        fn descriptor(&self) -> &ClientDescriptor {
            self.inner.descriptor()
        }
    }

    impl OutputClient for ApplicatorWatchingClient {
        fn is_supported(&self, applied: &dyn ChangeCollection) -> bool {
            self.inner.is_supported(applied)
        }

        fn build_transferable_output(
            &self,
            applied: &dyn ChangeCollection,
            chronology: &dyn ChangeCollection,
            record: &SynchronizationRecord,
        ) -> SyncResult<Option<TransferObject>> {
            self.inner
                .build_transferable_output(applied, chronology, record)
        }

        fn synchronize_output(&self, transfer: &TransferObject) -> SyncResult<()> {
            let unlocked = self.applicator.try_lock().is_some();
            self.unlocked_on_send.lock().push(unlocked);
            self.inner.synchronize_output(transfer)
        }
    }

    fn raw(pairs: &[(&str, FieldValue, FieldValue)]) -> RawChangeSet {
        pairs
            .iter()
            .map(|(name, old, new)| (name.to_string(), vec![old.clone(), new.clone()]))
            .collect::<BTreeMap<_, _>>()
    }

    #[test]
    fn flush_then_post_flush_sends_changes() {
        let f = fixture();
        let product = DomainObject::new("Product", 1).into_ref();
        let unit = PendingFlush::new().update(
            product,
            raw(&[
                ("code", "A".into(), "B".into()),
                ("unknown", 1i64.into(), 2i64.into()),
            ]),
        );

        f.listener.on_flush(&unit).unwrap();
        assert!(f.applicator.lock().has_changes());

        let notifications = f.listener.post_flush();
        assert!(notifications.is_empty());
        assert_eq!(f.client.sent().len(), 1);
        assert_eq!(f.store.len(), 1);
    }

    #[test]
    fn delete_is_captured_with_empty_changes() {
        let f = fixture();
        let product = DomainObject::new("Product", 4)
            .with_field("code", "MUG")
            .with_sync_id("s4")
            .into_ref();
        f.listener
            .on_flush(&PendingFlush::new().delete(product))
            .unwrap();

        let applicator = f.applicator.lock();
        let change = applicator.applied().get("Product::4").unwrap();
        assert_eq!(change.crud_type(), CrudType::Delete);
        assert_eq!(change.changes().len(), 1);
        assert!(change.changes().contains_key("id"));
    }

    #[test]
    fn incoming_context_captures_and_sends_nothing() {
        let f = fixture();
        let _guard = f.scope.enter(RequestContext::new(RECEIVER_ROUTE));
        let product = DomainObject::new("Product", 1).into_ref();
        let unit = PendingFlush::new().insert(product, raw(&[("code", FieldValue::Null, "A".into())]));

        f.listener.on_flush(&unit).unwrap();
        assert!(!f.applicator.lock().has_changes());
        assert!(f.listener.post_flush().is_empty());
        assert!(f.store.is_empty());
    }

    #[test]
    fn failures_become_prefixed_notifications() {
        let f = fixture();
        f.client
            .set_failure(Some(MockFailure::Transport("timeout".into())));
        let product = DomainObject::new("Product", 1).into_ref();
        f.listener
            .on_flush(&PendingFlush::new().update(product, raw(&[("code", "A".into(), "B".into())])))
            .unwrap();

        assert_eq!(
            f.listener.post_flush(),
            vec!["Synchronization: transport error: timeout".to_string()]
        );
    }

    #[test]
    fn clients_send_without_holding_the_applicator() {
        let (extractor, store, _scope, mut processor) = processor_parts();
        let applicator = Arc::new(Mutex::new(ChangeApplicator::new(
            extractor.clone(),
            &Config::default(),
        )));
        let client = Arc::new(ApplicatorWatchingClient {
            inner: MockOutputClient::new(descriptor(), extractor),
            applicator: applicator.clone(),
            unlocked_on_send: Mutex::new(Vec::new()),
        });
        processor.add_output_client(client.clone()).unwrap();
        let listener = FlushListener::new(applicator.clone(), Arc::new(processor));

        let product = DomainObject::new("Product", 1).into_ref();
        listener
            .on_flush(&PendingFlush::new().update(product, raw(&[("code", "A".into(), "B".into())])))
            .unwrap();

        assert!(listener.post_flush().is_empty());
        assert_eq!(*client.unlocked_on_send.lock(), vec![true]);
        assert_eq!(store.len(), 1);
        assert!(applicator.lock().has_changes());
    }

    #[test]
    fn driver_error_forgets_seen_values() {
        let f = fixture();
        let product = DomainObject::new("Product", 1).into_ref();
        let unit = PendingFlush::new().update(product, raw(&[("code", "A".into(), "B".into())]));

        f.listener.on_flush(&unit).unwrap();
        f.listener.on_flush(&unit).unwrap();
        assert!(!f.applicator.lock().has_changes());

        let io = std::io::Error::other("connection reset");
        DriverErrorListener::new(f.applicator.clone()).on_driver_error(&io);
        f.listener.on_flush(&unit).unwrap();
        assert!(f.applicator.lock().has_changes());
    }
}
