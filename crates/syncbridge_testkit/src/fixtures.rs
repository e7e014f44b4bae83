//! Wired processors and journal files with automatic cleanup.

use crate::catalog;
use crate::clients::{JsonLineSink, ProductFromApiClient, ProductToFileClient};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use syncbridge_core::store::SyncRecordStore;
use syncbridge_core::{
    ChangeApplicator, Config, ExecutionMode, FieldValue, InboxService, JournalRecordStore,
    MemoryAggregateStore, MemoryRecordStore, OutboxService, RawChangeSet, RelationExtractor,
    RequestContext, RequestScope, ScopeGuard,
};
use syncbridge_engine::{
    DriverErrorListener, FlushListener, PendingFlush, ReceiveOperationHandler, SyncProcessor,
    SyncResult, SyncStatusOperationHandler,
};
use syncbridge_storage::FileBackend;
use tempfile::TempDir;

/// Route of the admin requests the harness simulates.
pub const ADMIN_ROUTE: &str = "admin_product_update";

/// A journal-backed record store in a temporary directory.
pub struct TestJournal {
    /// The store.
    pub store: Arc<JournalRecordStore<FileBackend>>,
    path: PathBuf,
    _temp_dir: TempDir,
}

impl TestJournal {
    /// Creates an empty journal.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("records.journal");
        let store = JournalRecordStore::open_path(&path, &Config::default())
            .expect("Failed to open journal");
        Self {
            store: Arc::new(store),
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Path of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the store and opens the file again.
    ///
    /// Every other handle to the store must be dropped first, otherwise the
    /// file is still locked.
    #[must_use]
    pub fn reopen(self) -> Self {
        let Self {
            store,
            path,
            _temp_dir,
        } = self;
        drop(store);
        let store =
            JournalRecordStore::open_path(&path, &Config::default()).expect("Failed to reopen journal");
        Self {
            store: Arc::new(store),
            path,
            _temp_dir,
        }
    }
}

impl Default for TestJournal {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds raw flush changes from `(attribute, old, new)` triples.
pub fn raw_changes<I, S, O, N>(changes: I) -> RawChangeSet
where
    I: IntoIterator<Item = (S, O, N)>,
    S: Into<String>,
    O: Into<FieldValue>,
    N: Into<FieldValue>,
{
    changes
        .into_iter()
        .map(|(name, old, new)| (name.into(), vec![old.into(), new.into()]))
        .collect()
}

/// The catalog wired end to end: schema, stores, both demo clients, the
/// processor, the flush hooks and the two request handlers.
pub struct SyncHarness {
    /// Shared request scope.
    pub scope: RequestScope,
    /// Extractor over the catalog schema.
    pub extractor: Arc<RelationExtractor>,
    /// Record store every service writes to.
    pub store: Arc<dyn SyncRecordStore>,
    /// Sync ids written back to aggregates.
    pub aggregates: Arc<MemoryAggregateStore>,
    /// Applicator shared by the listeners.
    pub applicator: Arc<Mutex<ChangeApplicator>>,
    /// Processor with both demo clients registered.
    pub processor: Arc<SyncProcessor>,
    /// The demo input client.
    pub input: Arc<ProductFromApiClient>,
    /// The demo output client.
    pub output: Arc<ProductToFileClient>,
    /// Flush hooks.
    pub listener: FlushListener,
    /// Driver error hook.
    pub driver_errors: DriverErrorListener,
    /// Inbound endpoint.
    pub receive: ReceiveOperationHandler,
    /// Status callback endpoint.
    pub status: SyncStatusOperationHandler,
}

impl SyncHarness {
    /// A harness over an in-memory record store.
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryRecordStore::new()))
    }

    /// A harness writing to `store`.
    pub fn with_store(store: Arc<dyn SyncRecordStore>) -> Self {
        let config = Config::new().mode(ExecutionMode::Test);
        let schema = catalog::schema_with_codes(&[catalog::PRODUCT_TO_FILE, catalog::PRODUCT_RECEIVE])
            .expect("Failed to build catalog schema");
        let extractor = Arc::new(RelationExtractor::new(Arc::new(schema), config.mode));
        let scope = RequestScope::new(&config.receiver_route);
        let aggregates = Arc::new(MemoryAggregateStore::new());

        let inbox = InboxService::new(store.clone(), config.receiver_route.as_str());
        let outbox = OutboxService::new(
            extractor.clone(),
            store.clone(),
            aggregates.clone(),
            scope.clone(),
        );
        let mut processor =
            SyncProcessor::new(scope.clone(), extractor.clone(), inbox, outbox.clone());

        let input = Arc::new(ProductFromApiClient::new());
        let output = Arc::new(ProductToFileClient::new(
            extractor.clone(),
            JsonLineSink::memory(),
        ));
        processor
            .add_input_client(input.clone())
            .expect("Failed to register input client");
        processor
            .add_output_client(output.clone())
            .expect("Failed to register output client");
        processor
            .check_declarations_by_clients()
            .expect("Catalog declarations do not match the clients");
        let processor = Arc::new(processor);

        let applicator = Arc::new(Mutex::new(ChangeApplicator::new(
            extractor.clone(),
            &config,
        )));
        Self {
            listener: FlushListener::new(applicator.clone(), processor.clone()),
            driver_errors: DriverErrorListener::new(applicator.clone()),
            receive: ReceiveOperationHandler::new(processor.clone()),
            status: SyncStatusOperationHandler::new(store.clone(), outbox),
            scope,
            extractor,
            store,
            aggregates,
            applicator,
            processor,
            input,
            output,
        }
    }

    /// Makes the inbound endpoint the current request.
    pub fn enter_receiver(&self) -> ScopeGuard {
        let route = self.scope.receiver_route().to_string();
        self.scope.enter(RequestContext::new(route))
    }

    /// Makes an admin request by `actor` the current request.
    pub fn enter_admin(&self, actor: &str) -> ScopeGuard {
        self.scope
            .enter(RequestContext::new(ADMIN_ROUTE).with_actor(actor))
    }

    /// Runs both flush hooks over `unit` and returns the notifications.
    ///
    /// # Errors
    ///
    /// Returns the error of the capture step.
    pub fn flush(&self, unit: &PendingFlush) -> SyncResult<Vec<String>> {
        self.listener.on_flush(unit)?;
        Ok(self.listener.post_flush())
    }
}

impl Default for SyncHarness {
    fn default() -> Self {
        Self::new()
    }
}
