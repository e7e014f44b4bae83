//! Capability contracts implemented by pluggable synchronization clients.
//!
//! A client pairs a domain-specific transform with a transport. The
//! processor only ever talks to clients through [`InputClient`] and
//! [`OutputClient`].

use crate::error::SyncResult;
use std::sync::Arc;
use syncbridge_core::{
    ChangeCollection, ChangeRecord, ClientDescriptor, ReceiveOperation, RelationExtractor,
    SynchronizationRecord, TransferEnvelope, TransferItem, TransferObject,
};

/// Identity shared by input and output clients.
pub trait SyncClient: Send + Sync {
    /// Operation code, type and crud types of the client.
    fn descriptor(&self) -> &ClientDescriptor;

    /// Name used in logs and configuration errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Operation code of the client.
    fn operation_code(&self) -> &str {
        &self.descriptor().operation_code
    }
}

/// Applies inbound data to the local domain.
pub trait InputClient: SyncClient {
    /// Whether the client handles `request`.
    fn is_supported(&self, request: &ReceiveOperation) -> bool {
        request.operation_code == self.descriptor().operation_code
    }

    /// Decodes the raw request into typed items.
    ///
    /// # Errors
    ///
    /// Returns an error if the request data does not match the client's
    /// item format.
    fn build_transferable_input(&self, request: &ReceiveOperation) -> SyncResult<TransferEnvelope>;

    /// Applies one item whose inbox record is `record`.
    ///
    /// # Errors
    ///
    /// Any error marks the record `error_on_sync_transport`.
    fn synchronize_input(&self, record: &SynchronizationRecord, item: &TransferItem)
        -> SyncResult<()>;
}

/// Sends local changes to an external system.
pub trait OutputClient: SyncClient {
    /// Whether any change in `applied` concerns this client.
    fn is_supported(&self, applied: &dyn ChangeCollection) -> bool;

    /// Builds the data to send for `record`.
    ///
    /// `None` means there is nothing to send and the record is dropped.
    ///
    /// # Errors
    ///
    /// An invalid output error marks the record `error_on_sync_mapping`; any
    /// other error marks it `error_on_sync_transport`.
    fn build_transferable_output(
        &self,
        applied: &dyn ChangeCollection,
        chronology: &dyn ChangeCollection,
        record: &SynchronizationRecord,
    ) -> SyncResult<Option<TransferObject>>;

    /// Delivers `transfer`.
    ///
    /// # Errors
    ///
    /// Any error marks the record `error_on_sync_transport`.
    fn synchronize_output(&self, transfer: &TransferObject) -> SyncResult<()>;
}

/// Shared behavior for output clients, meant to be held as a field.
#[derive(Debug, Clone)]
pub struct OutputSupport {
    extractor: Arc<RelationExtractor>,
}

impl OutputSupport {
    /// Creates the helper over `extractor`.
    pub fn new(extractor: Arc<RelationExtractor>) -> Self {
        Self { extractor }
    }

    /// The extractor.
    pub fn extractor(&self) -> &RelationExtractor {
        &self.extractor
    }

    /// True if any changed resource declares `operation_code`.
    pub fn declares_operation(&self, applied: &dyn ChangeCollection, operation_code: &str) -> bool {
        applied.iter().any(|change| {
            self.extractor
                .operation_codes_for(change.resource())
                .contains(operation_code)
        })
    }

    /// True if `change` belongs to an aggregate other than the one `record`
    /// was written for.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the change's path cannot be followed.
    pub fn skip_by_sync_id(
        &self,
        change: &ChangeRecord,
        record: &SynchronizationRecord,
        operation_code: &str,
    ) -> SyncResult<bool> {
        let resource = change.resource();
        let aggregate = if self.extractor.is_syncable(resource) {
            Some(Arc::clone(resource))
        } else {
            self.extractor.resolve_aggregate(resource, operation_code)?
        };
        Ok(aggregate.is_some_and(|a| a.sync_id() != record.sync_id))
    }
}
