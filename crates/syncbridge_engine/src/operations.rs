//! Entry points of the inbound endpoint and the status callback.

use crate::error::{SyncError, SyncResult};
use crate::processor::SyncProcessor;
use crate::report::ErrorReport;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use syncbridge_core::store::SyncRecordStore;
use syncbridge_core::{CoreError, OutboxService, ReceiveOperation, SyncStatus, SynchronizationRecord};
use tracing::{info, warn};

/// Validates inbound requests and hands them to the processor.
pub struct ReceiveOperationHandler {
    processor: Arc<SyncProcessor>,
}

impl ReceiveOperationHandler {
    /// Creates a handler.
    pub fn new(processor: Arc<SyncProcessor>) -> Self {
        Self { processor }
    }

    /// Runs one inbound request and collects every error it caused.
    ///
    /// Call [`ErrorReport::response`] on the result for the wire status.
    pub fn handle(&self, mut request: ReceiveOperation) -> ErrorReport {
        let mut report = ErrorReport::new();
        request.sanitize();
        if let Err(e) = request.validate() {
            warn!(operation_id = %request.operation_id, "{e}");
            report.add(&SyncError::from(e));
            return report;
        }

        match self.processor.synchronize_incoming(&request) {
            Ok(errors) => report.merge(errors),
            Err(e) => report.add(&e),
        }
        report
    }
}

/// Status reported by the receiving side for one outbound record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusOperation {
    /// Batch the record belongs to.
    #[serde(default)]
    pub operation_id: String,
    /// Aggregate the record was written for.
    #[serde(default)]
    pub sync_id: String,
    /// New status name.
    #[serde(default)]
    pub status: String,
    /// Optional error text.
    #[serde(default, alias = "errorMessage")]
    pub message: Option<String>,
}

impl SyncStatusOperation {
    /// Creates a request.
    pub fn new(
        operation_id: impl Into<String>,
        sync_id: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            operation_id: operation_id.into(),
            sync_id: sync_id.into(),
            status: status.into(),
            message: None,
        }
    }

    /// Attaches a message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Trims surrounding whitespace off every field; a blank message is
    /// dropped.
    pub fn sanitize(&mut self) {
        self.operation_id = self.operation_id.trim().to_string();
        self.sync_id = self.sync_id.trim().to_string();
        self.status = self.status.trim().to_string();
        self.message = self
            .message
            .take()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
    }

    /// Checks that every key is set and the status is known.
    ///
    /// # Errors
    ///
    /// Returns an invalid input error listing every violation.
    pub fn validate(&self) -> SyncResult<()> {
        let mut errors = Vec::new();
        for (key, value) in [
            ("operationId", &self.operation_id),
            ("status", &self.status),
            ("syncId", &self.sync_id),
        ] {
            if value.trim().is_empty() {
                errors.push(format!("Request key \"{key}\" is not set."));
            }
        }
        if !self.status.is_empty() && !SyncStatus::parse(&self.status).is_known() {
            errors.push(format!("Status \"{}\" is invalid.", self.status));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::invalid_input(errors.join("; ")).into())
        }
    }
}

/// Applies status callbacks to stored records.
pub struct SyncStatusOperationHandler {
    store: Arc<dyn SyncRecordStore>,
    outbox: OutboxService,
}

impl SyncStatusOperationHandler {
    /// Creates a handler.
    pub fn new(store: Arc<dyn SyncRecordStore>, outbox: OutboxService) -> Self {
        Self { store, outbox }
    }

    /// Finds the addressed record and writes the reported status.
    ///
    /// # Errors
    ///
    /// Returns an invalid input error for a malformed request, a not-found
    /// error if no record matches, or any store error.
    pub fn handle(&self, mut request: SyncStatusOperation) -> SyncResult<SynchronizationRecord> {
        request.sanitize();
        request.validate()?;

        let Some(mut record) = self
            .store
            .find_by_operation(&request.operation_id, &request.sync_id)?
        else {
            return Err(CoreError::not_found(format!(
                "Synchronization not found by operationId: \"{}\" and syncId: \"{}\"",
                request.operation_id, request.sync_id
            ))
            .into());
        };

        let status = SyncStatus::parse(&request.status);
        self.outbox
            .update_status(&mut record, status, request.message)?;
        info!(
            id = record.id,
            operation_id = %record.operation_id,
            status = %record.status,
            "synchronization status updated"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncbridge_core::store::MemoryRecordStore;
    use syncbridge_core::{
        FlowType, MemoryAggregateStore, RelationExtractor, RequestScope, SchemaRegistry,
        ExecutionMode,
    };

    fn handler() -> (SyncStatusOperationHandler, Arc<MemoryRecordStore>) {
        let store = Arc::new(MemoryRecordStore::new());
        let extractor = Arc::new(RelationExtractor::new(
            Arc::new(SchemaRegistry::new()),
            ExecutionMode::Test,
        ));
        let outbox = OutboxService::new(
            extractor,
            store.clone(),
            Arc::new(MemoryAggregateStore::new()),
            RequestScope::default(),
        );
        (SyncStatusOperationHandler::new(store.clone(), outbox), store)
    }

    #[test]
    fn validation_lists_every_missing_key() {
        let err = SyncStatusOperation::default().validate().unwrap_err();
        assert_eq!(err.status_code(), 400);
        let text = err.to_string();
        assert!(text.contains("Request key \"operationId\" is not set.; Request key \"status\""));
        assert!(text.contains("Request key \"syncId\" is not set."));
    }

    #[test]
    fn validation_rejects_unknown_status() {
        let err = SyncStatusOperation::new("op", "s1", "done")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("Status \"done\" is invalid."));
        assert!(SyncStatusOperation::new("op", "s1", "sync_ok")
            .validate()
            .is_ok());
    }

    #[test]
    fn message_alias_deserializes() {
        let op: SyncStatusOperation = serde_json::from_value(serde_json::json!({
            "operationId": "op",
            "syncId": "s1",
            "status": "sync_error",
            "errorMessage": "rejected"
        }))
        .unwrap();
        assert_eq!(op.message.as_deref(), Some("rejected"));
    }

    #[test]
    fn status_is_written_to_the_matching_record() {
        let (handler, store) = handler();
        let id = store
            .insert(
                &SynchronizationRecord::new(FlowType::Outcoming, "products", "OUT")
                    .with_operation_id("op")
                    .with_sync_id("s1")
                    .with_status(SyncStatus::InProgress),
            )
            .unwrap()
            .unwrap();

        let record = handler
            .handle(SyncStatusOperation::new(" op ", "s1", "sync_error").with_message("rejected"))
            .unwrap();
        assert_eq!(record.id, Some(id));

        let stored = store.get(id).unwrap().unwrap();
        assert_eq!(stored.status, SyncStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("rejected"));
        assert!(stored.updated_at.is_some());
    }

    #[test]
    fn missing_record_is_not_found() {
        let (handler, _) = handler();
        let err = handler
            .handle(SyncStatusOperation::new("op", "s9", "sync_ok"))
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(
            err.to_string(),
            "Synchronization not found by operationId: \"op\" and syncId: \"s9\""
        );
    }
}
