//! The synchronization orchestrator.

use crate::client::{InputClient, OutputClient};
use crate::error::{error_trace, SyncError, SyncResult};
use crate::report::ErrorReport;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use syncbridge_core::{
    ChangeCollection, CoreError, InboxService, OutboxService, ReceiveOperation, RelationExtractor,
    RequestScope, SyncStatus, SynchronizationRecord, TransferItem,
};
use tracing::{debug, error, info};

/// Rejection of an incoming flow outside the receiver route.
pub const INCOMING_ON_OUTGOING: &str =
    "Try of incoming synchronization on outcoming flow is prevented.";
/// Rejection of an outgoing flow inside the receiver route.
pub const OUTGOING_ON_INCOMING: &str =
    "Try of outcoming synchronization on incoming endpoint is prevented.";

/// Registry of clients and runner of the incoming and outgoing flows.
///
/// Every client, and inside a client every record, is processed
/// independently: a failure is written to the affected record, collected,
/// and processing moves on.
pub struct SyncProcessor {
    scope: RequestScope,
    extractor: Arc<RelationExtractor>,
    inbox: InboxService,
    outbox: OutboxService,
    input_clients: Vec<Arc<dyn InputClient>>,
    output_clients: Vec<Arc<dyn OutputClient>>,
}

impl SyncProcessor {
    /// Creates a processor without clients.
    pub fn new(
        scope: RequestScope,
        extractor: Arc<RelationExtractor>,
        inbox: InboxService,
        outbox: OutboxService,
    ) -> Self {
        Self {
            scope,
            extractor,
            inbox,
            outbox,
            input_clients: Vec::new(),
            output_clients: Vec::new(),
        }
    }

    /// Registers an input client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the descriptor is incomplete or
    /// another input client already uses the operation code.
    pub fn add_input_client(&mut self, client: Arc<dyn InputClient>) -> SyncResult<()> {
        client.descriptor().validate(client.name())?;
        let code = client.operation_code();
        if self.input_clients.iter().any(|c| c.operation_code() == code) {
            return Err(duplicate_code(code, client.name()));
        }
        debug!(client = client.name(), operation_code = code, "input client registered");
        self.input_clients.push(client);
        Ok(())
    }

    /// Registers an output client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the descriptor is incomplete or
    /// another output client already uses the operation code.
    pub fn add_output_client(&mut self, client: Arc<dyn OutputClient>) -> SyncResult<()> {
        client.descriptor().validate(client.name())?;
        let code = client.operation_code();
        if self.output_clients.iter().any(|c| c.operation_code() == code) {
            return Err(duplicate_code(code, client.name()));
        }
        debug!(client = client.name(), operation_code = code, "output client registered");
        self.output_clients.push(client);
        Ok(())
    }

    /// Operation codes of every registered client.
    pub fn operation_codes(&self) -> BTreeSet<String> {
        self.input_clients
            .iter()
            .map(|c| c.operation_code().to_string())
            .chain(
                self.output_clients
                    .iter()
                    .map(|c| c.operation_code().to_string()),
            )
            .collect()
    }

    /// Validates every sync declaration against the registered codes.
    ///
    /// # Errors
    ///
    /// Returns a configuration error listing every violation unless the
    /// execution mode only logs them.
    pub fn check_declarations_by_clients(&self) -> SyncResult<Vec<String>> {
        Ok(self
            .extractor
            .validate_all_declarations(&self.operation_codes())?)
    }

    /// True if the current request is the inbound endpoint.
    pub fn is_incoming_operation(&self) -> bool {
        self.scope.is_incoming()
    }

    /// The request scope the processor reads its direction from.
    pub fn scope(&self) -> &RequestScope {
        &self.scope
    }

    /// Runs every supporting input client over `request`.
    ///
    /// # Errors
    ///
    /// Returns an invalid input error if the current request is not the
    /// inbound endpoint. Every other failure ends up in the report.
    pub fn synchronize_incoming(&self, request: &ReceiveOperation) -> SyncResult<ErrorReport> {
        if !self.is_incoming_operation() {
            error!("{}", INCOMING_ON_OUTGOING);
            return Err(CoreError::invalid_input(INCOMING_ON_OUTGOING).into());
        }

        let mut report = ErrorReport::new();
        for client in &self.input_clients {
            if !client.is_supported(request) {
                continue;
            }
            self.run_input_client(client.as_ref(), request, &mut report);
        }

        info!(
            operation_id = %request.operation_id,
            operation_code = %request.operation_code,
            errors = report.len(),
            "incoming synchronization finished"
        );
        Ok(report)
    }

    fn run_input_client(
        &self,
        client: &dyn InputClient,
        request: &ReceiveOperation,
        report: &mut ErrorReport,
    ) {
        let envelope = match client.build_transferable_input(request) {
            Ok(envelope) => envelope,
            Err(e) => {
                report.add(&e);
                self.emergency(client, request, &error_trace(&e));
                return;
            }
        };
        let items: HashMap<&str, &TransferItem> = envelope
            .items
            .iter()
            .map(|item| (item.sync_id.as_str(), item))
            .collect();

        let records = match self.inbox.prepare_incoming(&envelope, client.descriptor()) {
            Ok(records) => records,
            Err(e) => {
                let e = SyncError::from(e);
                report.add(&e);
                self.emergency(client, request, &error_trace(&e));
                return;
            }
        };

        for mut record in records {
            let sync_id = record.sync_id.clone().unwrap_or_default();
            let Some(item) = items.get(sync_id.as_str()) else {
                let message = format!(
                    "Transferable object was not created for operationId: {}, syncId: {}",
                    record.operation_id, sync_id
                );
                report.add(&SyncError::logic(message.as_str()));
                self.emergency(client, request, &message);
                continue;
            };

            match client.synchronize_input(&record, item) {
                Ok(()) => {
                    debug!(id = record.id, sync_id = %sync_id, "inbound item applied");
                    self.set_status(&mut record, SyncStatus::Ok, None);
                }
                Err(e) => {
                    report.add(&e);
                    let text = error_trace(&e);
                    error!(client = client.name(), sync_id = %sync_id, "{text}");
                    self.set_status(&mut record, SyncStatus::TransportError, Some(text));
                }
            }
        }
    }

    /// Runs every supporting output client over the flushed changes.
    ///
    /// Sent records stay `sync_in_progress` until the receiving side reports
    /// a final status. Returns the message of every failure; an empty list
    /// means every record was either sent or dropped.
    pub fn synchronize_outgoing(
        &self,
        applied: &dyn ChangeCollection,
        chronology: &dyn ChangeCollection,
    ) -> Vec<String> {
        if self.is_incoming_operation() {
            error!("{}", OUTGOING_ON_INCOMING);
            return vec![OUTGOING_ON_INCOMING.to_string()];
        }

        let mut errors = Vec::new();
        for client in &self.output_clients {
            if !client.is_supported(applied) {
                continue;
            }

            let records = match self.outbox.prepare_outgoing(applied, client.descriptor()) {
                Ok(records) => records,
                Err(e) => {
                    let e = SyncError::from(e);
                    error!(client = client.name(), "{}", error_trace(&e));
                    errors.push(e.to_string());
                    continue;
                }
            };

            for mut record in records {
                if let Err(e) = self.dispatch(client.as_ref(), applied, chronology, &mut record) {
                    let text = error_trace(&e);
                    error!(client = client.name(), sync_id = ?record.sync_id, "{text}");
                    let status = if e.is_invalid_output() {
                        SyncStatus::MappingError
                    } else {
                        SyncStatus::TransportError
                    };
                    errors.push(e.to_string());
                    self.set_status(&mut record, status, Some(text));
                }
            }
        }
        errors
    }

    fn dispatch(
        &self,
        client: &dyn OutputClient,
        applied: &dyn ChangeCollection,
        chronology: &dyn ChangeCollection,
        record: &mut SynchronizationRecord,
    ) -> SyncResult<()> {
        let Some(transfer) = client.build_transferable_output(applied, chronology, record)? else {
            debug!(id = record.id, "nothing to send, dropping outbox record");
            self.outbox.delete(record)?;
            return Ok(());
        };
        self.outbox.update_by_transferable(record, &transfer)?;
        client.synchronize_output(&transfer)?;
        debug!(id = record.id, client = client.name(), "outbound record sent");
        Ok(())
    }

    fn emergency(&self, client: &dyn InputClient, request: &ReceiveOperation, message: &str) {
        error!(client = client.name(), "{message}");
        if let Err(e) = self
            .inbox
            .insert_emergency(request, client.descriptor(), message)
        {
            error!(client = client.name(), error = %e, "emergency inbox record was not written");
        }
    }

    fn set_status(
        &self,
        record: &mut SynchronizationRecord,
        status: SyncStatus,
        message: Option<String>,
    ) {
        if let Err(e) = self.outbox.update_status(record, status, message) {
            error!(id = record.id, error = %e, "status update failed");
        }
    }
}

fn duplicate_code(code: &str, client: &str) -> SyncError {
    CoreError::config(format!("Code {code} has already set in {client}")).into()
}
