//! Set-status command implementation.

use super::CommandResult;
use crate::commands::list::summary_line;
use std::path::Path;
use std::sync::Arc;
use syncbridge_core::{
    Config, ExecutionMode, JournalRecordStore, MemoryAggregateStore, OutboxService,
    RelationExtractor, RequestScope, SchemaRegistry,
};
use syncbridge_engine::{SyncStatusOperation, SyncStatusOperationHandler};
use tracing::info;

/// Runs the set-status command.
pub fn run(
    path: &Path,
    operation_id: String,
    sync_id: String,
    status: String,
    message: Option<String>,
) -> CommandResult<()> {
    if !path.exists() {
        return Err(format!("No journal found at {:?}", path).into());
    }
    info!("Setting status {:?} for {}/{} in {:?}", status, operation_id, sync_id, path);
    let config = Config::default();
    let store = Arc::new(JournalRecordStore::open_path(path, &config)?);

    // Status updates never resolve aggregates.
    let extractor = Arc::new(RelationExtractor::new(
        Arc::new(SchemaRegistry::new()),
        ExecutionMode::Production,
    ));
    let outbox = OutboxService::new(
        extractor,
        store.clone(),
        Arc::new(MemoryAggregateStore::new()),
        RequestScope::new(&config.receiver_route),
    );
    let handler = SyncStatusOperationHandler::new(store, outbox);

    let mut request = SyncStatusOperation::new(operation_id, sync_id, status);
    request.message = message;
    let record = handler.handle(request)?;
    println!("{}", summary_line(&record));
    Ok(())
}
