//! Show command implementation.

use super::{open_read_only, CommandResult};
use std::path::Path;
use syncbridge_core::store::SyncRecordStore;

/// Runs the show command.
pub fn run(path: &Path, id: u64) -> CommandResult<()> {
    let store = open_read_only(path)?;
    let record = store
        .get(id)?
        .ok_or_else(|| format!("Synchronization not found by id: {id}"))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
