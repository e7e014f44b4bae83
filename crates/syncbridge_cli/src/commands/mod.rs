//! CLI command implementations.

pub mod compact;
pub mod list;
pub mod set_status;
pub mod show;
pub mod verify;

use std::path::Path;
use syncbridge_core::JournalRecordStore;
use syncbridge_core::store::SyncRecordStore;

type CommandResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Opens an existing journal without taking the write lock.
fn open_read_only(path: &Path) -> CommandResult<impl SyncRecordStore> {
    if !path.exists() {
        return Err(format!("No journal found at {:?}", path).into());
    }
    Ok(JournalRecordStore::open_read_only(path)?)
}
