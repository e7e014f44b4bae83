//! Compact command implementation.

use super::CommandResult;
use std::path::Path;
use syncbridge_core::{Config, JournalRecordStore};
use tracing::info;

/// Runs the compact command.
pub fn run(path: &Path, dry_run: bool) -> CommandResult<()> {
    if !path.exists() {
        return Err(format!("No journal found at {:?}", path).into());
    }

    info!("Compacting journal at {:?}", path);
    println!("Compacting journal at {:?}", path);
    if dry_run {
        println!("(dry run - no changes will be made)");
    }
    println!();

    if dry_run {
        let store = JournalRecordStore::open_read_only(path)?;
        let stats = store.verify()?;
        println!("Compaction Analysis:");
        println!("  Frames:       {}", stats.frames);
        println!("  Live records: {}", store.len());
        println!("  Size:         {} bytes", stats.total_bytes);
        return Ok(());
    }

    let store = JournalRecordStore::open_path(path, &Config::default())?;
    let stats = store.compact()?;
    println!("  Frames before: {}", stats.frames_before);
    println!("  Frames after:  {}", stats.frames_after);
    println!("  Size before:   {} bytes", stats.bytes_before);
    println!("  Size after:    {} bytes", stats.bytes_after);
    println!(
        "  Space saved:   {} bytes",
        stats.bytes_before.saturating_sub(stats.bytes_after)
    );
    println!();
    println!("✓ Compaction complete");
    Ok(())
}
