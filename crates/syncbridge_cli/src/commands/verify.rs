//! Verify command implementation.

use super::CommandResult;
use std::path::Path;
use syncbridge_core::{JournalRecordStore, JournalStats};

/// Runs the verify command.
pub fn run(path: &Path) -> CommandResult<()> {
    if !path.exists() {
        return Err(format!("No journal found at {:?}", path).into());
    }
    println!("Verifying journal at {:?}", path);
    println!();

    let store = match JournalRecordStore::open_read_only(path) {
        Ok(store) => store,
        Err(e) => {
            println!("  {e}");
            println!();
            println!("✗ Journal verification failed");
            return Err("Verification failed".into());
        }
    };
    let stats = store.verify()?;
    print_stats(&stats, store.len());

    println!();
    if stats.is_clean() {
        println!("✓ Journal verification passed");
        Ok(())
    } else {
        println!("✗ Journal verification failed");
        Err("Verification failed".into())
    }
}

fn print_stats(stats: &JournalStats, live_records: usize) {
    println!("  Frames:       {}", stats.frames);
    println!("  Live records: {live_records}");
    println!("  Total bytes:  {}", stats.total_bytes);
    println!("  Valid bytes:  {}", stats.valid_bytes);
    if let Some(damage) = &stats.damage {
        println!("  Damage:       {damage}");
    }
}
