//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of storage.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// A frame failed its checksum.
    #[error("checksum mismatch at offset {offset}: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Offset of the damaged frame.
        offset: u64,
        /// CRC stored in the frame.
        expected: u32,
        /// CRC computed over the frame contents.
        actual: u32,
    },

    /// The journal structure is damaged beyond the recoverable tail.
    #[error("journal corrupted: {0}")]
    Corrupted(String),

    /// A write was attempted through a shared (read-only) handle.
    #[error("journal was opened read-only")]
    ReadOnly,

    /// Another process holds the journal lock.
    #[error("journal is locked by another process: {0}")]
    Locked(String),
}

impl StorageError {
    pub(crate) fn truncate_beyond_size(new_size: u64, size: u64) -> Self {
        Self::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("cannot truncate to size {new_size} which is greater than current size {size}"),
        ))
    }
}
