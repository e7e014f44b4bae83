//! # syncbridge storage
//!
//! Byte-level persistence for the synchronization journal.
//!
//! Backends are **opaque append-only byte stores**. They know nothing about
//! synchronization records; the [`Journal`] layers length-prefixed,
//! checksummed frames on top of any backend and the core crate decides what
//! the frame bodies mean.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and ephemeral stores
//! - [`FileBackend`] - A single file guarded by an advisory `fs2` lock
//!
//! ## Example
//!
//! ```rust
//! use syncbridge_storage::{InMemoryBackend, Journal};
//!
//! let mut journal = Journal::open(InMemoryBackend::new()).unwrap();
//! journal.append(1, b"hello").unwrap();
//! let frames = journal.frames().unwrap();
//! assert_eq!(frames[0].body, b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod frame;
mod journal;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::{FileBackend, LockMode};
pub use frame::{compute_crc32, Frame, FRAME_OVERHEAD};
pub use journal::{Journal, JournalStats};
pub use memory::InMemoryBackend;
