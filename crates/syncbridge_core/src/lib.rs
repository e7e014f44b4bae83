//! # syncbridge core
//!
//! Change capture and durable outbox/inbox records for synchronizing domain
//! aggregates with external systems.
//!
//! This crate provides:
//! - A schema registry with per-class sync path declarations
//! - The [`RelationExtractor`], which maps any mutated object to the
//!   syncable aggregate that owns a sync id
//! - The [`ChangeApplicator`], which deduplicates flushed mutations into a
//!   [`ChronologyLog`] and an [`AppliedChangeSet`]
//! - [`SynchronizationRecord`] with its status state machine, and record
//!   stores backed by memory or a checksummed journal
//! - The [`InboxService`] and [`OutboxService`]
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use syncbridge_core::{
//!     ChangeApplicator, ChangeRecord, ClassSchema, Config, CrudType, DomainObject,
//!     ExecutionMode, RelationExtractor, SchemaRegistry, ValueChange,
//! };
//!
//! let schema = SchemaRegistry::new()
//!     .with_class(
//!         ClassSchema::new("Product")
//!             .syncable()
//!             .field("code")
//!             .sync_path(".", ["PRODUCT_OUT"]),
//!     )
//!     .unwrap();
//! let extractor = Arc::new(RelationExtractor::new(Arc::new(schema), ExecutionMode::Test));
//! let mut applicator = ChangeApplicator::new(extractor, &Config::default());
//!
//! let product = DomainObject::new("Product", 1).into_ref();
//! applicator
//!     .apply_change(ChangeRecord::from_pairs(
//!         product,
//!         CrudType::Update,
//!         [("code", ValueChange::new("MUG", "CUP"))],
//!     ))
//!     .unwrap();
//! assert!(applicator.has_changes());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod aggregate;
mod applicator;
mod change;
mod client;
mod config;
mod context;
mod error;
mod extractor;
mod hydrator;
mod inbox;
mod model;
mod outbox;
mod record;
mod schema;
pub mod store;
mod transfer;

pub use aggregate::{AggregateStore, MemoryAggregateStore};
pub use applicator::{ChangeApplicator, RawChangeSet};
pub use change::{
    AppliedChangeSet, ChangeCollection, ChangeMap, ChangeRecord, ChronologyLog, CrudType,
    ValueChange,
};
pub use client::{client_types, ClientDescriptor};
pub use config::{Config, ExecutionMode};
pub use context::{RequestContext, RequestScope, ScopeGuard, RECEIVER_ROUTE};
pub use error::{CoreError, CoreResult};
pub use extractor::RelationExtractor;
pub use hydrator::SyncHydrator;
pub use inbox::InboxService;
pub use model::{DomainObject, FieldValue, ObjectRef};
pub use outbox::{OutboxService, SYNCHRONIZATION_CLASS, TRANSFER_OBJECT_KEY};
pub use record::{
    now_millis, FlowType, RecordId, SyncStatus, SynchronizationRecord, UNKNOWN_STATUS_PREFIX,
};
pub use schema::{ClassMeta, ClassSchema, SchemaRegistry, SyncDeclaration, SyncPath, ROOT_PATH};
pub use store::{CompactionStats, JournalRecordStore, MemoryRecordStore, SyncRecordStore};
pub use syncbridge_storage::{JournalStats, StorageError};
pub use transfer::{ReceiveOperation, TransferEnvelope, TransferItem, TransferObject};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
