//! Persistence of sync ids assigned to aggregates.

use crate::error::{CoreError, CoreResult};
use crate::model::DomainObject;
use parking_lot::RwLock;
use std::collections::HashMap;

/// The domain store's side of sync id assignment.
pub trait AggregateStore: Send + Sync {
    /// Persists the sync id currently set on `aggregate`.
    ///
    /// # Errors
    ///
    /// Returns an error if the aggregate carries no sync id or the write fails.
    fn persist_sync_id(&self, aggregate: &DomainObject) -> CoreResult<()>;
}

/// Aggregate store recording `class::id -> syncId` in memory.
#[derive(Debug, Default)]
pub struct MemoryAggregateStore {
    sync_ids: RwLock<HashMap<String, String>>,
}

impl MemoryAggregateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sync id persisted for `identity`.
    pub fn sync_id(&self, identity: &str) -> Option<String> {
        self.sync_ids.read().get(identity).cloned()
    }

    /// Number of aggregates with a persisted sync id.
    pub fn len(&self) -> usize {
        self.sync_ids.read().len()
    }

    /// True if nothing was persisted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AggregateStore for MemoryAggregateStore {
    fn persist_sync_id(&self, aggregate: &DomainObject) -> CoreResult<()> {
        let sync_id = aggregate.sync_id().ok_or_else(|| {
            CoreError::corrupted(format!("{} has no sync id to persist.", aggregate.identity()))
        })?;
        self.sync_ids.write().insert(aggregate.identity(), sync_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persists_by_identity() {
        let store = MemoryAggregateStore::new();
        let product = DomainObject::new("Product", 3).with_sync_id("abc");
        store.persist_sync_id(&product).unwrap();
        assert_eq!(store.sync_id("Product::3").as_deref(), Some("abc"));

        let bare = DomainObject::new("Product", 4);
        assert!(store.persist_sync_id(&bare).is_err());
        assert_eq!(store.len(), 1);
    }
}
