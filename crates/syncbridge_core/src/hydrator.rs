//! Loads the records that belong to an aggregate.

use crate::error::CoreResult;
use crate::model::DomainObject;
use crate::record::SynchronizationRecord;
use crate::store::SyncRecordStore;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Looks up every synchronization record of an aggregate.
#[derive(Clone)]
pub struct SyncHydrator {
    store: Arc<dyn SyncRecordStore>,
}

impl SyncHydrator {
    /// Creates a hydrator reading `store`.
    pub fn new(store: Arc<dyn SyncRecordStore>) -> Self {
        Self { store }
    }

    /// Records carrying the aggregate's sync id for one of `operation_codes`.
    ///
    /// An aggregate without a sync id has no records.
    ///
    /// # Errors
    ///
    /// Returns any store error.
    pub fn load(
        &self,
        aggregate: &DomainObject,
        operation_codes: &BTreeSet<String>,
    ) -> CoreResult<Vec<SynchronizationRecord>> {
        match aggregate.sync_id() {
            Some(sync_id) => self.store.find_by_sync_id(&sync_id, operation_codes),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FlowType;
    use crate::store::MemoryRecordStore;

    #[test]
    fn loads_by_sync_id_and_code() {
        let store = Arc::new(MemoryRecordStore::new());
        for code in ["A", "B"] {
            store
                .insert(&SynchronizationRecord::new(FlowType::Outcoming, "products", code).with_sync_id("s1"))
                .unwrap();
        }
        let hydrator = SyncHydrator::new(store);

        let product = DomainObject::new("Product", 1).with_sync_id("s1");
        let codes = BTreeSet::from(["B".to_string()]);
        let records = hydrator.load(&product, &codes).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].operation_code, "B");

        let fresh = DomainObject::new("Product", 2);
        assert!(hydrator.load(&fresh, &codes).unwrap().is_empty());
    }
}
