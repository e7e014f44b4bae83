//! Change records and the two change collections.
//!
//! [`ChronologyLog`] keeps every record of a flush in arrival order.
//! [`AppliedChangeSet`] keeps one deduplicated record per resource identity.
//! Both expose the same read contract through [`ChangeCollection`].

use crate::model::{FieldValue, ObjectRef};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Classification of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrudType {
    /// The object was inserted.
    Create,
    /// The object was updated.
    Update,
    /// The object was deleted.
    Delete,
}

impl CrudType {
    /// Every crud type.
    pub const ALL: [CrudType; 3] = [CrudType::Create, CrudType::Update, CrudType::Delete];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CrudType::Create => "create",
            CrudType::Update => "update",
            CrudType::Delete => "delete",
        }
    }
}

impl fmt::Display for CrudType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrudType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(CrudType::Create),
            "update" => Ok(CrudType::Update),
            "delete" => Ok(CrudType::Delete),
            other => Err(format!("unknown crud type: {other}")),
        }
    }
}

/// Old and new value of one attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueChange {
    /// Value before the flush.
    pub old: FieldValue,
    /// Value after the flush.
    pub new: FieldValue,
}

impl ValueChange {
    /// Creates a change from `old` to `new`.
    pub fn new(old: impl Into<FieldValue>, new: impl Into<FieldValue>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
        }
    }
}

/// Attribute name to old/new pair.
pub type ChangeMap = BTreeMap<String, ValueChange>;

/// One mutation of one object in one flush.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    resource: ObjectRef,
    changes: ChangeMap,
    crud_type: CrudType,
}

impl ChangeRecord {
    /// Creates a record.
    pub fn new(resource: ObjectRef, changes: ChangeMap, crud_type: CrudType) -> Self {
        Self {
            resource,
            changes,
            crud_type,
        }
    }

    /// Creates a record from `(attribute, change)` pairs.
    pub fn from_pairs<I, S>(resource: ObjectRef, crud_type: CrudType, pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, ValueChange)>,
        S: Into<String>,
    {
        let changes = pairs.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self::new(resource, changes, crud_type)
    }

    /// The mutated object.
    pub fn resource(&self) -> &ObjectRef {
        &self.resource
    }

    /// Changed attributes.
    pub fn changes(&self) -> &ChangeMap {
        &self.changes
    }

    /// Crud type.
    pub fn crud_type(&self) -> CrudType {
        self.crud_type
    }

    /// Identity of the mutated object (`class::id`).
    pub fn identity(&self) -> String {
        self.resource.identity()
    }

    /// True if no attribute changed.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub(crate) fn set_resource(&mut self, resource: ObjectRef) {
        self.resource = resource;
    }

    pub(crate) fn set_changes(&mut self, changes: ChangeMap) {
        self.changes = changes;
    }
}

/// Read contract shared by both collections.
pub trait ChangeCollection {
    /// Iterates over the records in collection order.
    fn iter(&self) -> Box<dyn Iterator<Item = &ChangeRecord> + '_>;

    /// Number of records.
    fn len(&self) -> usize {
        self.iter().count()
    }

    /// True if the collection holds nothing.
    fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// True if any record concerns an object of `class`.
    fn touches_class(&self, class: &str) -> bool {
        self.iter().any(|r| r.resource().class() == class)
    }
}

/// Every record of a flush in arrival order, duplicates included.
#[derive(Debug, Clone, Default)]
pub struct ChronologyLog {
    records: Vec<ChangeRecord>,
}

impl ChronologyLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record.
    pub fn push(&mut self, record: ChangeRecord) {
        self.records.push(record);
    }

    /// Removes every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Records as a slice.
    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }
}

impl ChangeCollection for ChronologyLog {
    fn iter(&self) -> Box<dyn Iterator<Item = &ChangeRecord> + '_> {
        Box::new(self.records.iter())
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// One collapsed record per resource identity, in first-touch order.
#[derive(Debug, Clone, Default)]
pub struct AppliedChangeSet {
    records: Vec<ChangeRecord>,
    index: HashMap<String, usize>,
}

impl AppliedChangeSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record under its resource identity.
    ///
    /// A second record with the same identity and crud type merges into the
    /// first: attributes keep their earliest old value and take the latest
    /// new value. Attributes that end up back at their old value are dropped,
    /// and so is the entry once nothing is left. A record with a different
    /// crud type replaces the entry.
    pub fn insert(&mut self, record: ChangeRecord) {
        let key = record.identity();
        match self.index.get(&key) {
            Some(&slot) => {
                let existing = &mut self.records[slot];
                if existing.crud_type != record.crud_type {
                    *existing = record;
                    return;
                }
                existing.resource = record.resource;
                for (attribute, change) in record.changes {
                    existing
                        .changes
                        .entry(attribute)
                        .and_modify(|c| c.new = change.new.clone())
                        .or_insert(change);
                }
                existing.changes.retain(|_, c| c.old != c.new);
                if existing.changes.is_empty() {
                    self.remove_slot(slot);
                }
            }
            None => {
                self.index.insert(key, self.records.len());
                self.records.push(record);
            }
        }
    }

    fn remove_slot(&mut self, slot: usize) {
        self.records.remove(slot);
        self.index = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.identity(), i))
            .collect();
    }

    /// Record stored for `identity`.
    pub fn get(&self, identity: &str) -> Option<&ChangeRecord> {
        self.index.get(identity).map(|&slot| &self.records[slot])
    }

    /// Removes every record.
    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }
}

impl ChangeCollection for AppliedChangeSet {
    fn iter(&self) -> Box<dyn Iterator<Item = &ChangeRecord> + '_> {
        Box::new(self.records.iter())
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DomainObject;

    fn product(id: i64) -> ObjectRef {
        DomainObject::new("Product", id).into_ref()
    }

    #[test]
    fn crud_type_names() {
        assert_eq!(CrudType::Create.to_string(), "create");
        assert_eq!("delete".parse::<CrudType>(), Ok(CrudType::Delete));
        assert!("upsert".parse::<CrudType>().is_err());
        assert_eq!(
            serde_json::to_string(&CrudType::Update).unwrap(),
            "\"update\""
        );
    }

    #[test]
    fn chronology_keeps_duplicates_in_order() {
        let p = product(1);
        let mut log = ChronologyLog::new();
        log.push(ChangeRecord::from_pairs(
            p.clone(),
            CrudType::Update,
            [("price", ValueChange::new(1i64, 2i64))],
        ));
        log.push(ChangeRecord::from_pairs(
            p,
            CrudType::Update,
            [("price", ValueChange::new(2i64, 3i64))],
        ));

        assert_eq!(log.len(), 2);
        assert_eq!(
            log.records()[1].changes()["price"].new,
            FieldValue::Integer(3)
        );
        assert!(log.touches_class("Product"));
    }

    #[test]
    fn applied_set_collapses_by_identity() {
        let p = product(1);
        let mut applied = AppliedChangeSet::new();
        applied.insert(ChangeRecord::from_pairs(
            p.clone(),
            CrudType::Update,
            [("price", ValueChange::new(1i64, 2i64))],
        ));
        applied.insert(ChangeRecord::from_pairs(
            p.clone(),
            CrudType::Update,
            [
                ("price", ValueChange::new(2i64, 3i64)),
                ("code", ValueChange::new("A", "B")),
            ],
        ));
        applied.insert(ChangeRecord::from_pairs(
            product(2),
            CrudType::Update,
            [("code", ValueChange::new("X", "Y"))],
        ));

        assert_eq!(applied.len(), 2);
        let merged = applied.get("Product::1").unwrap();
        assert_eq!(merged.changes()["price"], ValueChange::new(1i64, 3i64));
        assert_eq!(merged.changes()["code"], ValueChange::new("A", "B"));
    }

    #[test]
    fn applied_set_drops_writes_that_cancel_out() {
        let p = product(3);
        let mut applied = AppliedChangeSet::new();
        applied.insert(ChangeRecord::from_pairs(
            p.clone(),
            CrudType::Update,
            [("price", ValueChange::new(1i64, 2i64))],
        ));
        applied.insert(ChangeRecord::from_pairs(
            product(4),
            CrudType::Update,
            [("price", ValueChange::new(7i64, 8i64))],
        ));
        applied.insert(ChangeRecord::from_pairs(
            p,
            CrudType::Update,
            [("price", ValueChange::new(2i64, 1i64))],
        ));

        assert_eq!(applied.len(), 1);
        assert!(applied.get("Product::3").is_none());
        assert!(applied.get("Product::4").is_some());
    }

    #[test]
    fn applied_set_replaces_on_crud_change() {
        let p = product(5);
        let mut applied = AppliedChangeSet::new();
        applied.insert(ChangeRecord::from_pairs(
            p.clone(),
            CrudType::Update,
            [("code", ValueChange::new("A", "B"))],
        ));
        applied.insert(ChangeRecord::from_pairs(
            p,
            CrudType::Delete,
            [("id", ValueChange::new(5i64, FieldValue::Null))],
        ));

        let record = applied.get("Product::5").unwrap();
        assert_eq!(record.crud_type(), CrudType::Delete);
        assert_eq!(record.changes().len(), 1);

        applied.clear();
        assert!(applied.is_empty());
        assert!(applied.get("Product::5").is_none());
    }
}
