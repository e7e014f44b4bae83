//! Change capture and deduplication for one unit-of-work flush.

use crate::change::{
    AppliedChangeSet, ChangeCollection, ChangeMap, ChangeRecord, ChronologyLog, CrudType,
    ValueChange,
};
use crate::config::Config;
use crate::error::CoreResult;
use crate::extractor::RelationExtractor;
use crate::model::{DomainObject, FieldValue};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Raw per-attribute change data as handed over by the unit of work.
///
/// Each entry is expected to hold exactly two slots: old and new.
pub type RawChangeSet = BTreeMap<String, Vec<FieldValue>>;

type SeenKey = (CrudType, String, String);

/// Turns flushed mutations into a chronology and a deduplicated applied set.
///
/// The dedup store remembers the last new value propagated for every
/// `(crud type, identity, attribute)` and outlives individual flushes until
/// a deep [`reset`](Self::reset).
#[derive(Debug)]
pub struct ChangeApplicator {
    extractor: Arc<RelationExtractor>,
    ignored: BTreeSet<String>,
    seen: HashMap<SeenKey, JsonValue>,
    chronology: ChronologyLog,
    applied: AppliedChangeSet,
}

impl ChangeApplicator {
    /// Creates an applicator ignoring the attributes listed in `config`.
    pub fn new(extractor: Arc<RelationExtractor>, config: &Config) -> Self {
        Self {
            extractor,
            ignored: config.ignored_attributes.iter().cloned().collect(),
            seen: HashMap::new(),
            chronology: ChronologyLog::new(),
            applied: AppliedChangeSet::new(),
        }
    }

    /// The extractor used for scope checks and delete snapshots.
    pub fn extractor(&self) -> &Arc<RelationExtractor> {
        &self.extractor
    }

    /// Feeds one mutation into the applicator.
    ///
    /// Objects without declared operation codes are ignored. Deletes are
    /// rewritten to a detached snapshot carrying exactly `{id: [id, null]}`.
    /// Every in-scope record lands in the chronology; only attributes that
    /// differ from the last propagated value reach the applied set.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a delete snapshot cannot follow a
    /// declared path.
    pub fn apply_change(&mut self, mut record: ChangeRecord) -> CoreResult<()> {
        if !self.extractor.is_in_scope(record.resource()) {
            debug!(
                resource = %record.identity(),
                "skipping change of class without sync declarations"
            );
            return Ok(());
        }

        if record.crud_type() == CrudType::Delete {
            let id = record.resource().id();
            let snapshot = self.extractor.snapshot_for_delete(record.resource())?;
            record.set_resource(snapshot);
            let mut changes = ChangeMap::new();
            changes.insert("id".to_string(), ValueChange::new(id, FieldValue::Null));
            record.set_changes(changes);
        }

        self.chronology.push(record.clone());

        let identity = record.identity();
        let crud_type = record.crud_type();
        let mut kept = ChangeMap::new();
        for (attribute, change) in record.changes() {
            if self.ignored.contains(attribute) {
                continue;
            }
            let key = (crud_type, identity.clone(), attribute.clone());
            let new_value = comparable(&change.new);
            if self.seen.get(&key) == Some(&new_value) {
                debug!(resource = %identity, attribute = %attribute, "value already propagated");
                continue;
            }
            self.seen.insert(key, new_value);
            kept.insert(attribute.clone(), change.clone());
        }

        if !kept.is_empty() {
            record.set_changes(kept);
            self.applied.insert(record);
        }
        Ok(())
    }

    /// Filters raw change data down to well-formed attributes of `object`.
    ///
    /// Unknown properties, entries without both slots and list values are
    /// logged and skipped.
    pub fn prepare_valid_changes(&self, object: &DomainObject, raw: &RawChangeSet) -> ChangeMap {
        let schema = self.extractor.schema();
        let mut valid = ChangeMap::new();
        for (attribute, slots) in raw {
            if !schema.has_property(object.class(), attribute) {
                warn!(
                    resource = %object.identity(),
                    attribute = %attribute,
                    "skipping change of unknown property"
                );
                continue;
            }
            let [old, new] = slots.as_slice() else {
                warn!(
                    resource = %object.identity(),
                    attribute = %attribute,
                    slots = slots.len(),
                    "skipping change without old and new value"
                );
                continue;
            };
            if matches!(old, FieldValue::List(_)) || matches!(new, FieldValue::List(_)) {
                warn!(
                    resource = %object.identity(),
                    attribute = %attribute,
                    "skipping change with collection value"
                );
                continue;
            }
            valid.insert(attribute.clone(), ValueChange::new(old.clone(), new.clone()));
        }
        valid
    }

    /// Clears the collections; `deep` also forgets every propagated value.
    pub fn reset(&mut self, deep: bool) {
        self.applied.clear();
        self.chronology.clear();
        if deep {
            self.seen.clear();
        }
    }

    /// True if the applied set holds anything.
    pub fn has_changes(&self) -> bool {
        !self.applied.is_empty()
    }

    /// Deduplicated changes of the current flush.
    pub fn applied(&self) -> &AppliedChangeSet {
        &self.applied
    }

    /// Every in-scope change of the current flush.
    pub fn chronology(&self) -> &ChronologyLog {
        &self.chronology
    }
}

/// References compare by identity, everything else by JSON value.
fn comparable(value: &FieldValue) -> JsonValue {
    match value {
        FieldValue::Object(o) => JsonValue::String(o.identity()),
        other => other.to_json(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionMode;
    use crate::model::ObjectRef;
    use crate::schema::{ClassSchema, SchemaRegistry};
    use proptest::prelude::*;

    fn applicator() -> ChangeApplicator {
        let registry = SchemaRegistry::new()
            .with_class(
                ClassSchema::new("Product")
                    .syncable()
                    .fields(["code", "price", "updatedAt"])
                    .sync_path(".", ["TO_FILE"]),
            )
            .and_then(|r| {
                r.with_class(
                    ClassSchema::new("ProductVariant")
                        .fields(["code", "tags"])
                        .association("product", "Product")
                        .sync_path("product", ["TO_FILE"]),
                )
            })
            .and_then(|r| r.with_class(ClassSchema::new("Log").field("line")))
            .unwrap();
        let extractor = RelationExtractor::new(Arc::new(registry), ExecutionMode::Test);
        ChangeApplicator::new(Arc::new(extractor), &Config::default())
    }

    fn product(id: i64) -> ObjectRef {
        DomainObject::new("Product", id)
            .with_field("code", "MUG")
            .into_ref()
    }

    fn update(resource: &ObjectRef, attribute: &str, old: i64, new: i64) -> ChangeRecord {
        ChangeRecord::from_pairs(
            resource.clone(),
            CrudType::Update,
            [(attribute, ValueChange::new(old, new))],
        )
    }

    #[test]
    fn out_of_scope_objects_are_ignored() {
        let mut applicator = applicator();
        let log = DomainObject::new("Log", 1).into_ref();
        applicator
            .apply_change(ChangeRecord::from_pairs(
                log,
                CrudType::Create,
                [("line", ValueChange::new(FieldValue::Null, "x"))],
            ))
            .unwrap();

        assert!(!applicator.has_changes());
        assert!(applicator.chronology().is_empty());
    }

    #[test]
    fn ignored_attributes_reach_chronology_only() {
        let mut applicator = applicator();
        let p = product(1);
        applicator
            .apply_change(ChangeRecord::from_pairs(
                p,
                CrudType::Update,
                [("updatedAt", ValueChange::new(1i64, 2i64))],
            ))
            .unwrap();

        assert!(!applicator.has_changes());
        assert_eq!(applicator.chronology().len(), 1);
    }

    #[test]
    fn shallow_reset_keeps_dedup_history() {
        let mut applicator = applicator();
        let p = product(1);
        applicator.apply_change(update(&p, "price", 1, 2)).unwrap();
        assert!(applicator.has_changes());

        applicator.reset(false);
        applicator.apply_change(update(&p, "price", 1, 2)).unwrap();
        assert!(!applicator.has_changes());
        assert_eq!(applicator.chronology().len(), 1);

        applicator.reset(true);
        applicator.apply_change(update(&p, "price", 1, 2)).unwrap();
        assert!(applicator.has_changes());
    }

    #[test]
    fn delete_yields_only_id_change() {
        let mut applicator = applicator();
        let p = product(9);
        applicator
            .apply_change(ChangeRecord::from_pairs(
                p.clone(),
                CrudType::Delete,
                [
                    ("code", ValueChange::new("MUG", "CUP")),
                    ("price", ValueChange::new(1i64, 2i64)),
                ],
            ))
            .unwrap();

        let record = applicator.applied().get("Product::9").unwrap();
        assert_eq!(record.changes().len(), 1);
        assert_eq!(
            record.changes()["id"],
            ValueChange::new(9i64, FieldValue::Null)
        );
        assert!(!Arc::ptr_eq(record.resource(), &p));
        assert_eq!(record.resource().get("code"), Some(FieldValue::from("MUG")));
    }

    #[test]
    fn delete_snapshot_detaches_relations() {
        let mut applicator = applicator();
        let p = product(1);
        let variant = DomainObject::new("ProductVariant", 5)
            .with_field("product", &p)
            .into_ref();
        applicator
            .apply_change(ChangeRecord::new(
                variant,
                ChangeMap::new(),
                CrudType::Delete,
            ))
            .unwrap();

        let record = applicator.applied().get("ProductVariant::5").unwrap();
        let parent = record.resource().get("product").unwrap();
        let parent = parent.as_object().unwrap();
        assert!(!Arc::ptr_eq(parent, &p));
        assert_eq!(parent.identity(), "Product::1");
    }

    #[test]
    fn references_compare_by_identity() {
        let mut applicator = applicator();
        let variant = DomainObject::new("ProductVariant", 5).into_ref();
        let first = product(1);
        let same = product(1);
        let change = |old: &ObjectRef, new: &ObjectRef| {
            ChangeRecord::from_pairs(
                variant.clone(),
                CrudType::Update,
                [("product", ValueChange::new(old, new))],
            )
        };

        applicator.apply_change(change(&product(2), &first)).unwrap();
        assert!(applicator.has_changes());
        applicator.reset(false);
        applicator.apply_change(change(&product(2), &same)).unwrap();
        assert!(!applicator.has_changes());
    }

    #[test]
    fn prepare_valid_changes_skips_malformed_entries() {
        let applicator = applicator();
        let variant = DomainObject::new("ProductVariant", 5);
        let mut raw = RawChangeSet::new();
        raw.insert("code".into(), vec!["A".into(), "B".into()]);
        raw.insert("ghost".into(), vec!["A".into(), "B".into()]);
        raw.insert("product".into(), vec![FieldValue::Null]);
        raw.insert(
            "tags".into(),
            vec![FieldValue::Null, FieldValue::List(vec!["x".into()])],
        );

        let valid = applicator.prepare_valid_changes(&variant, &raw);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid["code"], ValueChange::new("A", "B"));
    }

    proptest! {
        #[test]
        fn repeated_writes_collapse_to_last_value(
            writes in proptest::collection::vec(0i64..4, 1..12)
        ) {
            let mut applicator = applicator();
            let p = product(1);
            let initial = 0i64;
            applicator.apply_change(update(&p, "price", -1, initial)).unwrap();
            applicator.reset(false);

            let mut previous = initial;
            for &value in &writes {
                applicator.apply_change(update(&p, "price", previous, value)).unwrap();
                previous = value;
            }

            let last = *writes.last().unwrap();
            match applicator.applied().get("Product::1") {
                Some(record) => {
                    prop_assert_ne!(last, initial);
                    prop_assert_eq!(record.changes().len(), 1);
                    prop_assert_eq!(
                        &record.changes()["price"],
                        &ValueChange::new(initial, last)
                    );
                }
                None => prop_assert_eq!(last, initial),
            }
            prop_assert_eq!(applicator.chronology().len(), writes.len());
        }
    }
}
