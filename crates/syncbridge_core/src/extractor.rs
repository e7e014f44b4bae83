//! Relation resolution from mutated objects to their syncable aggregates.

use crate::config::ExecutionMode;
use crate::error::{CoreError, CoreResult};
use crate::model::{DomainObject, FieldValue, ObjectRef};
use crate::schema::{SchemaRegistry, SyncPath};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, error};

/// Resolves declared sync paths against live objects and validates the
/// declarations at boot.
///
/// The operation code set of each class is computed once and cached for
/// the lifetime of the extractor.
#[derive(Debug)]
pub struct RelationExtractor {
    schema: Arc<SchemaRegistry>,
    mode: ExecutionMode,
    codes_cache: RwLock<HashMap<String, Arc<BTreeSet<String>>>>,
}

impl RelationExtractor {
    /// Creates an extractor over `schema`.
    pub fn new(schema: Arc<SchemaRegistry>, mode: ExecutionMode) -> Self {
        Self {
            schema,
            mode,
            codes_cache: RwLock::new(HashMap::new()),
        }
    }

    /// The schema this extractor reads.
    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    /// Union of every operation code declared for the object's class.
    ///
    /// Classes without declarations yield an empty set.
    pub fn operation_codes_for(&self, object: &DomainObject) -> Arc<BTreeSet<String>> {
        if let Some(codes) = self.codes_cache.read().get(object.class()) {
            return Arc::clone(codes);
        }

        let codes: BTreeSet<String> = self
            .schema
            .get(object.class())
            .map(|meta| {
                meta.declarations
                    .iter()
                    .flat_map(|d| d.operation_codes.iter().cloned())
                    .collect()
            })
            .unwrap_or_default();
        let codes = Arc::new(codes);

        self.codes_cache
            .write()
            .entry(object.class().to_string())
            .or_insert_with(|| Arc::clone(&codes));
        codes
    }

    /// True if the object's class takes part in synchronization at all.
    pub fn is_in_scope(&self, object: &DomainObject) -> bool {
        !self.operation_codes_for(object).is_empty()
    }

    /// True if the object can own a sync id.
    pub fn is_syncable(&self, object: &DomainObject) -> bool {
        self.schema.is_syncable(object.class())
    }

    /// Finds the aggregate governing `object` for `operation_code`.
    ///
    /// Returns `None` when no declaration of the class mentions the code.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the path is the root marker on a
    /// non-syncable class, a hop has no accessor, a hop does not yield an
    /// object, or the terminal object is not syncable.
    pub fn resolve_aggregate(
        &self,
        object: &ObjectRef,
        operation_code: &str,
    ) -> CoreResult<Option<ObjectRef>> {
        let Some(meta) = self.schema.get(object.class()) else {
            return Ok(None);
        };
        let Some(declaration) = meta
            .declarations
            .iter()
            .find(|d| d.operation_codes.contains(operation_code))
        else {
            return Ok(None);
        };

        if declaration.path.is_root() {
            if !self.is_syncable(object) {
                return Err(CoreError::config(format!(
                    "{} has root sync path, but it is not a syncable entity",
                    object.class()
                )));
            }
            return Ok(Some(Arc::clone(object)));
        }

        let target = self.walk(object, &declaration.path)?;
        if !self.is_syncable(&target) {
            return Err(CoreError::config(format!(
                "{} has sync path {}, but destination item is not a syncable entity",
                object.class(),
                declaration.path
            )));
        }
        debug!(
            resource = %object.identity(),
            aggregate = %target.identity(),
            operation_code,
            "resolved syncable aggregate"
        );
        Ok(Some(target))
    }

    fn walk(&self, origin: &ObjectRef, path: &SyncPath) -> CoreResult<ObjectRef> {
        let mut current = Arc::clone(origin);
        for hop in path.hops() {
            current = self.step(origin, path, &current, hop)?;
        }
        Ok(current)
    }

    fn step(
        &self,
        origin: &DomainObject,
        path: &SyncPath,
        current: &DomainObject,
        hop: &str,
    ) -> CoreResult<ObjectRef> {
        if !self.schema.has_property(current.class(), hop) {
            return Err(CoreError::config(format!(
                "{} has sync path: {}, but accessor does not exist: {}:{}",
                origin.class(),
                path,
                current.class(),
                hop
            )));
        }
        match current.get(hop) {
            Some(FieldValue::Object(next)) => Ok(next),
            _ => Err(CoreError::config(format!(
                "{}:{} references on non-object attribute.",
                current.class(),
                hop
            ))),
        }
    }

    /// Copies `resource` so it no longer depends on live relations.
    ///
    /// Every object along every declared path is copied individually and
    /// re-linked into the copy, so the snapshot stays usable after the store
    /// forgets the deleted object.
    ///
    /// # Errors
    ///
    /// Returns the same configuration errors as path resolution.
    pub fn snapshot_for_delete(&self, resource: &ObjectRef) -> CoreResult<ObjectRef> {
        let copy = Arc::new(resource.detached_copy());
        let Some(meta) = self.schema.get(resource.class()) else {
            return Ok(copy);
        };

        for declaration in &meta.declarations {
            if declaration.path.is_root() {
                if !self.is_syncable(resource) {
                    return Err(CoreError::config(format!(
                        "{} has root sync path, but it is not a syncable entity",
                        resource.class()
                    )));
                }
                continue;
            }

            let mut parent = Arc::clone(&copy);
            for hop in declaration.path.hops() {
                let child = self.step(resource, &declaration.path, &parent, hop)?;
                let cloned = Arc::new(child.detached_copy());
                parent.set(hop.as_str(), FieldValue::Object(Arc::clone(&cloned)));
                parent = cloned;
            }
        }
        Ok(copy)
    }

    /// Checks every declaration against the registered operation codes and
    /// the association metadata.
    ///
    /// All violations are collected. Depending on the execution mode they are
    /// logged, raised as one configuration error, or both. In production the
    /// violations are returned instead of raised.
    ///
    /// # Errors
    ///
    /// Returns a configuration error listing every violation unless the mode
    /// is [`ExecutionMode::Production`].
    pub fn validate_all_declarations(
        &self,
        registered_codes: &BTreeSet<String>,
    ) -> CoreResult<Vec<String>> {
        let mut errors = Vec::new();

        for meta in self.schema.classes().filter(|m| m.declares_sync()) {
            let class_name = meta.schema.name();

            for declaration in &meta.declarations {
                if !declaration.operation_codes.is_subset(registered_codes) {
                    errors.push(format!(
                        "{class_name} has invalid operations codes. Recheck them against the registered clients."
                    ));
                }

                if declaration.path.is_root() {
                    if !meta.schema.is_syncable() {
                        errors.push(format!(
                            "{class_name} is not a syncable entity, but has path \".\""
                        ));
                    }
                    continue;
                }

                let traced = self.trace_declared_path(class_name, &declaration.path, &mut errors);
                let Some(terminal) = traced else {
                    continue;
                };
                if !self.schema.is_syncable(&terminal) {
                    errors.push(format!(
                        "{terminal} is not a syncable entity, but was set as target syncable entity for class {class_name}"
                    ));
                }
            }
        }

        if errors.is_empty() {
            return Ok(errors);
        }
        if self.mode.logs_declaration_errors() {
            for message in &errors {
                error!("[SYNC ERROR] {message}");
            }
        }
        if self.mode.raises_declaration_errors() {
            return Err(CoreError::config(format!(
                "Errors were found: {}",
                errors.join("; ")
            )));
        }
        Ok(errors)
    }

    /// Follows `path` through association metadata and returns the terminal
    /// class, recording the first broken hop in `errors`.
    fn trace_declared_path(
        &self,
        class_name: &str,
        path: &SyncPath,
        errors: &mut Vec<String>,
    ) -> Option<String> {
        let mut current = class_name.to_string();
        for hop in path.hops() {
            let Some(meta) = self.schema.get(&current) else {
                errors.push(format!("{current} class is not registered in the schema"));
                return None;
            };
            if !meta.schema.has_property(hop) {
                errors.push(format!("{current} does not contain accessor: {hop}"));
                return None;
            }
            match meta.schema.association_target(hop) {
                Some(next) => current = next.to_string(),
                None => {
                    errors.push(format!(
                        "{current} class has error with relation \"{hop}\": not an association"
                    ));
                    return None;
                }
            }
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ClassSchema;

    fn catalog() -> Arc<SchemaRegistry> {
        let registry = SchemaRegistry::new()
            .with_class(
                ClassSchema::new("Product")
                    .syncable()
                    .fields(["code", "enabled"])
                    .sync_path(".", ["TO_FILE"]),
            )
            .and_then(|r| {
                r.with_class(
                    ClassSchema::new("ProductVariant")
                        .fields(["code", "onHand"])
                        .association("product", "Product")
                        .sync_path("product", ["TO_FILE"]),
                )
            })
            .and_then(|r| {
                r.with_class(
                    ClassSchema::new("ProductVariantTranslation")
                        .fields(["name", "locale"])
                        .association("translatable", "ProductVariant")
                        .sync_path("translatable.product", ["TO_FILE"]),
                )
            })
            .unwrap();
        Arc::new(registry)
    }

    fn extractor(schema: Arc<SchemaRegistry>) -> RelationExtractor {
        RelationExtractor::new(schema, ExecutionMode::Test)
    }

    fn graph() -> (ObjectRef, ObjectRef, ObjectRef) {
        let product = DomainObject::new("Product", 1)
            .with_field("code", "MUG")
            .into_ref();
        let variant = DomainObject::new("ProductVariant", 10)
            .with_field("code", "MUG-RED")
            .with_field("product", &product)
            .into_ref();
        let translation = DomainObject::new("ProductVariantTranslation", 100)
            .with_field("name", "Red mug")
            .with_field("translatable", &variant)
            .into_ref();
        (product, variant, translation)
    }

    #[test]
    fn operation_codes_are_cached_per_class() {
        let extractor = extractor(catalog());
        let (product, variant, _) = graph();

        let codes = extractor.operation_codes_for(&variant);
        assert!(codes.contains("TO_FILE"));
        assert!(Arc::ptr_eq(&codes, &extractor.operation_codes_for(&variant)));
        assert!(extractor.is_in_scope(&product));

        let other = DomainObject::new("Channel", 1);
        assert!(extractor.operation_codes_for(&other).is_empty());
    }

    #[test]
    fn resolves_nested_path() {
        let extractor = extractor(catalog());
        let (product, _, translation) = graph();

        let aggregate = extractor
            .resolve_aggregate(&translation, "TO_FILE")
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(&aggregate, &product));
        assert!(extractor
            .resolve_aggregate(&translation, "OTHER")
            .unwrap()
            .is_none());
    }

    #[test]
    fn root_path_resolves_to_itself() {
        let extractor = extractor(catalog());
        let (product, _, _) = graph();
        let aggregate = extractor.resolve_aggregate(&product, "TO_FILE").unwrap().unwrap();
        assert!(Arc::ptr_eq(&aggregate, &product));
    }

    #[test]
    fn non_object_hop_is_a_config_error() {
        let extractor = extractor(catalog());
        let variant = DomainObject::new("ProductVariant", 11)
            .with_field("product", FieldValue::Null)
            .into_ref();

        let err = extractor.resolve_aggregate(&variant, "TO_FILE").unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
        assert!(err.to_string().contains("non-object"));
    }

    #[test]
    fn missing_accessor_is_a_config_error() {
        let schema = SchemaRegistry::new()
            .with_class(ClassSchema::new("Product").syncable())
            .and_then(|r| {
                r.with_class(ClassSchema::new("Orphan").sync_path("owner", ["TO_FILE"]))
            })
            .unwrap();
        let extractor = extractor(Arc::new(schema));
        let orphan = DomainObject::new("Orphan", 1).into_ref();

        let err = extractor.resolve_aggregate(&orphan, "TO_FILE").unwrap_err();
        assert!(err.to_string().contains("accessor does not exist: Orphan:owner"));
    }

    #[test]
    fn non_syncable_target_is_a_config_error() {
        let schema = SchemaRegistry::new()
            .with_class(ClassSchema::new("Channel").field("code"))
            .and_then(|r| {
                r.with_class(
                    ClassSchema::new("Pricing")
                        .association("channel", "Channel")
                        .sync_path("channel", ["TO_FILE"]),
                )
            })
            .unwrap();
        let extractor = extractor(Arc::new(schema));
        let channel = DomainObject::new("Channel", 1).into_ref();
        let pricing = DomainObject::new("Pricing", 2)
            .with_field("channel", &channel)
            .into_ref();

        let err = extractor.resolve_aggregate(&pricing, "TO_FILE").unwrap_err();
        assert!(err
            .to_string()
            .contains("Pricing has sync path channel, but destination item is not a syncable entity"));
    }

    #[test]
    fn snapshot_recopies_every_hop() {
        let extractor = extractor(catalog());
        let (product, variant, translation) = graph();

        let snapshot = extractor.snapshot_for_delete(&translation).unwrap();
        assert!(!Arc::ptr_eq(&snapshot, &translation));

        let copied_variant = snapshot.get("translatable").unwrap();
        let copied_variant = copied_variant.as_object().unwrap();
        assert!(!Arc::ptr_eq(copied_variant, &variant));

        let copied_product = copied_variant.get("product").unwrap();
        let copied_product = copied_product.as_object().unwrap();
        assert!(!Arc::ptr_eq(copied_product, &product));
        assert_eq!(copied_product.identity(), "Product::1");

        variant.set("product", FieldValue::Null);
        let aggregate = extractor.resolve_aggregate(&snapshot, "TO_FILE").unwrap();
        assert_eq!(aggregate.unwrap().identity(), "Product::1");
    }

    #[test]
    fn validation_passes_for_consistent_declarations() {
        let extractor = extractor(catalog());
        let codes: BTreeSet<String> = ["TO_FILE".to_string()].into();
        assert!(extractor.validate_all_declarations(&codes).unwrap().is_empty());
    }

    #[test]
    fn validation_collects_every_violation() {
        let schema = SchemaRegistry::new()
            .with_class(ClassSchema::new("Product").syncable().sync_path(".", ["TO_FILE"]))
            .and_then(|r| r.with_class(ClassSchema::new("Tag").sync_path(".", ["TO_FILE"])))
            .and_then(|r| {
                r.with_class(ClassSchema::new("Image").sync_path("owner", ["TO_FILE"]))
            })
            .and_then(|r| {
                r.with_class(ClassSchema::new("Review").sync_path(".", ["UNKNOWN_CODE"]))
            })
            .unwrap();
        let extractor = extractor(Arc::new(schema));
        let codes: BTreeSet<String> = ["TO_FILE".to_string()].into();

        let err = extractor.validate_all_declarations(&codes).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("Errors were found: "));
        assert!(text.contains("Tag is not a syncable entity, but has path \".\""));
        assert!(text.contains("Image does not contain accessor: owner"));
        assert!(text.contains("Review has invalid operations codes"));
    }

    #[test]
    fn production_mode_returns_violations() {
        let schema = SchemaRegistry::new()
            .with_class(ClassSchema::new("Tag").sync_path(".", ["TO_FILE"]))
            .unwrap();
        let extractor = RelationExtractor::new(Arc::new(schema), ExecutionMode::Production);
        let codes: BTreeSet<String> = ["TO_FILE".to_string()].into();

        let errors = extractor.validate_all_declarations(&codes).unwrap();
        assert_eq!(errors.len(), 1);
    }
}
