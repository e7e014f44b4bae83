//! Class metadata and sync path declarations.
//!
//! Each domain class is described once at startup: which scalar fields and
//! to-one associations it exposes, whether it can own a sync id, and which
//! paths lead from it to its syncable aggregate for which operation codes.
//! Paths are parsed when the class is registered so a malformed declaration
//! is rejected before anything runs.

use crate::error::{CoreError, CoreResult};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Path marker meaning "the object itself is the aggregate".
pub const ROOT_PATH: &str = ".";

/// Parsed path from a mutated object to its syncable aggregate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SyncPath {
    /// The object is the aggregate.
    Root,
    /// Accessor hops from the object to the aggregate.
    Hops(Vec<String>),
}

impl SyncPath {
    /// Parses `"."` or a dot-separated list of accessor names.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for empty hops or hops that are not
    /// identifiers.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        if raw == ROOT_PATH {
            return Ok(SyncPath::Root);
        }

        let hops: Vec<String> = raw.split('.').map(str::to_string).collect();
        let valid = hops.iter().all(|hop| {
            let mut chars = hop.chars();
            chars.next().is_some_and(|c| c.is_ascii_alphabetic())
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
        if !valid {
            return Err(CoreError::config(format!(
                "sync path \"{raw}\" must be \".\" or look like \"relation.to.syncableEntity\""
            )));
        }
        Ok(SyncPath::Hops(hops))
    }

    /// Accessor hops; empty for the root path.
    pub fn hops(&self) -> &[String] {
        match self {
            SyncPath::Root => &[],
            SyncPath::Hops(hops) => hops,
        }
    }

    /// True for the root marker.
    pub fn is_root(&self) -> bool {
        matches!(self, SyncPath::Root)
    }
}

impl fmt::Display for SyncPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPath::Root => f.write_str(ROOT_PATH),
            SyncPath::Hops(hops) => f.write_str(&hops.join(".")),
        }
    }
}

/// One path and the operation codes that follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncDeclaration {
    /// Path to the aggregate.
    pub path: SyncPath,
    /// Operation codes routed along this path.
    pub operation_codes: BTreeSet<String>,
}

/// Description of one domain class.
#[derive(Debug, Clone, Default)]
pub struct ClassSchema {
    name: String,
    syncable: bool,
    fields: BTreeSet<String>,
    associations: BTreeMap<String, String>,
    raw_paths: Vec<(String, Vec<String>)>,
}

impl ClassSchema {
    /// Starts describing `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Marks the class as able to own a sync id.
    #[must_use]
    pub fn syncable(mut self) -> Self {
        self.syncable = true;
        self
    }

    /// Declares a scalar field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into());
        self
    }

    /// Declares several scalar fields.
    #[must_use]
    pub fn fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(names.into_iter().map(Into::into));
        self
    }

    /// Declares a to-one association named `name` targeting `target`.
    #[must_use]
    pub fn association(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.associations.insert(name.into(), target.into());
        self
    }

    /// Declares that `path` leads to the aggregate for `operation_codes`.
    #[must_use]
    pub fn sync_path<I, S>(mut self, path: impl Into<String>, operation_codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.raw_paths.push((
            path.into(),
            operation_codes.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the class can own a sync id.
    pub fn is_syncable(&self) -> bool {
        self.syncable
    }

    /// Whether `name` is a known field or association.
    pub fn has_property(&self, name: &str) -> bool {
        self.fields.contains(name) || self.associations.contains_key(name)
    }

    /// Target class of association `name`.
    pub fn association_target(&self, name: &str) -> Option<&str> {
        self.associations.get(name).map(String::as_str)
    }
}

/// A registered class with its parsed declarations.
#[derive(Debug, Clone)]
pub struct ClassMeta {
    /// The class description.
    pub schema: ClassSchema,
    /// Parsed sync declarations in declaration order.
    pub declarations: Vec<SyncDeclaration>,
}

impl ClassMeta {
    /// True if the class declares at least one sync path.
    pub fn declares_sync(&self) -> bool {
        !self.declarations.is_empty()
    }
}

/// Every domain class the core knows about.
///
/// Built once at startup and shared by reference afterwards.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    classes: BTreeMap<String, ClassMeta>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class, parsing its sync declarations.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the class is registered twice, a
    /// path is malformed, or a path carries an empty operation code.
    pub fn register(&mut self, schema: ClassSchema) -> CoreResult<()> {
        if self.classes.contains_key(schema.name()) {
            return Err(CoreError::config(format!(
                "class {} is registered twice",
                schema.name()
            )));
        }

        let mut declarations = Vec::with_capacity(schema.raw_paths.len());
        for (raw, codes) in &schema.raw_paths {
            let path = SyncPath::parse(raw).map_err(|e| {
                CoreError::config(format!("{}: {}", schema.name(), e.detail()))
            })?;
            if codes.iter().any(|c| c.trim().is_empty()) {
                return Err(CoreError::config(format!(
                    "{} declares an empty operation code for path \"{raw}\"",
                    schema.name()
                )));
            }
            declarations.push(SyncDeclaration {
                path,
                operation_codes: codes.iter().cloned().collect(),
            });
        }

        self.classes.insert(
            schema.name().to_string(),
            ClassMeta {
                schema,
                declarations,
            },
        );
        Ok(())
    }

    /// Registers a class and returns the registry, for chained setup.
    ///
    /// # Errors
    ///
    /// See [`SchemaRegistry::register`].
    pub fn with_class(mut self, schema: ClassSchema) -> CoreResult<Self> {
        self.register(schema)?;
        Ok(self)
    }

    /// Looks up a class.
    pub fn get(&self, class: &str) -> Option<&ClassMeta> {
        self.classes.get(class)
    }

    /// Iterates over every registered class.
    pub fn classes(&self) -> impl Iterator<Item = &ClassMeta> {
        self.classes.values()
    }

    /// Whether `class` can own a sync id.
    pub fn is_syncable(&self, class: &str) -> bool {
        self.get(class).is_some_and(|m| m.schema.is_syncable())
    }

    /// Whether `class` exposes `property`.
    pub fn has_property(&self, class: &str, property: &str) -> bool {
        self.get(class).is_some_and(|m| m.schema.has_property(property))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_paths() {
        assert_eq!(SyncPath::parse(".").unwrap(), SyncPath::Root);
        let path = SyncPath::parse("translatable.product").unwrap();
        assert_eq!(path.hops(), ["translatable", "product"]);
        assert_eq!(path.to_string(), "translatable.product");
        assert!(!path.is_root());

        assert!(SyncPath::parse("").is_err());
        assert!(SyncPath::parse("a..b").is_err());
        assert!(SyncPath::parse("1abc").is_err());
        assert!(SyncPath::parse("product.").is_err());
    }

    #[test]
    fn register_parses_declarations() {
        let registry = SchemaRegistry::new()
            .with_class(
                ClassSchema::new("ProductVariant")
                    .fields(["code", "enabled"])
                    .association("product", "Product")
                    .sync_path("product", ["TO_FILE", "TO_API"]),
            )
            .unwrap();

        let meta = registry.get("ProductVariant").unwrap();
        assert!(meta.declares_sync());
        assert_eq!(meta.declarations[0].operation_codes.len(), 2);
        assert!(registry.has_property("ProductVariant", "product"));
        assert!(registry.has_property("ProductVariant", "code"));
        assert!(!registry.has_property("ProductVariant", "price"));
        assert!(!registry.is_syncable("ProductVariant"));
        assert_eq!(meta.schema.association_target("product"), Some("Product"));
    }

    #[test]
    fn register_rejects_bad_declarations() {
        let mut registry = SchemaRegistry::new();
        let err = registry
            .register(ClassSchema::new("Broken").sync_path("a..b", ["X"]))
            .unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
        assert!(err.to_string().contains("Broken"));

        let err = registry
            .register(ClassSchema::new("Empty").sync_path(".", [" "]))
            .unwrap_err();
        assert!(err.to_string().contains("empty operation code"));

        registry.register(ClassSchema::new("Product")).unwrap();
        assert!(registry.register(ClassSchema::new("Product")).is_err());
    }
}
