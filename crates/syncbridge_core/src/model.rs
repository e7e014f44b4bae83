//! Domain objects as seen by the synchronization core.
//!
//! The core never owns domain state. The unit-of-work collaborator hands it
//! shared [`ObjectRef`] handles whose fields are read through accessors named
//! in the [`crate::SchemaRegistry`].

use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a domain object.
pub type ObjectRef = Arc<DomainObject>;

/// Value of one domain attribute.
#[derive(Clone)]
pub enum FieldValue {
    /// Absent value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    Text(String),
    /// Reference to another domain object (a to-one relation).
    Object(ObjectRef),
    /// Collection value (a to-many relation or an embedded list).
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// True for values that can travel in a change set as-is.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        !matches!(self, FieldValue::Object(_) | FieldValue::List(_))
    }

    /// Returns the referenced object, if this is a reference.
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            FieldValue::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Returns the text, if this is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer, if this is an integer.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the boolean, if this is a boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// JSON form used in payloads and for comparisons.
    ///
    /// References collapse to the id of the referenced object.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            FieldValue::Null => JsonValue::Null,
            FieldValue::Bool(b) => JsonValue::Bool(*b),
            FieldValue::Integer(i) => JsonValue::from(*i),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            FieldValue::Text(s) => JsonValue::String(s.clone()),
            FieldValue::Object(o) => JsonValue::from(o.id()),
            FieldValue::List(items) => {
                JsonValue::Array(items.iter().map(FieldValue::to_json).collect())
            }
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => true,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a == b,
            (FieldValue::Float(a), FieldValue::Float(b)) => a == b,
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            (FieldValue::Object(a), FieldValue::Object(b)) => a.identity() == b.identity(),
            (FieldValue::List(a), FieldValue::List(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("Null"),
            FieldValue::Bool(b) => write!(f, "Bool({b})"),
            FieldValue::Integer(i) => write!(f, "Integer({i})"),
            FieldValue::Float(v) => write!(f, "Float({v})"),
            FieldValue::Text(s) => write!(f, "Text({s:?})"),
            FieldValue::Object(o) => write!(f, "Object({})", o.identity()),
            FieldValue::List(items) => f.debug_tuple("List").field(items).finish(),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Integer(i64::from(v))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<ObjectRef> for FieldValue {
    fn from(v: ObjectRef) -> Self {
        FieldValue::Object(v)
    }
}

impl From<&ObjectRef> for FieldValue {
    fn from(v: &ObjectRef) -> Self {
        FieldValue::Object(Arc::clone(v))
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

/// A domain object tracked by the unit of work.
///
/// Fields and the sync id sit behind locks so shared handles can be updated
/// in place, the same way the store's identity map would.
pub struct DomainObject {
    class: String,
    id: i64,
    fields: RwLock<BTreeMap<String, FieldValue>>,
    sync_id: RwLock<Option<String>>,
}

impl DomainObject {
    /// Creates an object of `class` with store id `id`.
    pub fn new(class: impl Into<String>, id: i64) -> Self {
        Self {
            class: class.into(),
            id,
            fields: RwLock::new(BTreeMap::new()),
            sync_id: RwLock::new(None),
        }
    }

    /// Sets a field while building the object.
    #[must_use]
    pub fn with_field(self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.write().insert(name.into(), value.into());
        self
    }

    /// Sets the sync id while building the object.
    #[must_use]
    pub fn with_sync_id(self, sync_id: impl Into<String>) -> Self {
        *self.sync_id.write() = Some(sync_id.into());
        self
    }

    /// Wraps the object in a shared handle.
    #[must_use]
    pub fn into_ref(self) -> ObjectRef {
        Arc::new(self)
    }

    /// Class name.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Store id.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Stable identity string `class::id`.
    pub fn identity(&self) -> String {
        format!("{}::{}", self.class, self.id)
    }

    /// Reads a field. `None` means the object carries no such field.
    pub fn get(&self, name: &str) -> Option<FieldValue> {
        self.fields.read().get(name).cloned()
    }

    /// Writes a field.
    pub fn set(&self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.write().insert(name.into(), value.into());
    }

    /// Names of every field currently set.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.read().keys().cloned().collect()
    }

    /// Sync id, if one was assigned.
    pub fn sync_id(&self) -> Option<String> {
        self.sync_id.read().clone()
    }

    /// Assigns the sync id.
    pub fn set_sync_id(&self, sync_id: impl Into<String>) {
        *self.sync_id.write() = Some(sync_id.into());
    }

    /// Copies the object. Referenced objects stay shared.
    #[must_use]
    pub fn detached_copy(&self) -> DomainObject {
        DomainObject {
            class: self.class.clone(),
            id: self.id,
            fields: RwLock::new(self.fields.read().clone()),
            sync_id: RwLock::new(self.sync_id.read().clone()),
        }
    }
}

impl fmt::Debug for DomainObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainObject")
            .field("class", &self.class)
            .field("id", &self.id)
            .field("sync_id", &*self.sync_id.read())
            .field("fields", &self.field_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_and_fields() {
        let product = DomainObject::new("Product", 7)
            .with_field("code", "MUG")
            .with_field("enabled", true)
            .into_ref();

        assert_eq!(product.identity(), "Product::7");
        assert_eq!(product.get("code"), Some(FieldValue::from("MUG")));
        assert!(product.get("missing").is_none());

        product.set("enabled", false);
        assert_eq!(product.get("enabled").and_then(|v| v.as_bool()), Some(false));
    }

    #[test]
    fn references_compare_by_identity() {
        let a = DomainObject::new("Product", 1).with_field("code", "A").into_ref();
        let a_again = DomainObject::new("Product", 1).with_field("code", "B").into_ref();
        let b = DomainObject::new("Product", 2).into_ref();

        assert_eq!(FieldValue::from(&a), FieldValue::from(&a_again));
        assert_ne!(FieldValue::from(&a), FieldValue::from(&b));
    }

    #[test]
    fn json_form_collapses_references() {
        let product = DomainObject::new("Product", 42).into_ref();
        assert_eq!(FieldValue::from(&product).to_json(), serde_json::json!(42));
        assert_eq!(FieldValue::from(1.5).to_json(), serde_json::json!(1.5));
        assert_eq!(FieldValue::Float(f64::NAN).to_json(), JsonValue::Null);
        assert_eq!(
            FieldValue::List(vec![1i64.into(), "x".into()]).to_json(),
            serde_json::json!([1, "x"])
        );
        assert_eq!(FieldValue::from(None::<i64>), FieldValue::Null);
    }

    #[test]
    fn detached_copy_is_independent() {
        let product = DomainObject::new("Product", 3)
            .with_field("code", "MUG")
            .with_sync_id("sync-3")
            .into_ref();

        let copy = product.detached_copy();
        copy.set("code", "CUP");

        assert_eq!(product.get("code"), Some(FieldValue::from("MUG")));
        assert_eq!(copy.sync_id().as_deref(), Some("sync-3"));
        assert_eq!(copy.identity(), product.identity());
    }
}
