//! Static description of a synchronization client.

use crate::change::CrudType;
use crate::error::{CoreError, CoreResult};
use std::collections::BTreeSet;

/// Domain categories a client can declare.
pub mod client_types {
    /// Products.
    pub const PRODUCTS: &str = "products";
    /// Orders.
    pub const ORDERS: &str = "orders";
    /// Attributes.
    pub const ATTRIBUTES: &str = "attributes";
    /// Categories.
    pub const CATEGORIES: &str = "categories";
    /// Customers.
    pub const CUSTOMERS: &str = "customers";

    /// Every known category.
    pub const ALL: [&str; 5] = [PRODUCTS, ORDERS, ATTRIBUTES, CATEGORIES, CUSTOMERS];
}

/// Operation code, type and crud types a client handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDescriptor {
    /// Operation code; unique per direction.
    pub operation_code: String,
    /// Domain category written on every record.
    pub client_type: String,
    /// Crud types the client accepts.
    pub crud_types: BTreeSet<CrudType>,
}

impl ClientDescriptor {
    /// Creates a descriptor.
    pub fn new<I>(
        operation_code: impl Into<String>,
        client_type: impl Into<String>,
        crud_types: I,
    ) -> Self
    where
        I: IntoIterator<Item = CrudType>,
    {
        Self {
            operation_code: operation_code.into(),
            client_type: client_type.into(),
            crud_types: crud_types.into_iter().collect(),
        }
    }

    /// Checks that every part of the descriptor is set.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming `client` and the missing part.
    pub fn validate(&self, client: &str) -> CoreResult<()> {
        if self.operation_code.trim().is_empty() {
            return Err(CoreError::config(format!(
                "Client {client} has no operation code."
            )));
        }
        if self.client_type.trim().is_empty() {
            return Err(CoreError::config(format!("Client {client} has no type.")));
        }
        if self.crud_types.is_empty() {
            return Err(CoreError::config(format!(
                "Client {client} has no crud types."
            )));
        }
        Ok(())
    }

    /// Whether the client accepts `crud_type`.
    pub fn supports_crud(&self, crud_type: CrudType) -> bool {
        self.crud_types.contains(&crud_type)
    }
}
