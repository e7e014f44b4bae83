//! A small product catalog used across the tests.
//!
//! `Product` is the only syncable class. Variants, their translations and
//! their channel prices all resolve to the product they belong to.

use syncbridge_core::{ClassSchema, CoreResult, DomainObject, ObjectRef, SchemaRegistry};

/// Syncable product class.
pub const PRODUCT: &str = "Product";
/// Variant of a product.
pub const PRODUCT_VARIANT: &str = "ProductVariant";
/// Localized name of a variant.
pub const PRODUCT_VARIANT_TRANSLATION: &str = "ProductVariantTranslation";
/// Price of a variant in one channel.
pub const CHANNEL_PRICING: &str = "ChannelPricing";

/// Operation code of the demo output client.
pub const PRODUCT_TO_FILE: &str = "PRODUCT_TO_FILE_TEST_UPDATE";
/// Operation code of the demo input client.
pub const PRODUCT_RECEIVE: &str = "PRODUCT_RECIEVE_TEST";

/// Every catalog class.
pub const CLASSES: [&str; 4] = [
    PRODUCT,
    PRODUCT_VARIANT,
    PRODUCT_VARIANT_TRANSLATION,
    CHANNEL_PRICING,
];

/// Schema of the catalog; every class declares [`PRODUCT_TO_FILE`].
///
/// # Errors
///
/// Never fails for the built-in classes; the result mirrors
/// [`SchemaRegistry::with_class`].
pub fn schema() -> CoreResult<SchemaRegistry> {
    schema_with_codes(&[PRODUCT_TO_FILE])
}

/// Schema of the catalog declaring `codes` on every path.
///
/// # Errors
///
/// Mirrors [`SchemaRegistry::with_class`].
pub fn schema_with_codes(codes: &[&str]) -> CoreResult<SchemaRegistry> {
    let codes = codes.to_vec();
    SchemaRegistry::new()
        .with_class(
            ClassSchema::new(PRODUCT)
                .syncable()
                .fields(["code", "enabled", "updatedAt"])
                .sync_path(".", codes.clone()),
        )?
        .with_class(
            ClassSchema::new(PRODUCT_VARIANT)
                .fields(["code", "enabled", "onHand", "updatedAt"])
                .association("product", PRODUCT)
                .sync_path("product", codes.clone()),
        )?
        .with_class(
            ClassSchema::new(PRODUCT_VARIANT_TRANSLATION)
                .fields(["locale", "name"])
                .association("translatable", PRODUCT_VARIANT)
                .sync_path("translatable.product", codes.clone()),
        )?
        .with_class(
            ClassSchema::new(CHANNEL_PRICING)
                .fields(["channelCode", "price"])
                .association("productVariant", PRODUCT_VARIANT)
                .sync_path("productVariant.product", codes),
        )
}

/// An enabled product.
pub fn product(id: i64, code: &str) -> ObjectRef {
    DomainObject::new(PRODUCT, id)
        .with_field("code", code)
        .with_field("enabled", true)
        .into_ref()
}

/// An enabled, out-of-stock variant of `product`.
pub fn variant(id: i64, code: &str, product: &ObjectRef) -> ObjectRef {
    DomainObject::new(PRODUCT_VARIANT, id)
        .with_field("code", code)
        .with_field("enabled", true)
        .with_field("onHand", 0i64)
        .with_field("product", product)
        .into_ref()
}

/// A translated name of `variant`.
pub fn translation(id: i64, variant: &ObjectRef, locale: &str, name: &str) -> ObjectRef {
    DomainObject::new(PRODUCT_VARIANT_TRANSLATION, id)
        .with_field("locale", locale)
        .with_field("name", name)
        .with_field("translatable", variant)
        .into_ref()
}

/// The price of `variant` in the default channel.
pub fn channel_pricing(id: i64, variant: &ObjectRef, price: i64) -> ObjectRef {
    DomainObject::new(CHANNEL_PRICING, id)
        .with_field("channelCode", "WEB")
        .with_field("price", price)
        .with_field("productVariant", variant)
        .into_ref()
}
