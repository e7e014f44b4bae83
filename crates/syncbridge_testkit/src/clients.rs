//! Demo clients for the catalog.
//!
//! [`ProductFromApiClient`] accepts products pushed by a remote API and logs
//! them. [`ProductToFileClient`] turns catalog changes into product
//! documents and appends them, one JSON document per line, to a sink.

use crate::catalog::{
    CHANNEL_PRICING, CLASSES, PRODUCT, PRODUCT_RECEIVE, PRODUCT_TO_FILE, PRODUCT_VARIANT,
    PRODUCT_VARIANT_TRANSLATION,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use syncbridge_core::{
    client_types, ChangeCollection, ClientDescriptor, CoreError, CrudType, DomainObject,
    FieldValue, ObjectRef, ReceiveOperation, RelationExtractor, SynchronizationRecord,
    TransferEnvelope, TransferItem, TransferObject,
};
use syncbridge_engine::{InputClient, OutputClient, OutputSupport, SyncClient, SyncError, SyncResult};
use tracing::info;

/// A variant as sent by the remote API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputProductVariant {
    /// Variant code.
    pub code: String,
    /// Code of the owning product.
    pub product_code: String,
    /// Units on stock.
    pub on_stock_count: i64,
    /// Price in minor units.
    pub price: i64,
    /// Whether the variant is sold.
    pub is_enabled: bool,
    /// Translated attributes by locale.
    pub localizations: BTreeMap<String, BTreeMap<String, String>>,
}

/// A product as sent by the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputProduct {
    /// Sync id shared with the remote side.
    pub sync_id: String,
    /// Product code.
    #[serde(default)]
    pub code: String,
    /// Whether the product is sold.
    #[serde(default)]
    pub is_enabled: bool,
    /// Variants of the product.
    #[serde(default)]
    pub variants: Vec<InputProductVariant>,
}

/// Input client for [`PRODUCT_RECEIVE`].
#[derive(Debug)]
pub struct ProductFromApiClient {
    descriptor: ClientDescriptor,
    received: Mutex<Vec<InputProduct>>,
}

impl Default for ProductFromApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductFromApiClient {
    /// Creates the client.
    pub fn new() -> Self {
        Self {
            descriptor: ClientDescriptor::new(PRODUCT_RECEIVE, client_types::PRODUCTS, CrudType::ALL),
            received: Mutex::new(Vec::new()),
        }
    }

    /// Products applied so far.
    pub fn received(&self) -> Vec<InputProduct> {
        self.received.lock().clone()
    }
}

impl SyncClient for ProductFromApiClient {
    fn descriptor(&self) -> &ClientDescriptor {
        &self.descriptor
    }

    fn name(&self) -> &str {
        "ProductFromApiClient"
    }
}

impl InputClient for ProductFromApiClient {
    fn build_transferable_input(&self, request: &ReceiveOperation) -> SyncResult<TransferEnvelope> {
        let mut items = Vec::with_capacity(request.data.len());
        for (index, raw) in request.data.iter().enumerate() {
            let product: InputProduct = serde_json::from_value(raw.clone()).map_err(|e| {
                CoreError::invalid_input(format!("Item {index} is not a product: {e}"))
            })?;
            items.push(TransferItem::from_serializable(product.sync_id.as_str(), &product)?);
        }
        Ok(TransferEnvelope::new(
            request.operation_id.as_str(),
            request.operation_code.as_str(),
            items,
        ))
    }

    fn synchronize_input(&self, record: &SynchronizationRecord, item: &TransferItem) -> SyncResult<()> {
        let product: InputProduct = item.decode()?;
        info!(
            operation_id = %record.operation_id,
            transfer = %item.data,
            "received product"
        );
        self.received.lock().push(product);
        Ok(())
    }
}

/// A variant in an outbound product document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputProductVariant {
    /// Variant code.
    pub code: String,
    /// Store id of the owning product.
    pub product_id: i64,
    /// Units on stock.
    pub on_stock_count: i64,
    /// Price in minor units, when a channel price changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    /// Whether the variant is sold.
    pub is_enabled: bool,
    /// Translated attributes by locale.
    #[serde(default)]
    pub localizations: BTreeMap<String, BTreeMap<String, String>>,
}

/// One product document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputProduct {
    /// Sync id of the product.
    pub sync_id: String,
    /// Product code.
    #[serde(default)]
    pub code: Option<String>,
    /// Whether the product is sold.
    pub is_enabled: bool,
    /// Changed variants in first-touch order.
    pub variants: Vec<OutputProductVariant>,
}

/// Envelope written per outbox record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputProductCollection {
    /// Batch of the record.
    pub operation_id: String,
    /// Operation code of the record.
    pub operation_code: String,
    /// Product documents.
    pub data: Vec<OutputProduct>,
}

impl OutputProductCollection {
    fn product_mut(&mut self, product: &DomainObject) -> SyncResult<&mut OutputProduct> {
        let Some(sync_id) = product.sync_id() else {
            return Err(SyncError::invalid_output(format!(
                "{} has no sync id",
                product.identity()
            )));
        };
        let index = match self.data.iter().position(|p| p.sync_id == sync_id) {
            Some(index) => index,
            None => {
                self.data.push(OutputProduct {
                    sync_id,
                    ..OutputProduct::default()
                });
                self.data.len() - 1
            }
        };
        let out = &mut self.data[index];
        out.is_enabled = bool_field(product, "enabled");
        out.code = product.get("code").and_then(|v| v.as_text().map(str::to_string));
        Ok(out)
    }

    fn variant_mut(&mut self, variant: &DomainObject) -> SyncResult<&mut OutputProductVariant> {
        let product = object_field(variant, "product")?;
        let code = variant
            .get("code")
            .and_then(|v| v.as_text().map(str::to_string))
            .unwrap_or_default();
        let out = self.product_mut(&product)?;
        let index = match out.variants.iter().position(|v| v.code == code) {
            Some(index) => index,
            None => {
                out.variants.push(OutputProductVariant {
                    code,
                    ..OutputProductVariant::default()
                });
                out.variants.len() - 1
            }
        };
        let entry = &mut out.variants[index];
        entry.is_enabled = bool_field(variant, "enabled");
        entry.on_stock_count = variant.get("onHand").and_then(|v| v.as_integer()).unwrap_or(0);
        entry.product_id = product.id();
        Ok(entry)
    }
}

fn bool_field(object: &DomainObject, name: &str) -> bool {
    object.get(name).and_then(|v| v.as_bool()).unwrap_or(false)
}

fn object_field(object: &DomainObject, name: &str) -> SyncResult<ObjectRef> {
    match object.get(name) {
        Some(FieldValue::Object(target)) => Ok(target),
        _ => Err(SyncError::invalid_output(format!(
            "{} has no {name}",
            object.identity()
        ))),
    }
}

/// Where [`ProductToFileClient`] writes its documents.
#[derive(Debug)]
pub enum JsonLineSink {
    /// Lines kept in memory.
    Memory(Mutex<Vec<String>>),
    /// Lines appended to a file.
    File(PathBuf),
}

impl JsonLineSink {
    /// An empty in-memory sink.
    pub fn memory() -> Self {
        JsonLineSink::Memory(Mutex::new(Vec::new()))
    }

    /// A sink appending to `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        JsonLineSink::File(path.into())
    }

    fn write_line(&self, line: String) -> std::io::Result<()> {
        match self {
            JsonLineSink::Memory(lines) => {
                lines.lock().push(line);
                Ok(())
            }
            JsonLineSink::File(path) => {
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                writeln!(file, "{line}")
            }
        }
    }

    /// Lines written so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn lines(&self) -> std::io::Result<Vec<String>> {
        match self {
            JsonLineSink::Memory(lines) => Ok(lines.lock().clone()),
            JsonLineSink::File(path) => match std::fs::read_to_string(path) {
                Ok(text) => Ok(text.lines().map(str::to_string).collect()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
                Err(e) => Err(e),
            },
        }
    }
}

/// Output client for [`PRODUCT_TO_FILE`].
#[derive(Debug)]
pub struct ProductToFileClient {
    descriptor: ClientDescriptor,
    support: OutputSupport,
    sink: JsonLineSink,
}

impl ProductToFileClient {
    /// Creates the client writing to `sink`.
    pub fn new(extractor: Arc<RelationExtractor>, sink: JsonLineSink) -> Self {
        Self {
            descriptor: ClientDescriptor::new(PRODUCT_TO_FILE, client_types::PRODUCTS, CrudType::ALL),
            support: OutputSupport::new(extractor),
            sink,
        }
    }

    /// The sink.
    pub fn sink(&self) -> &JsonLineSink {
        &self.sink
    }

    /// Documents written so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot be read or a line is not a
    /// document.
    pub fn written(&self) -> std::io::Result<Vec<OutputProductCollection>> {
        self.sink
            .lines()?
            .iter()
            .map(|line| serde_json::from_str(line).map_err(std::io::Error::other))
            .collect()
    }

    fn collect(
        &self,
        applied: &dyn ChangeCollection,
        record: &SynchronizationRecord,
    ) -> SyncResult<OutputProductCollection> {
        let mut out = OutputProductCollection {
            operation_id: record.operation_id.clone(),
            operation_code: record.operation_code.clone(),
            data: Vec::new(),
        };

        for change in applied.iter() {
            if self
                .support
                .skip_by_sync_id(change, record, self.operation_code())?
            {
                continue;
            }
            let resource = change.resource();
            match resource.class() {
                PRODUCT => {
                    out.product_mut(resource)?;
                }
                PRODUCT_VARIANT => {
                    out.variant_mut(resource)?;
                }
                PRODUCT_VARIANT_TRANSLATION => {
                    let variant = object_field(resource, "translatable")?;
                    let locale = resource
                        .get("locale")
                        .and_then(|v| v.as_text().map(str::to_string))
                        .unwrap_or_default();
                    let name = resource
                        .get("name")
                        .and_then(|v| v.as_text().map(str::to_string))
                        .unwrap_or_default();
                    out.variant_mut(&variant)?
                        .localizations
                        .entry(locale)
                        .or_default()
                        .insert("name".to_string(), name);
                }
                CHANNEL_PRICING => {
                    let variant = object_field(resource, "productVariant")?;
                    let price = resource.get("price").and_then(|v| v.as_integer());
                    out.variant_mut(&variant)?.price = price;
                }
                _ => {}
            }
        }
        Ok(out)
    }
}

impl SyncClient for ProductToFileClient {
    fn descriptor(&self) -> &ClientDescriptor {
        &self.descriptor
    }

    fn name(&self) -> &str {
        "ProductToFileClient"
    }
}

impl OutputClient for ProductToFileClient {
    fn is_supported(&self, applied: &dyn ChangeCollection) -> bool {
        self.support
            .declares_operation(applied, self.operation_code())
            && applied
                .iter()
                .any(|change| CLASSES.contains(&change.resource().class()))
    }

    fn build_transferable_output(
        &self,
        applied: &dyn ChangeCollection,
        _chronology: &dyn ChangeCollection,
        record: &SynchronizationRecord,
    ) -> SyncResult<Option<TransferObject>> {
        if !self.is_supported(applied) {
            return Ok(None);
        }
        let out = self.collect(applied, record).map_err(|e| {
            if e.is_invalid_output() {
                e
            } else {
                SyncError::invalid_output(e.to_string())
            }
        })?;
        Ok(Some(TransferObject::from_serializable(&out)?))
    }

    fn synchronize_output(&self, transfer: &TransferObject) -> SyncResult<()> {
        let line = transfer.as_json().to_string();
        self.sink
            .write_line(line)
            .map_err(|e| SyncError::transport(format!("product file not written: {e}")))?;
        info!(
            operation_id = %transfer.as_json()["operationId"],
            "product document written"
        );
        Ok(())
    }
}
