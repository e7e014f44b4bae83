//! Inbound request and transfer object types.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A validated-on-demand inbound synchronization request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveOperation {
    /// Correlation id chosen by the sender.
    #[serde(default)]
    pub operation_id: String,
    /// Code of the input client that should handle the batch.
    #[serde(default)]
    pub operation_code: String,
    /// Raw items; each must carry a `syncId`.
    #[serde(default)]
    pub data: Vec<JsonValue>,
}

impl ReceiveOperation {
    /// Creates a request.
    pub fn new(
        operation_id: impl Into<String>,
        operation_code: impl Into<String>,
        data: Vec<JsonValue>,
    ) -> Self {
        Self {
            operation_id: operation_id.into(),
            operation_code: operation_code.into(),
            data,
        }
    }

    /// Trims surrounding whitespace off the string fields.
    pub fn sanitize(&mut self) {
        self.operation_id = self.operation_id.trim().to_string();
        self.operation_code = self.operation_code.trim().to_string();
    }

    /// Checks required keys and every item's `syncId`.
    ///
    /// # Errors
    ///
    /// Returns an invalid input error listing every violation.
    pub fn validate(&self) -> CoreResult<()> {
        let mut errors = Vec::new();
        if self.operation_id.trim().is_empty() {
            errors.push("Request key \"operationId\" has empty value.".to_string());
        }
        if self.operation_code.trim().is_empty() {
            errors.push("Request key \"operationCode\" has empty value.".to_string());
        }
        if self.data.is_empty() {
            errors.push("Request key \"data\" has empty value.".to_string());
        }
        for (index, item) in self.data.iter().enumerate() {
            let sync_id = item
                .get("syncId")
                .and_then(JsonValue::as_str)
                .map(str::trim)
                .unwrap_or_default();
            if sync_id.is_empty() {
                errors.push(format!("Request key \"data.[{index}].syncId\" is empty."));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::invalid_input(errors.join(" ")))
        }
    }
}

/// One inbound item normalized by an input client.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferItem {
    /// Sync id of the item.
    pub sync_id: String,
    /// Normalized representation stored in the inbox payload.
    pub data: JsonValue,
}

impl TransferItem {
    /// Creates an item.
    pub fn new(sync_id: impl Into<String>, data: JsonValue) -> Self {
        Self {
            sync_id: sync_id.into(),
            data,
        }
    }

    /// Serializes any typed item into a transfer item.
    ///
    /// # Errors
    ///
    /// Returns an encoding error if the item cannot be serialized.
    pub fn from_serializable<T: Serialize>(sync_id: impl Into<String>, item: &T) -> CoreResult<Self> {
        let data = serde_json::to_value(item).map_err(|e| CoreError::encoding(e.to_string()))?;
        Ok(Self::new(sync_id, data))
    }

    /// Deserializes the item into `T`.
    ///
    /// # Errors
    ///
    /// Returns an invalid input error if the data does not match `T`.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> CoreResult<T> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            CoreError::invalid_input(format!("Item \"{}\" can not be decoded: {e}", self.sync_id))
        })
    }
}

/// Typed batch built from a [`ReceiveOperation`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransferEnvelope {
    /// Correlation id of the request.
    pub operation_id: String,
    /// Code of the handling client.
    pub operation_code: String,
    /// Items in request order.
    pub items: Vec<TransferItem>,
}

impl TransferEnvelope {
    /// Creates an envelope.
    pub fn new(
        operation_id: impl Into<String>,
        operation_code: impl Into<String>,
        items: Vec<TransferItem>,
    ) -> Self {
        Self {
            operation_id: operation_id.into(),
            operation_code: operation_code.into(),
            items,
        }
    }

    /// Item carrying `sync_id`.
    pub fn item(&self, sync_id: &str) -> Option<&TransferItem> {
        self.items.iter().find(|item| item.sync_id == sync_id)
    }
}

/// Outbound data built by an output client for one record.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferObject(pub JsonValue);

impl TransferObject {
    /// Serializes any typed object.
    ///
    /// # Errors
    ///
    /// Returns an invalid output error if the object cannot be serialized.
    pub fn from_serializable<T: Serialize>(object: &T) -> CoreResult<Self> {
        serde_json::to_value(object)
            .map(Self)
            .map_err(|e| CoreError::invalid_output(e.to_string()))
    }

    /// JSON form.
    pub fn as_json(&self) -> &JsonValue {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_deserializes_camel_case() {
        let request: ReceiveOperation = serde_json::from_value(json!({
            "operationId": "op1",
            "operationCode": "X",
            "data": [{"syncId": "s1"}]
        }))
        .unwrap();
        assert_eq!(request.operation_code, "X");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn validate_lists_every_violation() {
        let mut request = ReceiveOperation::new(
            " ",
            "X",
            vec![json!({"syncId": "s1"}), json!({"syncId": ""}), json!({"name": "a"})],
        );
        request.sanitize();
        let message = request.validate().unwrap_err().to_string();

        assert!(message.starts_with("Incoming synchronization request is invalid."));
        assert!(message.contains("Request key \"operationId\" has empty value."));
        assert!(message.contains("Request key \"data.[1].syncId\" is empty."));
        assert!(message.contains("Request key \"data.[2].syncId\" is empty."));
        assert!(!message.contains("data.[0]"));
    }

    #[test]
    fn missing_keys_default_to_empty() {
        let request: ReceiveOperation = serde_json::from_value(json!({})).unwrap();
        let message = request.validate().unwrap_err().to_string();
        assert!(message.contains("\"data\" has empty value."));
    }

    #[test]
    fn item_decodes_typed() {
        #[derive(Deserialize)]
        struct Named {
            name: String,
        }
        let item = TransferItem::new("s1", json!({"name": "Mug"}));
        let named: Named = item.decode().unwrap();
        assert_eq!(named.name, "Mug");
        assert!(item.decode::<Vec<u8>>().is_err());

        let envelope = TransferEnvelope::new("op", "X", vec![item]);
        assert!(envelope.item("s1").is_some());
        assert!(envelope.item("s2").is_none());
    }
}
