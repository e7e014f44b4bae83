//! Property-based test generators using proptest.

use proptest::prelude::*;
use serde_json::{json, Value as JsonValue};
use syncbridge_core::{CrudType, FieldValue, SyncStatus};

/// Strategy for crud types.
pub fn crud_type_strategy() -> impl Strategy<Value = CrudType> {
    prop::sample::select(CrudType::ALL.to_vec())
}

/// Strategy for statuses, unknown ones included.
pub fn sync_status_strategy() -> impl Strategy<Value = SyncStatus> {
    prop_oneof![
        4 => prop::sample::select(SyncStatus::KNOWN.to_vec()),
        1 => "[a-z_]{1,12}".prop_map(|raw| SyncStatus::parse(&raw)),
    ]
}

/// Strategy for scalar attribute values.
pub fn scalar_value_strategy() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        Just(FieldValue::Null),
        any::<bool>().prop_map(FieldValue::Bool),
        any::<i64>().prop_map(FieldValue::Integer),
        "[A-Za-z0-9 -]{0,16}".prop_map(FieldValue::Text),
    ]
}

/// Strategy for sync ids.
pub fn sync_id_strategy() -> impl Strategy<Value = String> {
    "[a-f0-9]{8}-[a-f0-9]{4}"
}

/// Strategy for raw product items of an inbound request, each with a
/// distinct sync id.
pub fn product_items_strategy(max: usize) -> impl Strategy<Value = Vec<JsonValue>> {
    prop::collection::btree_map(sync_id_strategy(), ("[A-Z]{3,6}", any::<bool>()), 1..=max.max(1))
        .prop_map(|items| {
            items
                .into_iter()
                .map(|(sync_id, (code, enabled))| {
                    json!({"syncId": sync_id, "code": code, "isEnabled": enabled})
                })
                .collect()
        })
}

/// Strategy for a run of positive writes to one attribute:
/// `(attribute, values)`.
pub fn write_sequence_strategy() -> impl Strategy<Value = (String, Vec<i64>)> {
    (
        prop::sample::select(vec!["code", "enabled", "onHand"]).prop_map(str::to_string),
        prop::collection::vec(1i64..1000, 1..12),
    )
}
