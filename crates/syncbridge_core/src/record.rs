//! The persisted synchronization record and its status state machine.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Identifier assigned by a record store.
pub type RecordId = u64;

/// Prefix under which unrecognized statuses are stored.
pub const UNKNOWN_STATUS_PREFIX: &str = "unknown_status:";

/// Direction of a synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    /// External system to local store.
    Incoming,
    /// Local store to external system.
    Outcoming,
}

impl FlowType {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            FlowType::Incoming => "incoming",
            FlowType::Outcoming => "outcoming",
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for FlowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incoming" => Ok(FlowType::Incoming),
            "outcoming" => Ok(FlowType::Outcoming),
            other => Err(format!("unknown flow type: {other}")),
        }
    }
}

/// Status of a synchronization record.
///
/// ```text
/// before_sync ──> error_on_sync_mapping
/// before_sync ──> sync_in_progress
/// sync_in_progress ──> sync_ok | error_on_sync_transport | error_on_sync_mapping
/// ```
///
/// Statuses set externally that are none of the above are kept as
/// [`SyncStatus::Unknown`] and written as `unknown_status:<value>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SyncStatus {
    /// Created, not yet handed to a client.
    BeforeSync,
    /// Handed to a client.
    InProgress,
    /// Transport succeeded.
    Ok,
    /// Generic failure reported by an external system.
    Failed,
    /// The client could not map the data.
    MappingError,
    /// The transport step failed.
    TransportError,
    /// A status this process does not know.
    Unknown(String),
}

impl SyncStatus {
    /// Every known status.
    pub const KNOWN: [SyncStatus; 6] = [
        SyncStatus::BeforeSync,
        SyncStatus::InProgress,
        SyncStatus::Ok,
        SyncStatus::Failed,
        SyncStatus::MappingError,
        SyncStatus::TransportError,
    ];

    /// Parses a stored or requested status; never fails.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "before_sync" => SyncStatus::BeforeSync,
            "sync_in_progress" => SyncStatus::InProgress,
            "sync_ok" => SyncStatus::Ok,
            "sync_error" => SyncStatus::Failed,
            "error_on_sync_mapping" => SyncStatus::MappingError,
            "error_on_sync_transport" => SyncStatus::TransportError,
            other => SyncStatus::Unknown(
                other
                    .strip_prefix(UNKNOWN_STATUS_PREFIX)
                    .unwrap_or(other)
                    .to_string(),
            ),
        }
    }

    /// Name of a known status, `None` for unknown ones.
    pub fn known_name(&self) -> Option<&'static str> {
        Some(match self {
            SyncStatus::BeforeSync => "before_sync",
            SyncStatus::InProgress => "sync_in_progress",
            SyncStatus::Ok => "sync_ok",
            SyncStatus::Failed => "sync_error",
            SyncStatus::MappingError => "error_on_sync_mapping",
            SyncStatus::TransportError => "error_on_sync_transport",
            SyncStatus::Unknown(_) => return None,
        })
    }

    /// Whether this is one of the known statuses.
    pub fn is_known(&self) -> bool {
        self.known_name().is_some()
    }

    /// Whether no further transition is expected in-process.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncStatus::Ok | SyncStatus::MappingError | SyncStatus::TransportError
        )
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Unknown(raw) => f.pad(&format!("{UNKNOWN_STATUS_PREFIX}{raw}")),
            known => f.pad(known.known_name().unwrap_or_default()),
        }
    }
}

impl From<String> for SyncStatus {
    fn from(raw: String) -> Self {
        SyncStatus::parse(&raw)
    }
}

impl From<SyncStatus> for String {
    fn from(status: SyncStatus) -> Self {
        status.to_string()
    }
}

/// Current time as unix milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Durable record of one synchronization attempt for one aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynchronizationRecord {
    /// Store-assigned id; `None` until inserted.
    pub id: Option<RecordId>,
    /// Domain category (`products`, `orders`, ...).
    #[serde(rename = "type")]
    pub record_type: String,
    /// Direction.
    pub flow_type: FlowType,
    /// Code of the client pair handling the record.
    pub operation_code: String,
    /// Sync id of the aggregate.
    pub sync_id: Option<String>,
    /// Correlates every record of one batch.
    pub operation_id: String,
    /// Raw input or prepared diff data.
    pub payload: JsonValue,
    /// Current status.
    pub status: SyncStatus,
    /// Error text of the last failure.
    pub error_message: Option<String>,
    /// Creation time (unix millis).
    pub created_at: u64,
    /// Time of the last status change (unix millis).
    pub updated_at: Option<u64>,
}

impl SynchronizationRecord {
    /// Creates an unsaved record in `before_sync` with a fresh operation id.
    pub fn new(
        flow_type: FlowType,
        record_type: impl Into<String>,
        operation_code: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            record_type: record_type.into(),
            flow_type,
            operation_code: operation_code.into(),
            sync_id: None,
            operation_id: Uuid::new_v4().to_string(),
            payload: JsonValue::Null,
            status: SyncStatus::BeforeSync,
            error_message: None,
            created_at: now_millis(),
            updated_at: None,
        }
    }

    /// Sets the sync id.
    #[must_use]
    pub fn with_sync_id(mut self, sync_id: impl Into<String>) -> Self {
        self.sync_id = Some(sync_id.into());
        self
    }

    /// Sets the operation id.
    #[must_use]
    pub fn with_operation_id(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = operation_id.into();
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload = payload;
        self
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, status: SyncStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the error message.
    #[must_use]
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Writes status and message and stamps `updated_at`.
    pub fn set_status(&mut self, status: SyncStatus, message: Option<String>) {
        self.status = status;
        self.error_message = message;
        self.updated_at = Some(now_millis());
    }

    /// Whether the record is incoming.
    pub fn is_incoming(&self) -> bool {
        self.flow_type == FlowType::Incoming
    }
}
