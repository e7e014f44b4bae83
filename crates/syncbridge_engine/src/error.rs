//! Error types for the sync engine.

use std::error::Error as StdError;
use syncbridge_core::CoreError;
use thiserror::Error;

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors raised by the processor and by clients.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A core failure (configuration, corruption, validation, storage).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The external system could not be reached or refused the data.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
    },

    /// A client failed while applying or building data.
    #[error("client error: {message}")]
    Client {
        /// Error message.
        message: String,
    },

    /// An internal inconsistency between records and transfer items.
    #[error("{message}")]
    Logic {
        /// Error message.
        message: String,
    },
}

impl SyncError {
    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a client error.
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client {
            message: message.into(),
        }
    }

    /// Creates a logic error.
    pub fn logic(message: impl Into<String>) -> Self {
        Self::Logic {
            message: message.into(),
        }
    }

    /// Creates a mapping failure of an output client.
    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::Core(CoreError::invalid_output(message))
    }

    /// True if this is a mapping failure of an output client.
    pub fn is_invalid_output(&self) -> bool {
        matches!(self, SyncError::Core(CoreError::InvalidOutput { .. }))
    }

    /// HTTP-like status code; `0` means uncategorized.
    pub fn status_code(&self) -> u16 {
        match self {
            SyncError::Core(e) => e.status_code(),
            SyncError::Logic { .. } => 500,
            SyncError::Transport { .. } | SyncError::Client { .. } => 0,
        }
    }

    /// Short class name used to key error reports.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Core(e) => e.kind(),
            SyncError::Transport { .. } => "TransportError",
            SyncError::Client { .. } => "ClientError",
            SyncError::Logic { .. } => "LogicError",
        }
    }
}

/// Text recorded on a failed record: the message followed by its cause chain.
pub fn error_trace(error: &(dyn StdError + 'static)) -> String {
    let mut chain = vec![format!("{}({error:?})", kind_of(error))];
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    format!("{error} Stacktrace: {}", chain.join(" <- "))
}

fn kind_of(error: &(dyn StdError + 'static)) -> &'static str {
    if let Some(e) = error.downcast_ref::<SyncError>() {
        e.kind()
    } else if let Some(e) = error.downcast_ref::<CoreError>() {
        e.kind()
    } else {
        "Error"
    }
}
