//! Error types for the synchronization core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the synchronization core.
///
/// The first four variants form the synchronization taxonomy; each carries a
/// fixed category sentence in its display text followed by the detail.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Developer-facing configuration problem: an unresolvable sync path, a
    /// missing capability, a duplicate operation code.
    #[error("Synchronization configuration is invalid. {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },

    /// A runtime invariant was violated (insert without id, update of a
    /// record that was never persisted).
    #[error("Synchronization process was corrupted. {message}")]
    Corrupted {
        /// Description of the violation.
        message: String,
    },

    /// The inbound request failed validation.
    #[error("Incoming synchronization request is invalid. {message}")]
    InvalidInput {
        /// Description of every violation.
        message: String,
    },

    /// An output client could not map domain state to its transfer object.
    #[error("Outcoming synchronization data can not be mapped. {message}")]
    InvalidOutput {
        /// Description of the mapping failure.
        message: String,
    },

    /// A lookup found nothing.
    #[error("{message}")]
    NotFound {
        /// Description of what was looked up.
        message: String,
    },

    /// Journal or backend failure.
    #[error("storage error: {0}")]
    Storage(#[from] syncbridge_storage::StorageError),

    /// A record could not be encoded or decoded.
    #[error("encoding error: {message}")]
    Encoding {
        /// Description of the encoding failure.
        message: String,
    },
}

impl CoreError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates an invalid output error.
    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates an encoding error.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// HTTP-like status code of this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::InvalidInput { .. } | CoreError::InvalidOutput { .. } => 400,
            CoreError::NotFound { .. } => 404,
            CoreError::Config { .. }
            | CoreError::Corrupted { .. }
            | CoreError::Storage(_)
            | CoreError::Encoding { .. } => 500,
        }
    }

    /// Short class name of this error, used to key error reports.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Config { .. } => "ConfigError",
            CoreError::Corrupted { .. } => "CorruptedError",
            CoreError::InvalidInput { .. } => "InvalidInputError",
            CoreError::InvalidOutput { .. } => "InvalidOutputError",
            CoreError::NotFound { .. } => "NotFoundError",
            CoreError::Storage(_) => "StorageError",
            CoreError::Encoding { .. } => "EncodingError",
        }
    }

    /// The detail text without the category sentence.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            CoreError::Config { message }
            | CoreError::Corrupted { message }
            | CoreError::InvalidInput { message }
            | CoreError::InvalidOutput { message }
            | CoreError::NotFound { message }
            | CoreError::Encoding { message } => message.clone(),
            CoreError::Storage(e) => e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_category_sentence() {
        let err = CoreError::corrupted("ID is not set.");
        assert_eq!(
            err.to_string(),
            "Synchronization process was corrupted. ID is not set."
        );
        assert_eq!(err.detail(), "ID is not set.");

        let err = CoreError::invalid_input("Request key \"data\" has empty value.");
        assert!(err
            .to_string()
            .starts_with("Incoming synchronization request is invalid."));
    }

    #[test]
    fn status_codes_and_kinds() {
        assert_eq!(CoreError::invalid_input("x").status_code(), 400);
        assert_eq!(CoreError::invalid_output("x").status_code(), 400);
        assert_eq!(CoreError::not_found("x").status_code(), 404);
        assert_eq!(CoreError::config("x").status_code(), 500);
        assert_eq!(CoreError::corrupted("x").kind(), "CorruptedError");
        assert_eq!(CoreError::config("x").kind(), "ConfigError");
    }
}
