//! Error types for raw clients.

use crate::client::KeyValue;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur talking to the raw store.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Create against an occupied key.
    #[error("key already exists: {key}")]
    KeyExists {
        /// The occupied key.
        key: String,
    },

    /// Key absent where presence was required.
    #[error("key not found: {key}")]
    KeyNotFound {
        /// The missing key.
        key: String,
    },

    /// A conditional write or delete lost the race.
    ///
    /// Carries the item currently stored under the key (`None` if the key
    /// was deleted concurrently) so callers can refresh without re-reading.
    #[error("revision mismatch on {key}: expected {expected}")]
    RevisionMismatch {
        /// The contended key.
        key: String,
        /// The revision the caller conditioned on.
        expected: i64,
        /// The item currently stored, if any.
        current: Option<KeyValue>,
    },

    /// No backend registered under the requested name.
    #[error("unknown backend type: {name}")]
    UnknownBackend {
        /// The unregistered backend name.
        name: String,
    },

    /// Network or transport failure.
    #[error("transport error: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },

    /// The operation was cancelled or its deadline expired.
    #[error("operation cancelled")]
    Cancelled,
}

impl ClientError {
    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Returns true for conditional-write races that callers retry.
    pub fn is_revision_mismatch(&self) -> bool {
        matches!(self, Self::RevisionMismatch { .. })
    }
}
