//! Error types for store operations.

use thiserror::Error;
use verso_client::ClientError;
use verso_codec::CodecError;
use verso_crypto::CryptoError;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Caller bug: the supplied object cannot be stored as given.
    #[error("invalid object: {message}")]
    InvalidObject {
        /// Description of the violation.
        message: String,
    },

    /// Key absent where absence is not tolerated.
    #[error("key not found: {key}")]
    KeyNotFound {
        /// The missing key.
        key: String,
    },

    /// Create against an occupied key.
    #[error("key already exists: {key}")]
    KeyExists {
        /// The occupied key.
        key: String,
    },

    /// A revision-conditional operation lost a race.
    ///
    /// Transient: conditional delete and `guaranteed_update` recover from it
    /// internally, so it only escapes those operations via cancellation. A
    /// `try_update` callback returns it to signal that its own cached inputs
    /// may be stale.
    #[error("conflict on {key} at revision {revision}")]
    Conflict {
        /// The contended key.
        key: String,
        /// The revision the losing operation was conditioned on.
        revision: i64,
    },

    /// A precondition did not hold against the live object. Never retried.
    #[error("precondition failed on {key}: {message}")]
    PreconditionFailed {
        /// The key being mutated.
        key: String,
        /// Description of the mismatch.
        message: String,
    },

    /// Encrypt/decrypt failure.
    #[error("transform error: {0}")]
    Transform(#[from] CryptoError),

    /// Codec failure.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Residual client failure (transport and the like).
    #[error("client error: {0}")]
    Client(#[source] ClientError),

    /// Internal invariant violation in a collaborator.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the violation.
        message: String,
    },

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

impl StoreError {
    /// Creates an invalid-object usage error.
    pub fn invalid_object(message: impl Into<String>) -> Self {
        Self::InvalidObject {
            message: message.into(),
        }
    }

    /// Creates a precondition failure.
    pub fn precondition_failed(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PreconditionFailed {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true for transient revision conflicts.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<ClientError> for StoreError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::KeyExists { key } => Self::KeyExists { key },
            ClientError::KeyNotFound { key } => Self::KeyNotFound { key },
            ClientError::RevisionMismatch { key, expected, .. } => Self::Conflict {
                key,
                revision: expected,
            },
            ClientError::Cancelled => Self::Cancelled,
            other => Self::Client(other),
        }
    }
}
