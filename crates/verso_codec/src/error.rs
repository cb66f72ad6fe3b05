//! Error types for the codec.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding objects.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Serialization to stored bytes failed.
    #[error("encode failed: {message}")]
    Encode {
        /// Description of the failure.
        message: String,
    },

    /// Deserialization from stored bytes failed.
    #[error("decode failed: {message}")]
    Decode {
        /// Description of the failure.
        message: String,
    },
}

impl CodecError {
    /// Creates an encode error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}
