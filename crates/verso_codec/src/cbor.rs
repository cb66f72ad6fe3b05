//! Codec trait and the default CBOR implementation.

use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Converts objects to and from their stored byte form.
///
/// Implementations must be deterministic: encoding the same value twice must
/// produce identical bytes. The store relies on this to detect no-op writes
/// by byte comparison.
pub trait Codec<O>: Send + Sync {
    /// Encodes an object to stored bytes.
    fn encode(&self, obj: &O) -> CodecResult<Vec<u8>>;

    /// Decodes an object from stored bytes.
    fn decode(&self, data: &[u8]) -> CodecResult<O>;
}

/// Deterministic CBOR codec for any serde-serializable object.
///
/// CBOR struct encoding is stable for a fixed type definition, which
/// satisfies the determinism requirement of [`Codec`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CborCodec;

impl CborCodec {
    /// Creates a new CBOR codec.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<O> Codec<O> for CborCodec
where
    O: Serialize + DeserializeOwned + Send + Sync,
{
    fn encode(&self, obj: &O) -> CodecResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(obj, &mut buf).map_err(|e| CodecError::encode(e.to_string()))?;
        Ok(buf)
    }

    fn decode(&self, data: &[u8]) -> CodecResult<O> {
        ciborium::from_reader(data).map_err(|e| CodecError::decode(e.to_string()))
    }
}
