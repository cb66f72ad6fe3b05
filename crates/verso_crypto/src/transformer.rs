//! The transformer contract.

use crate::error::CryptoResult;

/// Authenticated binding for a transform operation.
///
/// The context is derived from the fully-qualified storage key. It does not
/// defend against replay of an old ciphertext under the same key, but it does
/// prevent an attacker with raw store access from moving an encrypted value
/// to a different key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedContext<'a> {
    data: &'a [u8],
}

impl<'a> AuthenticatedContext<'a> {
    /// Creates a context bound to the given storage key.
    #[must_use]
    pub fn new(key: &'a str) -> Self {
        Self {
            data: key.as_bytes(),
        }
    }

    /// Returns the authenticated data for this context.
    #[must_use]
    pub fn authenticated_data(&self) -> &[u8] {
        self.data
    }
}

/// Transforms values on their way to and from the raw store.
///
/// Implementations must tolerate concurrent use without internal mutation
/// races; the store shares one transformer across all in-flight operations.
pub trait Transformer: Send + Sync {
    /// Transforms plaintext bytes into their stored form.
    fn transform_to_storage(
        &self,
        plaintext: &[u8],
        context: AuthenticatedContext<'_>,
    ) -> CryptoResult<Vec<u8>>;

    /// Transforms stored bytes back into plaintext.
    ///
    /// Returns the plaintext and a `stale` flag. `stale` is true when the
    /// value was readable but written under a superseded scheme (for example
    /// a rotated key) and should be rewritten at the next opportunity.
    fn transform_from_storage(
        &self,
        stored: &[u8],
        context: AuthenticatedContext<'_>,
    ) -> CryptoResult<(Vec<u8>, bool)>;
}

/// Pass-through transformer for unencrypted deployments.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransformer;

impl IdentityTransformer {
    /// Creates a new identity transformer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Transformer for IdentityTransformer {
    fn transform_to_storage(
        &self,
        plaintext: &[u8],
        _context: AuthenticatedContext<'_>,
    ) -> CryptoResult<Vec<u8>> {
        Ok(plaintext.to_vec())
    }

    fn transform_from_storage(
        &self,
        stored: &[u8],
        _context: AuthenticatedContext<'_>,
    ) -> CryptoResult<(Vec<u8>, bool)> {
        Ok((stored.to_vec(), false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_roundtrip() {
        let t = IdentityTransformer::new();
        let ctx = AuthenticatedContext::new("/registry/widgets/a");

        let stored = t.transform_to_storage(b"payload", ctx).unwrap();
        assert_eq!(stored, b"payload");

        let (plain, stale) = t.transform_from_storage(&stored, ctx).unwrap();
        assert_eq!(plain, b"payload");
        assert!(!stale);
    }

    #[test]
    fn context_carries_key_bytes() {
        let ctx = AuthenticatedContext::new("/registry/widgets/a");
        assert_eq!(ctx.authenticated_data(), b"/registry/widgets/a");
    }
}
