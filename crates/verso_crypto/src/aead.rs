//! AES-256-GCM transformers and key management.

use crate::error::{CryptoError, CryptoResult};
use crate::transformer::{AuthenticatedContext, Transformer};
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Encryption key for AES-256-GCM.
///
/// The key is automatically zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Generates a new random encryption key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::invalid_key_size(bytes.len(), KEY_SIZE));
        }

        let mut key_bytes = [0u8; KEY_SIZE];
        key_bytes.copy_from_slice(bytes);
        Ok(Self { bytes: key_bytes })
    }

    /// Derives a key from a password using HKDF-SHA256.
    ///
    /// HKDF is appropriate when the input material already has high entropy
    /// (a generated passphrase); for user-chosen passwords prefer a dedicated
    /// password hash upstream.
    pub fn derive_from_password(password: &[u8], salt: &[u8]) -> CryptoResult<Self> {
        use hkdf::Hkdf;
        use sha2::Sha256;

        let hk = Hkdf::<Sha256>::new(Some(salt), password);

        let mut bytes = [0u8; KEY_SIZE];
        hk.expand(b"verso-storage-key-v1", &mut bytes)
            .map_err(|_| CryptoError::key_derivation_failed("HKDF expand failed"))?;

        Ok(Self { bytes })
    }

    /// Returns the key as a byte slice.
    ///
    /// # Security
    ///
    /// Do not log or serialize the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// AES-256-GCM transformer.
///
/// Output layout: `nonce (12 bytes) || ciphertext || tag (16 bytes)`. The
/// authenticated context is passed as associated data, binding each value to
/// its storage key.
pub struct AesGcmTransformer {
    cipher: Aes256Gcm,
}

impl AesGcmTransformer {
    /// Creates a transformer with the given key.
    #[must_use]
    pub fn new(key: &EncryptionKey) -> Self {
        // Infallible: EncryptionKey is always exactly the AES-256 key size.
        let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
        Self { cipher }
    }

    fn seal(&self, plaintext: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| CryptoError::encryption_failed("encryption error"))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend(ciphertext);

        Ok(result)
    }

    fn open(&self, stored: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
        if stored.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::decryption_failed("ciphertext too short"));
        }

        let nonce = Nonce::from_slice(&stored[..NONCE_SIZE]);
        let encrypted = &stored[NONCE_SIZE..];

        self.cipher
            .decrypt(
                nonce,
                Payload {
                    msg: encrypted,
                    aad,
                },
            )
            .map_err(|_| CryptoError::decryption_failed("decryption error"))
    }
}

impl Transformer for AesGcmTransformer {
    fn transform_to_storage(
        &self,
        plaintext: &[u8],
        context: AuthenticatedContext<'_>,
    ) -> CryptoResult<Vec<u8>> {
        self.seal(plaintext, context.authenticated_data())
    }

    fn transform_from_storage(
        &self,
        stored: &[u8],
        context: AuthenticatedContext<'_>,
    ) -> CryptoResult<(Vec<u8>, bool)> {
        let plaintext = self.open(stored, context.authenticated_data())?;
        Ok((plaintext, false))
    }
}

impl std::fmt::Debug for AesGcmTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmTransformer")
            .field("cipher", &"Aes256Gcm")
            .finish()
    }
}

/// Multi-key transformer supporting key rotation.
///
/// Writes always use the first key. Reads try every key in order; a value
/// that only opens under a non-primary key is reported stale, signalling the
/// store to rewrite it under the primary key when it next gets the chance.
pub struct KeySetTransformer {
    transformers: Vec<AesGcmTransformer>,
}

impl KeySetTransformer {
    /// Creates a transformer from a key set. The first key is the write key.
    ///
    /// # Errors
    ///
    /// Returns an error if `keys` is empty.
    pub fn new(keys: &[EncryptionKey]) -> CryptoResult<Self> {
        if keys.is_empty() {
            return Err(CryptoError::EmptyKeySet);
        }
        Ok(Self {
            transformers: keys.iter().map(AesGcmTransformer::new).collect(),
        })
    }
}

impl Transformer for KeySetTransformer {
    fn transform_to_storage(
        &self,
        plaintext: &[u8],
        context: AuthenticatedContext<'_>,
    ) -> CryptoResult<Vec<u8>> {
        self.transformers[0].transform_to_storage(plaintext, context)
    }

    fn transform_from_storage(
        &self,
        stored: &[u8],
        context: AuthenticatedContext<'_>,
    ) -> CryptoResult<(Vec<u8>, bool)> {
        for (i, t) in self.transformers.iter().enumerate() {
            if let Ok((plaintext, _)) = t.transform_from_storage(stored, context) {
                return Ok((plaintext, i != 0));
            }
        }
        Err(CryptoError::decryption_failed(
            "value does not open under any known key",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> AuthenticatedContext<'static> {
        AuthenticatedContext::new("/registry/widgets/a")
    }

    #[test]
    fn generate_keys_differ() {
        let key1 = EncryptionKey::generate();
        let key2 = EncryptionKey::generate();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn key_wrong_size() {
        assert!(EncryptionKey::from_bytes(&[0u8; 16]).is_err());
        assert!(EncryptionKey::from_bytes(&[0u8; 64]).is_err());
    }

    #[test]
    fn derive_is_stable() {
        let a = EncryptionKey::derive_from_password(b"passphrase", b"salt").unwrap();
        let b = EncryptionKey::derive_from_password(b"passphrase", b"salt").unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());

        let c = EncryptionKey::derive_from_password(b"passphrase", b"other").unwrap();
        assert_ne!(a.as_bytes(), c.as_bytes());
    }

    #[test]
    fn roundtrip() {
        let t = AesGcmTransformer::new(&EncryptionKey::generate());
        let stored = t.transform_to_storage(b"payload", ctx()).unwrap();
        assert_ne!(&stored[NONCE_SIZE..], b"payload");

        let (plain, stale) = t.transform_from_storage(&stored, ctx()).unwrap();
        assert_eq!(plain, b"payload");
        assert!(!stale);
    }

    #[test]
    fn context_mismatch_fails() {
        let t = AesGcmTransformer::new(&EncryptionKey::generate());
        let stored = t
            .transform_to_storage(b"payload", AuthenticatedContext::new("/registry/widgets/a"))
            .unwrap();

        // Ciphertext moved to a different key must not decrypt.
        let result =
            t.transform_from_storage(&stored, AuthenticatedContext::new("/registry/widgets/b"));
        assert!(matches!(result, Err(CryptoError::DecryptionFailed { .. })));
    }

    #[test]
    fn wrong_key_fails() {
        let t1 = AesGcmTransformer::new(&EncryptionKey::generate());
        let t2 = AesGcmTransformer::new(&EncryptionKey::generate());

        let stored = t1.transform_to_storage(b"secret", ctx()).unwrap();
        assert!(t2.transform_from_storage(&stored, ctx()).is_err());
    }

    #[test]
    fn tampered_value_fails() {
        let t = AesGcmTransformer::new(&EncryptionKey::generate());
        let mut stored = t.transform_to_storage(b"payload", ctx()).unwrap();
        stored[NONCE_SIZE + 1] ^= 0xff;
        assert!(t.transform_from_storage(&stored, ctx()).is_err());
    }

    #[test]
    fn empty_key_set_rejected() {
        assert!(matches!(
            KeySetTransformer::new(&[]),
            Err(CryptoError::EmptyKeySet)
        ));
    }

    #[test]
    fn rotated_read_reports_stale() {
        let old_key = EncryptionKey::generate();
        let new_key = EncryptionKey::generate();

        let old_set = KeySetTransformer::new(&[old_key.clone()]).unwrap();
        let stored = old_set.transform_to_storage(b"payload", ctx()).unwrap();

        // After rotation the old key moves behind the new primary.
        let rotated = KeySetTransformer::new(&[new_key, old_key]).unwrap();
        let (plain, stale) = rotated.transform_from_storage(&stored, ctx()).unwrap();
        assert_eq!(plain, b"payload");
        assert!(stale);

        // A fresh write under the rotated set reads back clean.
        let rewritten = rotated.transform_to_storage(&plain, ctx()).unwrap();
        let (_, stale) = rotated.transform_from_storage(&rewritten, ctx()).unwrap();
        assert!(!stale);
    }
}
