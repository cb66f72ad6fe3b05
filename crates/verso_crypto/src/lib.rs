//! # verso crypto
//!
//! Encryption at rest for the verso storage layer.
//!
//! A [`Transformer`] converts plaintext object bytes to their stored form and
//! back. Every operation is bound to an [`AuthenticatedContext`] derived from
//! the fully-qualified storage key, so ciphertext lifted from one key cannot
//! be replayed under another.
//!
//! Implementations:
//! - [`IdentityTransformer`]: pass-through, for unencrypted deployments
//! - [`AesGcmTransformer`]: AES-256-GCM with the context as associated data
//! - [`KeySetTransformer`]: multi-key rotation; reads under a superseded key
//!   succeed but are reported stale so the caller can rewrite opportunistically

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod aead;
mod error;
mod transformer;

pub use aead::{AesGcmTransformer, EncryptionKey, KeySetTransformer, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use transformer::{AuthenticatedContext, IdentityTransformer, Transformer};
