//! # verso codec
//!
//! Object serialization for the verso storage layer.
//!
//! This crate provides:
//! - The [`Object`] trait for domain types carrying an embedded resource
//!   version and an optional owner UID
//! - The [`Codec`] trait for converting objects to and from stored bytes
//! - [`CborCodec`], the default deterministic CBOR implementation
//!
//! The resource version is never part of the stored bytes; the store layer
//! zeroes it before encoding and stamps the committed revision back onto
//! decoded objects.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod error;
mod object;

pub use cbor::{CborCodec, Codec};
pub use error::{CodecError, CodecResult};
pub use object::Object;
