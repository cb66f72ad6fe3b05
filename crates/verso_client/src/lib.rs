//! # verso client
//!
//! The raw key-value client layer of verso.
//!
//! This crate defines:
//! - [`RawClient`], the object-safe async contract the store layer consumes:
//!   point reads, create-if-absent, atomic read+delete, revision-conditional
//!   writes and deletes, and prefix listing, all against items tagged with a
//!   monotonic revision
//! - [`ChangeSource`], a broadcast feed of raw [`ChangeNotification`]s for
//!   watch transports
//! - [`MemoryClient`], an in-memory reference implementation
//! - [`ClientRegistry`], an explicit (non-global) backend registry
//!
//! All durable state lives behind the client; the store layer above holds
//! none.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod error;
mod memory;
mod registry;

pub use client::{ChangeNotification, ChangeSource, KeyValue, RawClient};
pub use error::{ClientError, ClientResult};
pub use memory::MemoryClient;
pub use registry::{BackendConfig, ClientRegistry, DestroyFn, HealthCheck, MEMORY_BACKEND};
