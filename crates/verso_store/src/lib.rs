//! # verso store
//!
//! The consistency layer of verso: versioned CRUD, list, and watch over a
//! raw key-value client, with optimistic concurrency and encryption at rest.
//!
//! [`Store`] orchestrates three collaborators it holds but does not own the
//! semantics of: a [`Codec`](verso_codec::Codec) for typed-object bytes, a
//! [`Transformer`](verso_crypto::Transformer) binding every stored value to
//! its key, and a [`RawClient`](verso_client::RawClient) whose monotonic
//! revisions are the only ordering primitive. The central protocol is
//! [`Store::guaranteed_update`]: a compare-and-swap loop giving linearizable
//! read-modify-write on a single key without locks.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod event;
mod store;
mod types;
mod watch;

pub use error::{StoreError, StoreResult};
pub use event::Event;
pub use store::Store;
pub use types::{ObjectList, Preconditions, ResponseMeta, SelectionPredicate};
pub use watch::{BroadcastWatcher, WatchEvent, WatchEventKind, WatchHandle, Watcher};
