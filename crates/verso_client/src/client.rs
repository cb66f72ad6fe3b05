//! Raw client contract and item types.

use crate::error::ClientResult;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// A single stored item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    /// The fully-qualified key.
    pub key: String,
    /// The stored bytes, opaque to the client.
    pub value: Vec<u8>,
    /// Revision assigned by the store to the mutation that produced this
    /// item. Strictly increasing store-wide; never supplied by callers.
    pub revision: i64,
}

/// A raw change record from the store's notification transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    /// The key that changed.
    pub key: String,
    /// The new stored bytes (empty for deletions).
    pub value: Vec<u8>,
    /// The previous stored bytes, when the transport provides them.
    pub prev_value: Option<Vec<u8>>,
    /// Revision of the mutation.
    pub revision: i64,
    /// True if the key did not exist before this mutation.
    pub created: bool,
    /// True if this mutation removed the key.
    pub deleted: bool,
}

/// The raw key-value store contract.
///
/// This trait is object-safe; the store layer holds an `Arc<dyn RawClient>`.
/// Implementations must be safe for concurrent use; the revision-conditional
/// operations are the only ordering primitive the layers above rely on.
#[async_trait]
pub trait RawClient: Send + Sync {
    /// Point read. Returns the current item, or `None` if the key is absent.
    async fn get(&self, key: &str) -> ClientResult<Option<KeyValue>>;

    /// Creates a key that must not already exist.
    ///
    /// `ttl` is a lifetime in seconds; 0 means no expiry.
    ///
    /// # Errors
    ///
    /// [`ClientError::KeyExists`](crate::ClientError::KeyExists) if the key
    /// is present.
    async fn create(&self, key: &str, value: Vec<u8>, ttl: u64) -> ClientResult<KeyValue>;

    /// Deletes a key, returning the deleted item.
    ///
    /// The read and the delete are atomic: the returned value and revision
    /// are exactly what the delete removed.
    ///
    /// # Errors
    ///
    /// [`ClientError::KeyNotFound`](crate::ClientError::KeyNotFound) if the
    /// key is absent.
    async fn delete(&self, key: &str) -> ClientResult<KeyValue>;

    /// Deletes a key only if its current revision equals `revision`.
    ///
    /// # Errors
    ///
    /// [`ClientError::RevisionMismatch`](crate::ClientError::RevisionMismatch)
    /// if the current revision differs (including when the key is absent).
    async fn delete_at_revision(&self, key: &str, revision: i64) -> ClientResult<()>;

    /// Conditionally writes a key.
    ///
    /// The write commits only if the key's current revision equals
    /// `expected_revision`; an expected revision of 0 commits only if the key
    /// is absent (creating it). On a lost race the error carries the item
    /// currently stored so the caller can refresh without another read.
    async fn update_or_create(
        &self,
        key: &str,
        value: Vec<u8>,
        expected_revision: i64,
        ttl: u64,
    ) -> ClientResult<KeyValue>;

    /// Lists all items whose key starts with `prefix`, in the store's native
    /// key order.
    async fn list(&self, prefix: &str) -> ClientResult<Vec<KeyValue>>;
}

/// A source of raw change notifications.
///
/// Watch transports subscribe here; the broadcast channel drops slow
/// receivers rather than blocking writers.
pub trait ChangeSource: Send + Sync {
    /// Subscribes to all future change notifications.
    fn subscribe(&self) -> broadcast::Receiver<ChangeNotification>;
}
