//! In-memory client for testing and ephemeral deployments.

use crate::client::{ChangeNotification, ChangeSource, KeyValue, RawClient};
use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

const NOTIFY_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    revision: i64,
    expires_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<String, Entry>,
    revision: i64,
}

impl Inner {
    fn next_revision(&mut self) -> i64 {
        self.revision += 1;
        self.revision
    }
}

/// An in-memory [`RawClient`].
///
/// Suitable for unit tests, integration tests, and ephemeral deployments
/// that don't need persistence. Revisions are a single store-wide counter,
/// bumped once per committed mutation. TTLs are enforced lazily: expired
/// entries are pruned (and deletion notifications emitted) whenever the
/// keyspace is next touched.
///
/// # Thread safety
///
/// The client is safe to share across tasks; every operation takes the
/// keyspace lock for its full duration, so reads and conditional writes are
/// atomic with respect to each other.
pub struct MemoryClient {
    inner: Mutex<Inner>,
    notifier: broadcast::Sender<ChangeNotification>,
}

impl MemoryClient {
    /// Creates a new empty in-memory client.
    #[must_use]
    pub fn new() -> Self {
        let (notifier, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            inner: Mutex::new(Inner::default()),
            notifier,
        }
    }

    /// Returns the revision of the most recent mutation (0 if none).
    pub fn current_revision(&self) -> i64 {
        self.inner.lock().revision
    }

    fn notify(&self, notification: ChangeNotification) {
        // No subscribers is fine.
        let _ = self.notifier.send(notification);
    }

    /// Removes expired entries, emitting deletion notifications for each.
    fn prune_expired(&self, inner: &mut Inner) {
        let now = Instant::now();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.expires_at.is_some_and(|at| at <= now))
            .map(|(k, _)| k.clone())
            .collect();

        for key in expired {
            if let Some(old) = inner.entries.remove(&key) {
                let revision = inner.next_revision();
                self.notify(ChangeNotification {
                    key,
                    value: Vec::new(),
                    prev_value: Some(old.value),
                    revision,
                    created: false,
                    deleted: true,
                });
            }
        }
    }
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

fn expiry(ttl: u64) -> Option<Instant> {
    (ttl > 0).then(|| Instant::now() + Duration::from_secs(ttl))
}

fn to_key_value(key: &str, entry: &Entry) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: entry.value.clone(),
        revision: entry.revision,
    }
}

#[async_trait]
impl RawClient for MemoryClient {
    async fn get(&self, key: &str) -> ClientResult<Option<KeyValue>> {
        let mut inner = self.inner.lock();
        self.prune_expired(&mut inner);
        Ok(inner.entries.get(key).map(|e| to_key_value(key, e)))
    }

    async fn create(&self, key: &str, value: Vec<u8>, ttl: u64) -> ClientResult<KeyValue> {
        let mut inner = self.inner.lock();
        self.prune_expired(&mut inner);

        if inner.entries.contains_key(key) {
            return Err(ClientError::KeyExists {
                key: key.to_string(),
            });
        }

        let revision = inner.next_revision();
        let entry = Entry {
            value: value.clone(),
            revision,
            expires_at: expiry(ttl),
        };
        let stored = to_key_value(key, &entry);
        inner.entries.insert(key.to_string(), entry);

        self.notify(ChangeNotification {
            key: key.to_string(),
            value,
            prev_value: None,
            revision,
            created: true,
            deleted: false,
        });

        Ok(stored)
    }

    async fn delete(&self, key: &str) -> ClientResult<KeyValue> {
        let mut inner = self.inner.lock();
        self.prune_expired(&mut inner);

        let old = inner
            .entries
            .remove(key)
            .ok_or_else(|| ClientError::KeyNotFound {
                key: key.to_string(),
            })?;

        let revision = inner.next_revision();
        self.notify(ChangeNotification {
            key: key.to_string(),
            value: Vec::new(),
            prev_value: Some(old.value.clone()),
            revision,
            created: false,
            deleted: true,
        });

        // The caller gets the item as it was at deletion time.
        Ok(to_key_value(key, &old))
    }

    async fn delete_at_revision(&self, key: &str, revision: i64) -> ClientResult<()> {
        let mut inner = self.inner.lock();
        self.prune_expired(&mut inner);

        if inner.entries.get(key).map(|e| e.revision) != Some(revision) {
            return Err(ClientError::RevisionMismatch {
                key: key.to_string(),
                expected: revision,
                current: inner.entries.get(key).map(|e| to_key_value(key, e)),
            });
        }

        if let Some(old) = inner.entries.remove(key) {
            let event_revision = inner.next_revision();
            self.notify(ChangeNotification {
                key: key.to_string(),
                value: Vec::new(),
                prev_value: Some(old.value),
                revision: event_revision,
                created: false,
                deleted: true,
            });
        }

        Ok(())
    }

    async fn update_or_create(
        &self,
        key: &str,
        value: Vec<u8>,
        expected_revision: i64,
        ttl: u64,
    ) -> ClientResult<KeyValue> {
        let mut inner = self.inner.lock();
        self.prune_expired(&mut inner);

        let current = inner.entries.get(key).map(|e| e.revision).unwrap_or(0);
        if current != expected_revision {
            return Err(ClientError::RevisionMismatch {
                key: key.to_string(),
                expected: expected_revision,
                current: inner.entries.get(key).map(|e| to_key_value(key, e)),
            });
        }

        let prev_value = inner.entries.get(key).map(|e| e.value.clone());
        let created = prev_value.is_none();
        let revision = inner.next_revision();
        let entry = Entry {
            value: value.clone(),
            revision,
            expires_at: expiry(ttl),
        };
        let stored = to_key_value(key, &entry);
        inner.entries.insert(key.to_string(), entry);

        self.notify(ChangeNotification {
            key: key.to_string(),
            value,
            prev_value,
            revision,
            created,
            deleted: false,
        });

        Ok(stored)
    }

    async fn list(&self, prefix: &str) -> ClientResult<Vec<KeyValue>> {
        let mut inner = self.inner.lock();
        self.prune_expired(&mut inner);

        Ok(inner
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, e)| to_key_value(k, e))
            .collect())
    }
}

impl ChangeSource for MemoryClient {
    fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.notifier.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get() {
        let client = MemoryClient::new();

        let created = client.create("/a", b"one".to_vec(), 0).await.unwrap();
        assert_eq!(created.revision, 1);

        let got = client.get("/a").await.unwrap().unwrap();
        assert_eq!(got.value, b"one");
        assert_eq!(got.revision, 1);
    }

    #[tokio::test]
    async fn create_existing_fails() {
        let client = MemoryClient::new();
        client.create("/a", b"one".to_vec(), 0).await.unwrap();

        let result = client.create("/a", b"two".to_vec(), 0).await;
        assert!(matches!(result, Err(ClientError::KeyExists { .. })));
    }

    #[tokio::test]
    async fn delete_returns_last_item() {
        let client = MemoryClient::new();
        client.create("/a", b"one".to_vec(), 0).await.unwrap();

        let deleted = client.delete("/a").await.unwrap();
        assert_eq!(deleted.value, b"one");
        assert_eq!(deleted.revision, 1);

        assert!(client.get("/a").await.unwrap().is_none());
        assert!(matches!(
            client.delete("/a").await,
            Err(ClientError::KeyNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn delete_at_revision_checks_current() {
        let client = MemoryClient::new();
        let kv = client.create("/a", b"one".to_vec(), 0).await.unwrap();

        let err = client.delete_at_revision("/a", kv.revision + 1).await;
        match err {
            Err(ClientError::RevisionMismatch { current, .. }) => {
                assert_eq!(current.unwrap().revision, kv.revision);
            }
            other => panic!("expected revision mismatch, got {other:?}"),
        }

        client.delete_at_revision("/a", kv.revision).await.unwrap();
        assert!(client.get("/a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_or_create_cas() {
        let client = MemoryClient::new();

        // Expected 0 creates.
        let kv = client
            .update_or_create("/a", b"one".to_vec(), 0, 0)
            .await
            .unwrap();
        assert_eq!(kv.revision, 1);

        // Wrong expectation loses, carrying the current item.
        let err = client.update_or_create("/a", b"two".to_vec(), 7, 0).await;
        match err {
            Err(ClientError::RevisionMismatch { current, .. }) => {
                assert_eq!(current.unwrap().value, b"one");
            }
            other => panic!("expected revision mismatch, got {other:?}"),
        }

        // Right expectation commits.
        let kv = client
            .update_or_create("/a", b"two".to_vec(), 1, 0)
            .await
            .unwrap();
        assert_eq!(kv.revision, 2);
        assert_eq!(kv.value, b"two");
    }

    #[tokio::test]
    async fn list_is_prefix_scan_in_key_order() {
        let client = MemoryClient::new();
        client.create("/a/b", b"1".to_vec(), 0).await.unwrap();
        client.create("/a/a", b"2".to_vec(), 0).await.unwrap();
        client.create("/b/a", b"3".to_vec(), 0).await.unwrap();

        let items = client.list("/a/").await.unwrap();
        let keys: Vec<&str> = items.iter().map(|kv| kv.key.as_str()).collect();
        assert_eq!(keys, vec!["/a/a", "/a/b"]);
    }

    #[tokio::test]
    async fn notifications_carry_previous_values() {
        let client = MemoryClient::new();
        let mut rx = client.subscribe();

        client.create("/a", b"one".to_vec(), 0).await.unwrap();
        client
            .update_or_create("/a", b"two".to_vec(), 1, 0)
            .await
            .unwrap();
        client.delete("/a").await.unwrap();

        let created = rx.recv().await.unwrap();
        assert!(created.created && !created.deleted);
        assert_eq!(created.prev_value, None);

        let updated = rx.recv().await.unwrap();
        assert!(!updated.created && !updated.deleted);
        assert_eq!(updated.prev_value.as_deref(), Some(b"one".as_slice()));

        let deleted = rx.recv().await.unwrap();
        assert!(deleted.deleted && !deleted.created);
        assert_eq!(deleted.prev_value.as_deref(), Some(b"two".as_slice()));
    }

    #[tokio::test]
    async fn ttl_expires_lazily() {
        let client = MemoryClient::new();
        client.create("/a", b"one".to_vec(), 1).await.unwrap();
        client.create("/b", b"two".to_vec(), 0).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(client.get("/a").await.unwrap().is_none());
        assert!(client.get("/b").await.unwrap().is_some());
    }
}
