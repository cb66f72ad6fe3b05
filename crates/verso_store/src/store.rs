//! The versioned object store.

use crate::error::{StoreError, StoreResult};
use crate::types::{ObjectList, Preconditions, ResponseMeta, SelectionPredicate};
use crate::watch::{WatchHandle, Watcher};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use verso_client::{ClientError, KeyValue, RawClient};
use verso_codec::{Codec, Object};
use verso_crypto::{AuthenticatedContext, Transformer};

/// Working snapshot of one key, built per operation and never cached.
struct ObjState<O> {
    obj: O,
    rev: i64,
    data: Vec<u8>,
    stale: bool,
}

/// A consistency layer over a raw key-value client.
///
/// The store owns no durable state and no locks: every operation builds its
/// working state from the client, and all mutual exclusion is delegated to
/// the client's revision-conditional writes. Objects pass through the codec
/// on both directions and through the transformer on their way to and from
/// storage, with each transform bound to the fully-qualified key.
///
/// One store instance is safe to share across any number of concurrent
/// callers.
pub struct Store<O> {
    client: Arc<dyn RawClient>,
    codec: Arc<dyn Codec<O>>,
    transformer: Arc<dyn Transformer>,
    watcher: Arc<dyn Watcher<O>>,
    path_prefix: String,
}

impl<O: Object> Store<O> {
    /// Creates a store namespacing all keys under `prefix`.
    pub fn new(
        client: Arc<dyn RawClient>,
        codec: Arc<dyn Codec<O>>,
        prefix: &str,
        transformer: Arc<dyn Transformer>,
        watcher: Arc<dyn Watcher<O>>,
    ) -> Self {
        Self {
            client,
            codec,
            transformer,
            watcher,
            // Rooted so custom prefixes without a leading '/' still land in
            // a single flat namespace.
            path_prefix: join_path("/", prefix),
        }
    }

    /// Stores a new object under `key`.
    ///
    /// The object must not carry a resource version; `ttl` is a lifetime in
    /// seconds (0 = none). Returns the stored object stamped with its new
    /// revision.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidObject`] for a nonzero resource version,
    /// [`StoreError::KeyExists`] if the key is occupied (reported
    /// immediately, no retry).
    pub async fn create(&self, key: &str, obj: &O, ttl: u64) -> StoreResult<O> {
        if obj.resource_version() != 0 {
            return Err(StoreError::invalid_object(
                "resource version must not be set on objects to be created",
            ));
        }
        let data = self.codec.encode(obj)?;
        let key = self.full_key(key);

        let stored = self
            .transformer
            .transform_to_storage(&data, AuthenticatedContext::new(&key))?;

        match self.client.create(&key, stored, ttl).await {
            Ok(kv) => self.decode(&data, kv.revision),
            Err(ClientError::KeyExists { .. }) => Err(StoreError::KeyExists { key }),
            Err(err) => Err(err.into()),
        }
    }

    /// Deletes `key`, returning the deleted object.
    ///
    /// With preconditions this becomes a read-check-delete loop conditioned
    /// on the revision the preconditions were checked against; the loop is
    /// unbounded except for `cancel`.
    pub async fn delete(
        &self,
        key: &str,
        preconditions: Option<&Preconditions>,
        cancel: &CancellationToken,
    ) -> StoreResult<O> {
        let key = self.full_key(key);
        match preconditions {
            None => self.unconditional_delete(&key).await,
            Some(preconditions) => self.conditional_delete(&key, preconditions, cancel).await,
        }
    }

    async fn unconditional_delete(&self, key: &str) -> StoreResult<O> {
        // Get and delete are one atomic step so the returned value and
        // revision are exactly what was removed.
        let kv = match self.client.delete(key).await {
            Ok(kv) => kv,
            Err(ClientError::KeyNotFound { .. }) => {
                return Err(StoreError::KeyNotFound {
                    key: key.to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };

        let (data, _) = self
            .transformer
            .transform_from_storage(&kv.value, AuthenticatedContext::new(key))?;
        self.decode(&data, kv.revision)
    }

    async fn conditional_delete(
        &self,
        key: &str,
        preconditions: &Preconditions,
        cancel: &CancellationToken,
    ) -> StoreResult<O> {
        while !cancel.is_cancelled() {
            let state = self.current_state(key, false).await?;
            preconditions.check(key, &state.obj)?;

            match self.client.delete_at_revision(key, state.rev).await {
                Ok(()) => return self.decode(&state.data, state.rev),
                Err(ClientError::RevisionMismatch { .. }) => {
                    debug!(key, "conditional delete lost the race, retrying");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(StoreError::Cancelled)
    }

    /// Reads the object under `key`.
    ///
    /// Absence yields `Ok(None)` when `ignore_not_found` is set, otherwise
    /// [`StoreError::KeyNotFound`].
    pub async fn get(&self, key: &str, ignore_not_found: bool) -> StoreResult<Option<O>> {
        let key = self.full_key(key);
        match self.client.get(&key).await? {
            None if ignore_not_found => Ok(None),
            None => Err(StoreError::KeyNotFound { key }),
            Some(kv) => {
                let (data, _) = self
                    .transformer
                    .transform_from_storage(&kv.value, AuthenticatedContext::new(&key))?;
                Ok(Some(self.decode(&data, kv.revision)?))
            }
        }
    }

    /// Reads a single key into list form.
    ///
    /// Returns a one-item-or-empty list; the cursor is the read revision when
    /// the key exists.
    pub async fn get_to_list(
        &self,
        key: &str,
        predicate: &SelectionPredicate<O>,
    ) -> StoreResult<ObjectList<O>> {
        let key = self.full_key(key);
        let Some(kv) = self.client.get(&key).await? else {
            return Ok(ObjectList::default());
        };

        let (data, _) = self
            .transformer
            .transform_from_storage(&kv.value, AuthenticatedContext::new(&key))?;
        let read_revision = kv.revision;
        let obj = self.decode(&data, kv.revision)?;

        let mut items = Vec::new();
        if predicate.matches(&obj) {
            items.push(obj);
        }
        Ok(ObjectList {
            items,
            revision: Some(read_revision),
        })
    }

    /// Lists all objects under `key`.
    ///
    /// The scan only descends into children: listing `/a` must not match the
    /// sibling `/ab`, so the prefix is coerced to end with `/`. Items that
    /// fail to transform are logged and skipped rather than failing the scan;
    /// surviving items are decoded, filtered, and returned in scan order.
    /// The cursor is `None`, since per-item revisions differ across a scan.
    pub async fn list(
        &self,
        key: &str,
        predicate: &SelectionPredicate<O>,
    ) -> StoreResult<ObjectList<O>> {
        let mut key = self.full_key(key);
        if !key.ends_with('/') {
            key.push('/');
        }

        let mut items = Vec::new();
        for kv in self.client.list(&key).await? {
            let (data, _) = match self
                .transformer
                .transform_from_storage(&kv.value, AuthenticatedContext::new(&kv.key))
            {
                Ok(transformed) => transformed,
                Err(err) => {
                    warn!(key = %kv.key, error = %err, "unable to transform value, skipping");
                    continue;
                }
            };
            let obj = self.decode(&data, kv.revision)?;
            if predicate.matches(&obj) {
                items.push(obj);
            }
        }
        Ok(ObjectList {
            items,
            revision: None,
        })
    }

    /// Watches a single key for changes after `from_revision`.
    pub fn watch(
        &self,
        key: &str,
        from_revision: i64,
        predicate: SelectionPredicate<O>,
    ) -> StoreResult<WatchHandle<O>> {
        self.watcher
            .watch(&self.full_key(key), from_revision, false, predicate)
    }

    /// Watches all keys under a prefix for changes after `from_revision`.
    pub fn watch_list(
        &self,
        key: &str,
        from_revision: i64,
        predicate: SelectionPredicate<O>,
    ) -> StoreResult<WatchHandle<O>> {
        self.watcher
            .watch(&self.full_key(key), from_revision, true, predicate)
    }

    /// Read-modify-write with optimistic concurrency.
    ///
    /// `try_update` receives the current object (or `O::default()` when the
    /// key is absent and `ignore_not_found` is set) plus its read metadata,
    /// and returns the candidate object with an optional TTL. The write is
    /// conditioned on the revision the current object was read at; a lost
    /// race refreshes from the conflicting response and retries without
    /// limit. Returning [`StoreError::Conflict`] from `try_update` requests
    /// a refresh when the operation started from an unverified `suggestion`.
    ///
    /// If the candidate serializes to exactly the stored bytes and the
    /// stored value is not stale, no write is issued and the original object
    /// is returned at its original revision.
    ///
    /// The loop is unbounded except for `cancel`, checked each iteration.
    pub async fn guaranteed_update<F>(
        &self,
        key: &str,
        ignore_not_found: bool,
        preconditions: Option<&Preconditions>,
        mut try_update: F,
        suggestion: Option<O>,
        cancel: &CancellationToken,
    ) -> StoreResult<O>
    where
        F: FnMut(O, ResponseMeta) -> StoreResult<(O, Option<u64>)>,
    {
        let key = self.full_key(key);

        // A suggestion is the caller's cached copy; deriving state from it
        // skips the initial read but leaves the data unverified.
        let (mut orig_state, mut must_check_data) = match suggestion {
            Some(suggested) => (self.state_from_object(suggested)?, true),
            None => (self.current_state(&key, ignore_not_found).await?, false),
        };

        while !cancel.is_cancelled() {
            if let Some(preconditions) = preconditions {
                preconditions.check(&key, &orig_state.obj)?;
            }

            let (ret, ttl) = match self.apply_update(&orig_state, &mut try_update) {
                Ok(updated) => updated,
                Err(err) if must_check_data && err.is_conflict() => {
                    // The suggestion may have been stale; fetch and retry.
                    orig_state = self.current_state(&key, ignore_not_found).await?;
                    must_check_data = false;
                    continue;
                }
                Err(err) => return Err(err),
            };

            let data = self.codec.encode(&ret)?;
            if !orig_state.stale && data == orig_state.data {
                // The comparison only counts once the baseline is known
                // fresh; a suggestion-derived state must be re-read first.
                if must_check_data {
                    orig_state = self.current_state(&key, ignore_not_found).await?;
                    must_check_data = false;
                    if data != orig_state.data {
                        continue;
                    }
                }
                if !orig_state.stale {
                    return self.decode(&orig_state.data, orig_state.rev);
                }
            }

            let stored = self
                .transformer
                .transform_to_storage(&data, AuthenticatedContext::new(&key))?;

            match self
                .client
                .update_or_create(&key, stored, orig_state.rev, ttl.unwrap_or(0))
                .await
            {
                Ok(kv) => return self.decode(&data, kv.revision),
                Err(ClientError::RevisionMismatch { current, .. }) => {
                    debug!(key = %key, "guaranteed update lost the race, retrying");
                    orig_state = self.state_from_item(current, &key, ignore_not_found)?;
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(StoreError::Cancelled)
    }

    fn full_key(&self, key: &str) -> String {
        join_path(&self.path_prefix, key)
    }

    /// Decodes stored bytes and stamps the revision onto the object.
    fn decode(&self, data: &[u8], rev: i64) -> StoreResult<O> {
        let mut obj = self.codec.decode(data)?;
        obj.set_resource_version(rev);
        Ok(obj)
    }

    fn state_from_item(
        &self,
        item: Option<KeyValue>,
        key: &str,
        ignore_not_found: bool,
    ) -> StoreResult<ObjState<O>> {
        match item {
            None if ignore_not_found => Ok(ObjState {
                obj: O::default(),
                rev: 0,
                data: Vec::new(),
                stale: false,
            }),
            None => Err(StoreError::KeyNotFound {
                key: key.to_string(),
            }),
            Some(kv) => {
                let (data, stale) = self
                    .transformer
                    .transform_from_storage(&kv.value, AuthenticatedContext::new(key))?;
                let obj = self.decode(&data, kv.revision)?;
                Ok(ObjState {
                    obj,
                    rev: kv.revision,
                    data,
                    stale,
                })
            }
        }
    }

    /// Derives state from a caller-supplied object without touching the
    /// store. The serialized form is computed against a version-stripped
    /// copy, since stored bytes never contain a version.
    fn state_from_object(&self, obj: O) -> StoreResult<ObjState<O>> {
        let rev = obj.resource_version();
        let mut clean = obj.clone();
        clean.set_resource_version(0);
        let data = self.codec.encode(&clean)?;
        Ok(ObjState {
            obj,
            rev,
            data,
            stale: false,
        })
    }

    async fn current_state(&self, key: &str, ignore_not_found: bool) -> StoreResult<ObjState<O>> {
        let item = self.client.get(key).await?;
        self.state_from_item(item, key, ignore_not_found)
    }

    fn apply_update<F>(
        &self,
        state: &ObjState<O>,
        try_update: &mut F,
    ) -> StoreResult<(O, Option<u64>)>
    where
        F: FnMut(O, ResponseMeta) -> StoreResult<(O, Option<u64>)>,
    {
        let meta = ResponseMeta {
            resource_version: state.rev,
        };
        let (mut ret, ttl) = try_update(state.obj.clone(), meta)?;
        if ret.resource_version() != 0 {
            // Candidates are serialized without a version.
            ret.set_resource_version(0);
        }
        Ok((ret, ttl))
    }
}

/// Joins two key segments with exactly one separator.
fn join_path(base: &str, tail: &str) -> String {
    let base = base.trim_end_matches('/');
    let tail = tail.trim_start_matches('/');
    if tail.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{tail}")
    }
}
