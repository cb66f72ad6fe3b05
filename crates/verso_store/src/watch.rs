//! Watch streams over normalized events.

use crate::error::{StoreError, StoreResult};
use crate::event::Event;
use crate::types::SelectionPredicate;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{broadcast, mpsc};
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use verso_client::{ChangeNotification, ChangeSource, RawClient};
use verso_codec::{Codec, Object};
use verso_crypto::{AuthenticatedContext, Transformer};

const WATCH_BUFFER: usize = 128;

/// Kind of change a watch delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    /// The object came into existence (or was present at watch start).
    Added,
    /// The object changed.
    Modified,
    /// The object was removed; the payload is its last state.
    Deleted,
}

/// A single delivered watch event.
#[derive(Debug, Clone)]
pub struct WatchEvent<O> {
    /// What happened.
    pub kind: WatchEventKind,
    /// The object after the change (before it, for deletions), stamped with
    /// the change's revision.
    pub object: O,
}

/// A cancellable stream of watch events.
///
/// Dropping the handle cancels the watch.
pub struct WatchHandle<O> {
    events: mpsc::Receiver<StoreResult<WatchEvent<O>>>,
    cancel: CancellationToken,
}

impl<O> WatchHandle<O> {
    /// Builds a handle from its channel and token.
    ///
    /// Intended for [`Watcher`] implementations.
    #[must_use]
    pub fn new(
        events: mpsc::Receiver<StoreResult<WatchEvent<O>>>,
        cancel: CancellationToken,
    ) -> Self {
        Self { events, cancel }
    }

    /// Receives the next event; `None` once the watch has ended.
    pub async fn next(&mut self) -> Option<StoreResult<WatchEvent<O>>> {
        self.events.recv().await
    }

    /// Stops the watch. Already-delivered events remain readable.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl<O> Stream for WatchHandle<O> {
    type Item = StoreResult<WatchEvent<O>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl<O> Drop for WatchHandle<O> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Produces watch streams for the store.
///
/// `key` is fully qualified; `recursive` selects prefix semantics; only
/// events with revision strictly greater than `from_revision` are delivered.
pub trait Watcher<O>: Send + Sync {
    /// Starts a watch.
    fn watch(
        &self,
        key: &str,
        from_revision: i64,
        recursive: bool,
        predicate: SelectionPredicate<O>,
    ) -> StoreResult<WatchHandle<O>>;
}

/// A [`Watcher`] over any client that exposes a change feed.
///
/// Starting from revision 0 first synthesizes `Added` events from an initial
/// listing, then continues with live notifications above the listing's
/// horizon, so "list then watch" behaves as one sequence. Must be used from
/// within a Tokio runtime.
pub struct BroadcastWatcher<O, C> {
    client: Arc<C>,
    codec: Arc<dyn Codec<O>>,
    transformer: Arc<dyn Transformer>,
}

impl<O, C> BroadcastWatcher<O, C>
where
    O: Object,
    C: RawClient + ChangeSource + 'static,
{
    /// Creates a watcher sharing the store's codec and transformer.
    pub fn new(
        client: Arc<C>,
        codec: Arc<dyn Codec<O>>,
        transformer: Arc<dyn Transformer>,
    ) -> Self {
        Self {
            client,
            codec,
            transformer,
        }
    }
}

impl<O, C> Watcher<O> for BroadcastWatcher<O, C>
where
    O: Object,
    C: RawClient + ChangeSource + 'static,
{
    fn watch(
        &self,
        key: &str,
        from_revision: i64,
        recursive: bool,
        predicate: SelectionPredicate<O>,
    ) -> StoreResult<WatchHandle<O>> {
        // Subscribe before the initial listing so no mutation falls in the
        // gap between the two.
        let notifications = self.client.subscribe();
        let (tx, events) = mpsc::channel(WATCH_BUFFER);
        let cancel = CancellationToken::new();

        let mut prefix = key.to_string();
        if recursive && !prefix.ends_with('/') {
            prefix.push('/');
        }

        let pump = WatchPump {
            client: Arc::clone(&self.client),
            codec: Arc::clone(&self.codec),
            transformer: Arc::clone(&self.transformer),
            key: key.to_string(),
            prefix,
            recursive,
            from_revision,
            predicate,
            notifications,
            tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(pump.run());

        Ok(WatchHandle::new(events, cancel))
    }
}

struct WatchPump<O, C> {
    client: Arc<C>,
    codec: Arc<dyn Codec<O>>,
    transformer: Arc<dyn Transformer>,
    key: String,
    prefix: String,
    recursive: bool,
    from_revision: i64,
    predicate: SelectionPredicate<O>,
    notifications: broadcast::Receiver<ChangeNotification>,
    tx: mpsc::Sender<StoreResult<WatchEvent<O>>>,
    cancel: CancellationToken,
}

impl<O, C> WatchPump<O, C>
where
    O: Object,
    C: RawClient,
{
    async fn run(mut self) {
        let mut horizon = self.from_revision;

        if self.from_revision == 0 {
            let initial = if self.recursive {
                self.client.list(&self.prefix).await
            } else {
                self.client
                    .get(&self.key)
                    .await
                    .map(|item| item.into_iter().collect())
            };
            match initial {
                Ok(items) => {
                    for kv in items {
                        horizon = horizon.max(kv.revision);
                        if self.deliver(Event::from_listing(kv)).await.is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    let _ = self.tx.send(Err(err.into())).await;
                    return;
                }
            }
        }

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                received = self.notifications.recv() => match received {
                    Ok(notification) => {
                        if notification.revision <= horizon || !self.watches(&notification.key) {
                            continue;
                        }
                        if self.deliver(Event::from_notification(notification)).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // The feed outran us; the caller must re-list rather
                        // than trust a gappy stream.
                        let _ = self
                            .tx
                            .send(Err(StoreError::internal(format!(
                                "watch lagged behind by {missed} events"
                            ))))
                            .await;
                        return;
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                },
            }
        }
    }

    fn watches(&self, key: &str) -> bool {
        if self.recursive {
            key.starts_with(&self.prefix)
        } else {
            key == self.key
        }
    }

    async fn deliver(&self, event: Event) -> Result<(), ()> {
        let item = match self.to_watch_event(&event) {
            Ok(Some(watch_event)) => Ok(watch_event),
            Ok(None) => return Ok(()),
            Err(err) => Err(err),
        };
        self.tx.send(item).await.map_err(|_| ())
    }

    fn to_watch_event(&self, event: &Event) -> StoreResult<Option<WatchEvent<O>>> {
        let (kind, data) = if event.deleted {
            let prev = event.prev_value.as_deref().ok_or_else(|| {
                StoreError::internal(format!(
                    "deletion event for {} carries no previous value",
                    event.key
                ))
            })?;
            (WatchEventKind::Deleted, prev)
        } else if event.created {
            (WatchEventKind::Added, event.value.as_slice())
        } else {
            (WatchEventKind::Modified, event.value.as_slice())
        };

        let (plain, _) = self
            .transformer
            .transform_from_storage(data, AuthenticatedContext::new(&event.key))?;
        let mut object = self.codec.decode(&plain)?;
        object.set_resource_version(event.revision);

        Ok(self
            .predicate
            .matches(&object)
            .then_some(WatchEvent { kind, object }))
    }
}
