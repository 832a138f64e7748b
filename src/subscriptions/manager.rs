//! Feed manager: owns live feeds and pushes snapshots to them.

use crate::types::{CollectionPath, Document, Query, Sequence};
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

use super::types::{
    DropReason, FeedCanceller, FeedConfig, FeedEvent, FeedEventKind, FeedHandle, Snapshot,
    SubscriptionId,
};

/// Internal feed state.
struct Feed {
    id: SubscriptionId,
    query: Query,
    sender: Sender<FeedEvent>,
}

impl Feed {
    /// Try to send an event. Returns false if the feed can no longer
    /// receive (buffer full or consumer gone).
    fn try_send(&self, kind: FeedEventKind) -> bool {
        let event = FeedEvent {
            subscription: self.id,
            kind,
        };
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(feed = self.id.0, "feed buffer full, dropping subscriber");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Best-effort termination notice.
    fn notify_dropped(&self, reason: DropReason) {
        let _ = self.sender.try_send(FeedEvent {
            subscription: self.id,
            kind: FeedEventKind::Dropped { reason },
        });
    }
}

/// Manages live feeds and broadcasts collection snapshots.
pub struct FeedManager {
    /// Active feeds by ID.
    feeds: RwLock<HashMap<SubscriptionId, Feed>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    config: FeedConfig,
}

impl FeedManager {
    /// Create a new feed manager.
    pub fn new(config: FeedConfig) -> Arc<Self> {
        Arc::new(Self {
            feeds: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            config,
        })
    }

    /// Open a feed for `query` and queue `initial` as its first snapshot.
    ///
    /// The caller must hold whatever lock serializes writes to the queried
    /// collection, so that no broadcast can be missed between computing
    /// `initial` and registering the feed.
    pub fn subscribe(
        self: &Arc<Self>,
        query: Query,
        initial: Vec<Document>,
        sequence: Sequence,
    ) -> FeedHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(self.config.buffer_size.max(1));

        let feed = Feed {
            id,
            query: query.clone(),
            sender,
        };
        feed.try_send(FeedEventKind::Snapshot(Snapshot {
            sequence,
            documents: initial,
        }));

        self.feeds.write().insert(id, feed);
        debug!(feed = id.0, collection = %query.collection, "feed opened");

        let canceller: Weak<dyn FeedCanceller> = Arc::downgrade(self) as Weak<FeedManager>;
        FeedHandle::new(id, query, receiver, canceller)
    }

    /// Unregister a feed. Returns whether it was still registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.feeds.write().remove(&id);
        match removed {
            Some(feed) => {
                feed.notify_dropped(DropReason::Unsubscribed);
                debug!(feed = id.0, "feed cancelled");
                true
            }
            None => false,
        }
    }

    /// Number of open feeds.
    pub fn feed_count(&self) -> usize {
        self.feeds.read().len()
    }

    /// Whether a feed is still registered.
    pub fn is_active(&self, id: SubscriptionId) -> bool {
        self.feeds.read().contains_key(&id)
    }

    /// Push a fresh snapshot to every feed over `collection`.
    ///
    /// `contents` yields the collection's documents; each feed receives
    /// them ordered by its own query. Feeds that cannot receive are dropped.
    pub fn broadcast_collection<'a, I, F>(
        &self,
        collection: &CollectionPath,
        sequence: Sequence,
        contents: F,
    )
    where
        F: Fn() -> I,
        I: IntoIterator<Item = &'a Document>,
    {
        let mut to_remove = Vec::new();

        {
            let feeds = self.feeds.read();
            for (id, feed) in feeds.iter() {
                if &feed.query.collection != collection {
                    continue;
                }
                let documents = feed.query.apply(contents());
                if !feed.try_send(FeedEventKind::Snapshot(Snapshot {
                    sequence,
                    documents,
                })) {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut feeds = self.feeds.write();
            for id in to_remove {
                if let Some(feed) = feeds.remove(&id) {
                    // Might fail if the buffer is still full; the consumer
                    // then observes a disconnect instead.
                    feed.notify_dropped(DropReason::BufferOverflow);
                }
            }
        }
    }

    /// Terminate every feed, e.g. on store shutdown.
    pub fn close_all(&self) {
        let drained: Vec<Feed> = self.feeds.write().drain().map(|(_, feed)| feed).collect();
        for feed in drained {
            feed.notify_dropped(DropReason::StoreClosed);
        }
    }
}

impl FeedCanceller for FeedManager {
    fn cancel_feed(&self, id: SubscriptionId) {
        self.unsubscribe(id);
    }
}
