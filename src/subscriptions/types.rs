//! Subscription types for live collection feeds.

use crate::types::{Document, Query, Sequence};
use serde::{Deserialize, Serialize};
use std::sync::Weak;
use thiserror::Error;

/// Configuration for live feeds.
#[derive(Clone, Debug)]
pub struct FeedConfig {
    /// Max queued snapshots before dropping the subscriber.
    /// Default: 64
    pub buffer_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { buffer_size: 64 }
    }
}

/// Unique identifier for a subscription. Never reused within one manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

/// The full ordered contents of a queried collection at one point in time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Store sequence this snapshot reflects.
    pub sequence: Sequence,
    pub documents: Vec<Document>,
}

/// An event delivered on a feed, tagged with the feed it belongs to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedEvent {
    pub subscription: SubscriptionId,
    pub kind: FeedEventKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEventKind {
    /// Replacement contents of the collection.
    Snapshot(Snapshot),

    /// The feed was terminated by the producer.
    Dropped { reason: DropReason },
}

/// Why a feed was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
    /// The store shut down.
    StoreClosed,
}

/// Live-feed failure as seen by a consumer.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("Feed dropped: {0:?}")]
    Dropped(DropReason),

    #[error("Feed disconnected")]
    Disconnected,

    #[error("Feed rejected: {0}")]
    Rejected(String),
}

/// Something that can tear down a feed by id.
pub trait FeedCanceller: Send + Sync {
    /// Unregister the feed. Must be idempotent.
    fn cancel_feed(&self, id: SubscriptionId);
}

/// Handle to one open feed.
///
/// Cancelling (explicitly or by dropping the handle) unregisters the feed
/// at its producer immediately, so no event is produced for it afterwards.
pub struct FeedHandle {
    id: SubscriptionId,
    query: Query,
    receiver: crossbeam_channel::Receiver<FeedEvent>,
    canceller: Option<Weak<dyn FeedCanceller>>,
}

impl FeedHandle {
    pub fn new(
        id: SubscriptionId,
        query: Query,
        receiver: crossbeam_channel::Receiver<FeedEvent>,
        canceller: Weak<dyn FeedCanceller>,
    ) -> Self {
        Self {
            id,
            query,
            receiver,
            canceller: Some(canceller),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Whether `cancel` has run.
    pub fn is_cancelled(&self) -> bool {
        self.canceller.is_none()
    }

    /// Cancel the feed. Safe to call more than once.
    pub fn cancel(&mut self) {
        if let Some(canceller) = self.canceller.take() {
            if let Some(canceller) = canceller.upgrade() {
                canceller.cancel_feed(self.id);
            }
        }
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<FeedEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<FeedEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for FeedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedHandle")
            .field("id", &self.id)
            .field("query", &self.query)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
