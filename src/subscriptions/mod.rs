//! Live collection feeds.
//!
//! A feed watches one ordered query. Every write to the queried collection
//! pushes the complete, re-ordered collection to the feed as a
//! [`Snapshot`]; consumers never receive incremental patches.
//!
//! Feeds support:
//! - An initial snapshot queued at subscribe time
//! - Cancellation through [`FeedHandle::cancel`] or by dropping the handle
//! - Bounded buffers with slow-subscriber dropping
//!
//! # Example
//!
//! ```ignore
//! let mut handle = store.subscribe(query)?;
//!
//! loop {
//!     match handle.try_recv() {
//!         Ok(FeedEvent { kind: FeedEventKind::Snapshot(s), .. }) => render(&s.documents),
//!         Ok(FeedEvent { kind: FeedEventKind::Dropped { reason }, .. }) => break,
//!         Err(_) => break,
//!     }
//! }
//! handle.cancel();
//! ```

mod manager;
mod types;

pub use manager::FeedManager;
pub use types::{
    DropReason, FeedCanceller, FeedConfig, FeedError, FeedEvent, FeedEventKind, FeedHandle,
    Snapshot, SubscriptionId,
};
