//! Collection state kept current by a single live feed.

use std::sync::Arc;

use crossbeam_channel::TryRecvError;
use tracing::{debug, info, warn};

use super::scope::{FeedScope, LedgerScope, TransactionScope};
use crate::balance::{aggregate, Balance};
use crate::model::decode_all;
use crate::remote::RemoteDataService;
use crate::subscriptions::{FeedError, FeedEvent, FeedEventKind, FeedHandle, SubscriptionId};
use crate::types::Sequence;

/// Where a live store is in its feed lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreStatus {
    /// No feed open.
    Idle,
    /// Feed open; first snapshot not yet applied.
    Pending,
    /// At least one snapshot applied.
    Live,
    /// The last feed failed; see [LiveStore::error].
    Failed,
}

struct ActiveFeed {
    handle: FeedHandle,
    /// Sequence of the last applied snapshot.
    applied: Option<Sequence>,
}

/// State for one live collection, fed by at most one feed at a time.
///
/// Events are applied only on the owner's thread through [LiveStore::pump]
/// (or [LiveStore::handle_event]). Every open replaces the previous feed,
/// and events tagged with any other subscription are discarded.
pub struct LiveStore<S: FeedScope> {
    remote: Arc<dyn RemoteDataService>,
    items: Vec<S::Item>,
    loading: bool,
    error: Option<FeedError>,
    /// The last scope listened to, kept after a failure for `retry`.
    scope: Option<S>,
    active: Option<ActiveFeed>,
    version: u64,
}

impl<S: FeedScope> LiveStore<S> {
    pub fn new(remote: Arc<dyn RemoteDataService>) -> Self {
        Self {
            remote,
            items: Vec::new(),
            loading: false,
            error: None,
            scope: None,
            active: None,
            version: 0,
        }
    }

    /// Open a feed for `scope`, replacing any current one.
    ///
    /// A scope with an empty identifier is ignored and leaves the store as
    /// it was.
    pub fn start_listening(&mut self, scope: S) {
        let query = match scope.query() {
            Ok(Some(query)) => query,
            Ok(None) => {
                debug!(?scope, "Scope incomplete, not listening");
                return;
            }
            Err(e) => {
                self.scope = Some(scope);
                self.fail(FeedError::Rejected(e.to_string()));
                return;
            }
        };

        self.cancel_active();
        self.items.clear();
        self.error = None;
        self.loading = true;

        match self.remote.subscribe(query) {
            Ok(handle) => {
                info!(subscription = handle.id().0, ?scope, "Listening");
                self.active = Some(ActiveFeed {
                    handle,
                    applied: None,
                });
            }
            Err(e) => {
                warn!(?scope, error = %e, "Feed refused");
                self.loading = false;
                self.error = Some(FeedError::Rejected(e.to_string()));
            }
        }
        self.scope = Some(scope);
        self.version += 1;
    }

    /// Cancel the current feed and clear all state. Safe to call repeatedly.
    pub fn stop_listening(&mut self) {
        let changed = self.active.is_some()
            || self.scope.is_some()
            || self.loading
            || self.error.is_some()
            || !self.items.is_empty();

        self.cancel_active();
        self.scope = None;
        self.items.clear();
        self.loading = false;
        self.error = None;

        if changed {
            self.version += 1;
        }
    }

    /// Reopen the last scope after a failed feed.
    ///
    /// Returns `false` if there is nothing to retry.
    pub fn retry(&mut self) -> bool {
        if self.active.is_some() || self.error.is_none() {
            return false;
        }
        match self.scope.clone() {
            Some(scope) => {
                debug!(?scope, "Retrying feed");
                self.start_listening(scope);
                true
            }
            None => false,
        }
    }

    /// Apply every pending event of the active feed. Returns how many
    /// events changed state.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let next = match &self.active {
                Some(active) => active.handle.try_recv(),
                None => return applied,
            };
            match next {
                Ok(event) => {
                    if self.handle_event(event) {
                        applied += 1;
                    }
                }
                Err(TryRecvError::Empty) => return applied,
                Err(TryRecvError::Disconnected) => {
                    self.fail(FeedError::Disconnected);
                    return applied + 1;
                }
            }
        }
    }

    /// Apply one event. Returns `false` if it was discarded as stale.
    pub fn handle_event(&mut self, event: FeedEvent) -> bool {
        let Some(active) = self.active.as_mut() else {
            debug!(subscription = event.subscription.0, "Discarding event, not listening");
            return false;
        };
        if event.subscription != active.handle.id() {
            debug!(
                subscription = event.subscription.0,
                active = active.handle.id().0,
                "Discarding stale event"
            );
            return false;
        }

        match event.kind {
            FeedEventKind::Snapshot(snapshot) => {
                if active.applied.is_some_and(|seq| snapshot.sequence < seq) {
                    debug!(sequence = snapshot.sequence.0, "Discarding out of order snapshot");
                    return false;
                }
                active.applied = Some(snapshot.sequence);
                self.items = decode_all(&active.handle.query().collection, &snapshot.documents);
                self.loading = false;
                self.version += 1;
                true
            }
            FeedEventKind::Dropped { reason } => {
                self.fail(FeedError::Dropped(reason));
                true
            }
        }
    }

    fn cancel_active(&mut self) {
        if let Some(mut active) = self.active.take() {
            debug!(subscription = active.handle.id().0, "Cancelling feed");
            active.handle.cancel();
        }
    }

    fn fail(&mut self, error: FeedError) {
        warn!(error = %error, "Feed failed");
        self.cancel_active();
        self.items.clear();
        self.loading = false;
        self.error = Some(error);
        self.version += 1;
    }

    /// The latest snapshot, decoded and in query order.
    pub fn items(&self) -> &[S::Item] {
        &self.items
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&FeedError> {
        self.error.as_ref()
    }

    pub fn status(&self) -> StoreStatus {
        match &self.active {
            Some(active) if active.applied.is_some() => StoreStatus::Live,
            Some(_) => StoreStatus::Pending,
            None if self.error.is_some() => StoreStatus::Failed,
            None => StoreStatus::Idle,
        }
    }

    pub fn scope(&self) -> Option<&S> {
        self.scope.as_ref()
    }

    pub fn active_subscription(&self) -> Option<SubscriptionId> {
        self.active.as_ref().map(|active| active.handle.id())
    }

    /// Incremented on every state change.
    pub fn version(&self) -> u64 {
        self.version
    }
}

pub type LedgerStore = LiveStore<LedgerScope>;
pub type TransactionStore = LiveStore<TransactionScope>;

impl LiveStore<TransactionScope> {
    /// Totals over the current snapshot.
    pub fn balance(&self) -> Balance {
        aggregate(&self.items)
    }
}
