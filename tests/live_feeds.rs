//! Live store behavior against a counting data service.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ledgerbook::{
    CollectionPath, Document, DocumentId, DocumentPath, DocumentStore, FeedConfig, FeedError,
    FeedHandle, Fields, LedgerCategory, LedgerDraft, LedgerScope, LedgerService, LedgerStore,
    Query, RemoteDataService, Result, StoreConfig, StoreStatus,
};
use proptest::prelude::*;

/// Delegates to an in-memory store and counts feed opens.
struct CountingRemote {
    inner: DocumentStore,
    subscribes: AtomicUsize,
}

impl CountingRemote {
    fn new() -> Arc<Self> {
        Self::with_store(DocumentStore::in_memory())
    }

    fn with_store(inner: DocumentStore) -> Arc<Self> {
        Arc::new(Self {
            inner,
            subscribes: AtomicUsize::new(0),
        })
    }

    fn subscribe_calls(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    fn open_feeds(&self) -> usize {
        self.inner.feed_count()
    }
}

impl RemoteDataService for CountingRemote {
    fn subscribe(&self, query: Query) -> Result<FeedHandle> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        self.inner.subscribe(query)
    }

    fn fetch_once(&self, query: &Query) -> Result<Vec<Document>> {
        self.inner.fetch_once(query)
    }

    fn get(&self, path: &DocumentPath) -> Result<Option<Document>> {
        self.inner.get(path)
    }

    fn create(&self, collection: &CollectionPath, fields: Fields) -> Result<DocumentId> {
        self.inner.create_document(collection, fields)
    }

    fn set(&self, path: &DocumentPath, fields: Fields, merge: bool) -> Result<()> {
        self.inner.set(path, fields, merge)
    }

    fn update(&self, path: &DocumentPath, fields: Fields) -> Result<()> {
        self.inner.update(path, fields)
    }

    fn delete(&self, path: &DocumentPath) -> Result<()> {
        self.inner.delete(path)
    }
}

fn uid(raw: &str) -> DocumentId {
    DocumentId::parse(raw).unwrap()
}

fn add_ledger(service: &LedgerService, user: &str, name: &str) -> DocumentId {
    service
        .create_ledger(&uid(user), &LedgerDraft::new(name, LedgerCategory::Personal))
        .unwrap()
}

// --- Handle Lifecycle ---

#[test]
fn test_restart_keeps_one_feed_open() {
    let remote = CountingRemote::new();
    let mut live = LedgerStore::new(remote.clone());

    live.start_listening(LedgerScope::new("u1"));
    live.start_listening(LedgerScope::new("u2"));
    live.start_listening(LedgerScope::new("u2"));

    assert_eq!(remote.subscribe_calls(), 3);
    assert_eq!(remote.open_feeds(), 1);

    live.stop_listening();
    assert_eq!(remote.open_feeds(), 0);
}

#[test]
fn test_second_scope_wins() {
    let remote = CountingRemote::new();
    let service = LedgerService::new(remote.clone());
    add_ledger(&service, "u1", "First user's");
    add_ledger(&service, "u2", "Second user's");
    let mut live = LedgerStore::new(remote.clone());

    live.start_listening(LedgerScope::new("u1"));
    let first = live.active_subscription().unwrap();
    live.start_listening(LedgerScope::new("u2"));
    let second = live.active_subscription().unwrap();
    live.pump();

    assert!(second > first);
    assert_eq!(live.scope(), Some(&LedgerScope::new("u2")));
    assert_eq!(live.items().len(), 1);
    assert_eq!(live.items()[0].name, "Second user's");

    // Writes to the first scope no longer reach the store.
    add_ledger(&service, "u1", "Late");
    assert_eq!(live.pump(), 0);
    assert_eq!(live.items()[0].name, "Second user's");
}

#[test]
fn test_stopped_feed_cannot_change_state() {
    let remote = CountingRemote::new();
    let service = LedgerService::new(remote.clone());
    let mut live = LedgerStore::new(remote.clone());
    live.start_listening(LedgerScope::new("u1"));
    live.pump();

    live.stop_listening();
    let version = live.version();
    add_ledger(&service, "u1", "After stop");

    assert_eq!(live.pump(), 0);
    assert!(live.items().is_empty());
    assert_eq!(live.status(), StoreStatus::Idle);
    assert_eq!(live.version(), version);
}

#[test]
fn test_empty_user_does_not_subscribe() {
    let remote = CountingRemote::new();
    let mut live = LedgerStore::new(remote.clone());

    live.start_listening(LedgerScope::new(""));

    assert_eq!(remote.subscribe_calls(), 0);
    assert_eq!(live.status(), StoreStatus::Idle);
}

#[test]
fn test_dropping_store_cancels_feed() {
    let remote = CountingRemote::new();
    {
        let mut live = LedgerStore::new(remote.clone());
        live.start_listening(LedgerScope::new("u1"));
        assert_eq!(remote.open_feeds(), 1);
    }
    assert_eq!(remote.open_feeds(), 0);
}

// --- Failure Semantics ---

#[test]
fn test_slow_consumer_is_dropped() {
    let store = DocumentStore::open_or_create(StoreConfig {
        feed: FeedConfig { buffer_size: 2 },
        ..Default::default()
    })
    .unwrap();
    let remote = CountingRemote::with_store(store);
    let service = LedgerService::new(remote.clone());
    let mut live = LedgerStore::new(remote.clone());
    live.start_listening(LedgerScope::new("u1"));

    // Initial snapshot plus one write fill the buffer; the next overflows.
    add_ledger(&service, "u1", "One");
    add_ledger(&service, "u1", "Two");
    assert_eq!(remote.open_feeds(), 0);

    live.pump();

    assert_eq!(live.status(), StoreStatus::Failed);
    assert_eq!(live.error(), Some(&FeedError::Disconnected));
    assert!(live.items().is_empty());
    assert!(!live.is_loading());

    assert!(live.retry());
    live.pump();
    assert_eq!(live.status(), StoreStatus::Live);
    assert_eq!(live.items().len(), 2);
}

// --- Properties ---

#[derive(Clone, Debug)]
enum Op {
    Start(u8),
    Stop,
    Write(u8),
    Pump,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..3).prop_map(Op::Start),
        Just(Op::Stop),
        (0u8..3).prop_map(Op::Write),
        Just(Op::Pump),
    ]
}

proptest! {
    #[test]
    fn prop_at_most_one_active_feed(ops in proptest::collection::vec(op(), 1..40)) {
        let remote = CountingRemote::new();
        let service = LedgerService::new(remote.clone());
        let mut live = LedgerStore::new(remote.clone());
        let mut starts = 0;

        for op in ops {
            match op {
                Op::Start(user) => {
                    live.start_listening(LedgerScope::new(format!("u{user}")));
                    starts += 1;
                }
                Op::Stop => live.stop_listening(),
                Op::Write(user) => {
                    add_ledger(&service, &format!("u{user}"), "Ledger");
                }
                Op::Pump => {
                    live.pump();
                }
            }

            prop_assert!(remote.open_feeds() <= 1);
            prop_assert_eq!(remote.open_feeds(), live.active_subscription().is_some() as usize);
        }

        prop_assert_eq!(remote.subscribe_calls(), starts);
    }
}
