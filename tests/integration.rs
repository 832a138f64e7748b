//! End-to-end workflows: sign up, ledgers, transactions and balances.

use std::sync::Arc;

use ledgerbook::{
    AuthConfig, AuthService, Direction, DocumentStore, LedgerCategory, LedgerDraft, LedgerService,
    LedgerStore, LedgerTransactions, LifecycleCoordinator, LocalAuth, SessionStore, StoreStatus,
    TransactionDraft, TransactionService,
};
use rust_decimal::Decimal;
use time::macros::date;

struct App {
    store: Arc<DocumentStore>,
    auth: Arc<LocalAuth>,
    session: SessionStore,
    ledgers: LedgerService,
    transactions: TransactionService,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn app() -> App {
    init_tracing();
    let store = Arc::new(DocumentStore::in_memory());
    let auth = Arc::new(LocalAuth::new(
        store.clone(),
        AuthConfig {
            bcrypt_cost: 4,
            ..Default::default()
        },
    ));
    App {
        session: SessionStore::new(auth.clone()),
        ledgers: LedgerService::new(store.clone()),
        transactions: TransactionService::new(store.clone()),
        auth,
        store,
    }
}

fn credit(amount: i64) -> TransactionDraft {
    TransactionDraft::new(Decimal::from(amount), Direction::Credit, date!(2024 - 05 - 01))
}

fn debit(amount: i64) -> TransactionDraft {
    TransactionDraft::new(Decimal::from(amount), Direction::Debit, date!(2024 - 05 - 02))
}

// --- Realistic Workflow Tests ---

#[test]
fn test_sign_up_to_balance() {
    let mut app = app();
    let mut ledger_view = LifecycleCoordinator::new(LedgerStore::new(app.store.clone()));

    app.session.pump();
    ledger_view.observe(app.session.state());
    assert_eq!(ledger_view.target().status(), StoreStatus::Idle);

    let identity = app.auth.sign_up("sam@example.com", "secret1", "Sam").unwrap();
    app.session.pump();
    ledger_view.observe(app.session.state());
    ledger_view.target_mut().pump();
    assert_eq!(ledger_view.target().status(), StoreStatus::Live);
    assert!(ledger_view.target().items().is_empty());

    let lid = app
        .ledgers
        .create_ledger(&identity.uid, &LedgerDraft::new("Wallet", LedgerCategory::Personal))
        .unwrap();
    ledger_view.target_mut().pump();
    assert_eq!(ledger_view.target().items()[0].id, lid);

    let mut detail = LifecycleCoordinator::new(LedgerTransactions::new(
        app.store.clone(),
        lid.as_str(),
    ));
    detail.observe(app.session.state());
    detail.target_mut().store_mut().pump();
    assert_eq!(detail.target().store().balance().display().balance, "0.00");

    app.transactions
        .create_transaction(&identity.uid, &lid, &credit(100))
        .unwrap();
    app.transactions
        .create_transaction(&identity.uid, &lid, &debit(40))
        .unwrap();
    detail.target_mut().store_mut().pump();

    let txns = detail.target().store().items();
    assert_eq!(txns.len(), 2);
    // Latest date first.
    assert_eq!(txns[0].direction, Direction::Debit);

    let shown = detail.target().store().balance().display();
    assert_eq!(shown.credit, "100.00");
    assert_eq!(shown.debit, "40.00");
    assert_eq!(shown.balance, "60.00");
}

#[test]
fn test_sign_out_clears_views() {
    let mut app = app();
    let identity = app.auth.sign_up("sam@example.com", "secret1", "").unwrap();
    app.ledgers
        .create_ledger(&identity.uid, &LedgerDraft::new("Wallet", LedgerCategory::Personal))
        .unwrap();

    let mut ledger_view = LifecycleCoordinator::new(LedgerStore::new(app.store.clone()));
    app.session.pump();
    ledger_view.observe(app.session.state());
    ledger_view.target_mut().pump();
    assert_eq!(ledger_view.target().items().len(), 1);
    assert_eq!(app.store.feed_count(), 1);

    app.session.logout();
    ledger_view.observe(app.session.state());

    assert!(ledger_view.target().items().is_empty());
    assert_eq!(ledger_view.target().status(), StoreStatus::Idle);
    assert_eq!(app.store.feed_count(), 0);
}

#[test]
fn test_switching_users_shows_only_new_users_ledgers() {
    let mut app = app();
    let ana = app.auth.sign_up("ana@example.com", "secret1", "").unwrap();
    app.ledgers
        .create_ledger(&ana.uid, &LedgerDraft::new("Ana's", LedgerCategory::Personal))
        .unwrap();
    let ben = app.auth.sign_up("ben@example.com", "secret2", "").unwrap();
    app.ledgers
        .create_ledger(&ben.uid, &LedgerDraft::new("Ben's", LedgerCategory::Business))
        .unwrap();

    let mut ledger_view = LifecycleCoordinator::new(LedgerStore::new(app.store.clone()));
    app.auth.sign_in("ana@example.com", "secret1").unwrap();

    // Every queued identity change is applied before the view observes.
    app.session.pump();
    ledger_view.observe(app.session.state());
    ledger_view.target_mut().pump();
    assert_eq!(ledger_view.target().items()[0].name, "Ana's");

    app.auth.sign_in("ben@example.com", "secret2").unwrap();
    app.session.pump();
    ledger_view.observe(app.session.state());
    ledger_view.target_mut().pump();

    let names: Vec<_> = ledger_view
        .target()
        .items()
        .iter()
        .map(|l| l.name.as_str())
        .collect();
    assert_eq!(names, vec!["Ben's"]);
    assert_eq!(app.store.feed_count(), 1);
}

#[test]
fn test_deleting_ledger_leaves_transactions() {
    let app = app();
    let identity = app.auth.sign_up("sam@example.com", "secret1", "").unwrap();
    let lid = app
        .ledgers
        .create_ledger(&identity.uid, &LedgerDraft::new("Wallet", LedgerCategory::Personal))
        .unwrap();
    app.transactions
        .create_transaction(&identity.uid, &lid, &credit(5))
        .unwrap();
    app.transactions
        .create_transaction(&identity.uid, &lid, &debit(2))
        .unwrap();

    app.ledgers.delete_ledger(&identity.uid, &lid).unwrap();

    assert!(app.ledgers.fetch_ledgers_once(&identity.uid).unwrap().is_empty());
    let orphans = app
        .transactions
        .fetch_transactions_once(&identity.uid, &lid)
        .unwrap();
    assert_eq!(orphans.len(), 2);
}

#[test]
fn test_dropping_coordinator_stops_feed() {
    let mut app = app();
    app.auth.sign_up("sam@example.com", "secret1", "").unwrap();
    app.session.pump();

    {
        let mut ledger_view = LifecycleCoordinator::new(LedgerStore::new(app.store.clone()));
        ledger_view.observe(app.session.state());
        assert_eq!(app.store.feed_count(), 1);
    }

    assert_eq!(app.store.feed_count(), 0);
}
