//! # Ledgerbook
//!
//! Per-user ledgers of credit and debit transactions over a hierarchical
//! document store with live, ordered collection feeds.
//!
//! ## Core Concepts
//!
//! - **Documents**: Field maps at `users/{uid}/ledgers/{id}` and
//!   `users/{uid}/ledgers/{id}/transactions/{id}`
//! - **Feeds**: Full-collection snapshots pushed after every write
//! - **Live stores**: Owner-thread state fed by at most one feed each
//! - **Sessions**: Identity changes that start and stop live stores
//!
//! ## Example
//!
//! ```ignore
//! use ledgerbook::{DocumentStore, LedgerStore, LedgerScope, LedgerService, LedgerDraft};
//!
//! let store = Arc::new(DocumentStore::in_memory());
//! let ledgers = LedgerService::new(store.clone());
//! let mut live = LedgerStore::new(store.clone());
//!
//! live.start_listening(LedgerScope::new(uid.as_str()));
//! ledgers.create_ledger(&uid, &LedgerDraft::new("Wallet", LedgerCategory::Personal))?;
//!
//! live.pump();
//! assert_eq!(live.items()[0].name, "Wallet");
//! ```

pub mod auth;
pub mod balance;
pub mod error;
pub mod live;
pub mod log;
pub mod model;
pub mod remote;
pub mod services;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use auth::{
    AuthConfig, AuthError, AuthService, Identity, LocalAuth, PasswordHash, SessionState,
    SessionStore, UserProfile,
};
pub use balance::{aggregate, format_amount, Balance, BalanceDisplay};
pub use error::{Result, ServiceError, StoreError, ValidationError};
pub use live::{
    FeedScope, IdentityScoped, LedgerScope, LedgerStore, LedgerTransactions,
    LifecycleCoordinator, LiveStore, StoreStatus, TransactionScope, TransactionStore,
};
pub use log::{LogEntry, Mutation, MutationLog};
pub use model::{
    DecodeError, Direction, FromDocument, Ledger, LedgerCategory, LedgerDraft, Transaction,
    TransactionDraft, MAX_AMOUNT,
};
pub use remote::RemoteDataService;
pub use services::{LedgerService, LedgerStatistics, TransactionService};
pub use store::{DocumentStore, StoreConfig};
pub use subscriptions::{
    DropReason, FeedConfig, FeedError, FeedEvent, FeedEventKind, FeedHandle, FeedManager,
    Snapshot, SubscriptionId,
};
pub use types::*;
