//! Reactive collection state driven by live feeds.
//!
//! A [LiveStore] holds the latest snapshot of one scoped query and owns at
//! most one [FeedHandle](crate::subscriptions::FeedHandle). The
//! [LifecycleCoordinator] starts and stops stores as the signed-in user
//! changes.

mod coordinator;
mod scope;
mod store;

pub use coordinator::{IdentityScoped, LedgerTransactions, LifecycleCoordinator};
pub use scope::{FeedScope, LedgerScope, TransactionScope};
pub use store::{LedgerStore, LiveStore, StoreStatus, TransactionStore};
