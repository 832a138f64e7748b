//! Validated create, update, delete and one-shot reads over a
//! [RemoteDataService](crate::RemoteDataService).
//!
//! Layout:
//! - `users/{uid}/ledgers`
//! - `users/{uid}/ledgers/{ledgerId}/transactions`

mod ledgers;
mod transactions;

pub use ledgers::LedgerService;
pub use transactions::{LedgerStatistics, TransactionService};

use crate::auth::USERS_COLLECTION;
use crate::error::Result;
use crate::types::{CollectionPath, DocumentId, Query, SortDirection, SortKey};

pub const LEDGERS_COLLECTION: &str = "ledgers";
pub const TRANSACTIONS_COLLECTION: &str = "transactions";

/// Transactions are ordered by this field.
pub const DATE_FIELD: &str = "date";

/// `users/{uid}/ledgers`
pub fn ledgers_path(uid: &DocumentId) -> Result<CollectionPath> {
    CollectionPath::root(USERS_COLLECTION)?
        .doc(uid)
        .collection(LEDGERS_COLLECTION)
}

/// `users/{uid}/ledgers/{ledgerId}/transactions`
pub fn transactions_path(uid: &DocumentId, ledger_id: &DocumentId) -> Result<CollectionPath> {
    ledgers_path(uid)?
        .doc(ledger_id)
        .collection(TRANSACTIONS_COLLECTION)
}

/// A user's ledgers, newest first.
pub fn ledger_query(uid: &DocumentId) -> Result<Query> {
    Ok(Query::new(
        ledgers_path(uid)?,
        SortKey::CreateTime,
        SortDirection::Descending,
    ))
}

/// A ledger's transactions, latest date first.
pub fn transaction_query(uid: &DocumentId, ledger_id: &DocumentId) -> Result<Query> {
    Ok(Query::new(
        transactions_path(uid, ledger_id)?,
        SortKey::field(DATE_FIELD),
        SortDirection::Descending,
    ))
}
