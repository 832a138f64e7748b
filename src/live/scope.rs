//! What a live store listens to.

use std::fmt;

use crate::error::Result;
use crate::model::{FromDocument, Ledger, Transaction};
use crate::services::{ledger_query, transaction_query};
use crate::types::{DocumentId, Query};

/// What a live store is listening to.
pub trait FeedScope: Clone + PartialEq + fmt::Debug {
    /// Entity each document in the feed decodes to.
    type Item: FromDocument;

    /// The query to subscribe with, or `None` if an identifier is empty
    /// and there is nothing to listen to yet.
    fn query(&self) -> Result<Option<Query>>;
}

/// All ledgers of one user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerScope {
    pub user_id: String,
}

impl LedgerScope {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

impl FeedScope for LedgerScope {
    type Item = Ledger;

    fn query(&self) -> Result<Option<Query>> {
        if self.user_id.is_empty() {
            return Ok(None);
        }
        let uid = DocumentId::parse(self.user_id.as_str())?;
        ledger_query(&uid).map(Some)
    }
}

/// The transactions of one ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionScope {
    pub user_id: String,
    pub ledger_id: String,
}

impl TransactionScope {
    pub fn new(user_id: impl Into<String>, ledger_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ledger_id: ledger_id.into(),
        }
    }
}

impl FeedScope for TransactionScope {
    type Item = Transaction;

    fn query(&self) -> Result<Option<Query>> {
        if self.user_id.is_empty() || self.ledger_id.is_empty() {
            return Ok(None);
        }
        let uid = DocumentId::parse(self.user_id.as_str())?;
        let lid = DocumentId::parse(self.ledger_id.as_str())?;
        transaction_query(&uid, &lid).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SortDirection, SortKey};

    #[test]
    fn test_empty_ids_have_no_query() {
        assert_eq!(LedgerScope::new("").query().unwrap(), None);
        assert_eq!(TransactionScope::new("u1", "").query().unwrap(), None);
        assert_eq!(TransactionScope::new("", "l1").query().unwrap(), None);
    }

    #[test]
    fn test_scope_queries() {
        let ledgers = LedgerScope::new("u1").query().unwrap().unwrap();
        assert_eq!(ledgers.collection.to_string(), "users/u1/ledgers");
        assert_eq!(ledgers.order_by, SortKey::CreateTime);
        assert_eq!(ledgers.direction, SortDirection::Descending);

        let txns = TransactionScope::new("u1", "l1").query().unwrap().unwrap();
        assert_eq!(txns.collection.to_string(), "users/u1/ledgers/l1/transactions");
        assert_eq!(txns.order_by, SortKey::field("date"));
    }

    #[test]
    fn test_malformed_id_is_an_error() {
        assert!(LedgerScope::new("a/b").query().is_err());
    }
}
