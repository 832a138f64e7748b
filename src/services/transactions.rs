//! Transaction writes, reads and per-ledger statistics.

use std::sync::Arc;

use tracing::{debug, info};

use super::{transaction_query, transactions_path};
use crate::balance::{aggregate, Balance};
use crate::error::ServiceError;
use crate::model::{decode_all, Ledger, Transaction, TransactionDraft};
use crate::remote::RemoteDataService;
use crate::types::DocumentId;

/// Totals for one ledger on the dashboard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerStatistics {
    pub ledger_id: DocumentId,
    pub transaction_count: usize,
    pub balance: Balance,
}

pub struct TransactionService {
    remote: Arc<dyn RemoteDataService>,
}

impl TransactionService {
    pub fn new(remote: Arc<dyn RemoteDataService>) -> Self {
        Self { remote }
    }

    pub fn create_transaction(
        &self,
        uid: &DocumentId,
        ledger_id: &DocumentId,
        draft: &TransactionDraft,
    ) -> Result<DocumentId, ServiceError> {
        let draft = draft.validate()?;
        let collection = transactions_path(uid, ledger_id)?;
        let id = self.remote.create(&collection, draft.to_fields()?)?;
        debug!(ledger = %ledger_id, transaction = %id, "Transaction created");
        Ok(id)
    }

    pub fn update_transaction(
        &self,
        uid: &DocumentId,
        ledger_id: &DocumentId,
        txn_id: &DocumentId,
        draft: &TransactionDraft,
    ) -> Result<(), ServiceError> {
        let draft = draft.validate()?;
        let path = transactions_path(uid, ledger_id)?.doc(txn_id);
        self.remote.update(&path, draft.to_fields()?)?;
        Ok(())
    }

    pub fn delete_transaction(
        &self,
        uid: &DocumentId,
        ledger_id: &DocumentId,
        txn_id: &DocumentId,
    ) -> Result<(), ServiceError> {
        let path = transactions_path(uid, ledger_id)?.doc(txn_id);
        self.remote.delete(&path)?;
        Ok(())
    }

    /// A ledger's transactions, latest date first.
    pub fn fetch_transactions_once(
        &self,
        uid: &DocumentId,
        ledger_id: &DocumentId,
    ) -> Result<Vec<Transaction>, ServiceError> {
        let query = transaction_query(uid, ledger_id)?;
        let docs = self.remote.fetch_once(&query)?;
        Ok(decode_all(&query.collection, &docs))
    }

    /// Per-ledger totals from one fetch of each ledger's transactions.
    pub fn ledger_statistics(
        &self,
        uid: &DocumentId,
        ledgers: &[Ledger],
    ) -> Result<Vec<LedgerStatistics>, ServiceError> {
        let stats = ledgers
            .iter()
            .map(|ledger| {
                let txns = self.fetch_transactions_once(uid, &ledger.id)?;
                Ok(LedgerStatistics {
                    ledger_id: ledger.id.clone(),
                    transaction_count: txns.len(),
                    balance: aggregate(&txns),
                })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        info!(ledgers = stats.len(), "Computed ledger statistics");
        Ok(stats)
    }
}
