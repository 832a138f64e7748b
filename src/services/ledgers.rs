//! Ledger writes and one-shot reads.

use std::sync::Arc;

use tracing::info;

use super::{ledger_query, ledgers_path};
use crate::error::ServiceError;
use crate::model::{decode_all, Ledger, LedgerDraft};
use crate::remote::RemoteDataService;
use crate::types::DocumentId;

pub struct LedgerService {
    remote: Arc<dyn RemoteDataService>,
}

impl LedgerService {
    pub fn new(remote: Arc<dyn RemoteDataService>) -> Self {
        Self { remote }
    }

    /// Validate `draft` and store it as a new ledger.
    pub fn create_ledger(
        &self,
        uid: &DocumentId,
        draft: &LedgerDraft,
    ) -> Result<DocumentId, ServiceError> {
        let draft = draft.validate()?;
        let id = self.remote.create(&ledgers_path(uid)?, draft.to_fields())?;
        info!(ledger = %id, "Ledger created");
        Ok(id)
    }

    pub fn update_ledger(
        &self,
        uid: &DocumentId,
        ledger_id: &DocumentId,
        draft: &LedgerDraft,
    ) -> Result<(), ServiceError> {
        let draft = draft.validate()?;
        let path = ledgers_path(uid)?.doc(ledger_id);
        self.remote.update(&path, draft.to_fields())?;
        Ok(())
    }

    /// Delete the ledger document only.
    ///
    /// Its transactions stay in `users/{uid}/ledgers/{ledgerId}/transactions`
    /// and have to be removed separately.
    pub fn delete_ledger(
        &self,
        uid: &DocumentId,
        ledger_id: &DocumentId,
    ) -> Result<(), ServiceError> {
        self.remote.delete(&ledgers_path(uid)?.doc(ledger_id))?;
        info!(ledger = %ledger_id, "Ledger deleted");
        Ok(())
    }

    /// The user's ledgers, newest first.
    pub fn fetch_ledgers_once(&self, uid: &DocumentId) -> Result<Vec<Ledger>, ServiceError> {
        let query = ledger_query(uid)?;
        let docs = self.remote.fetch_once(&query)?;
        Ok(decode_all(&query.collection, &docs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::model::LedgerCategory;
    use crate::store::DocumentStore;

    fn service() -> (Arc<DocumentStore>, LedgerService) {
        let store = Arc::new(DocumentStore::in_memory());
        (store.clone(), LedgerService::new(store))
    }

    fn uid() -> DocumentId {
        DocumentId::parse("u1").unwrap()
    }

    #[test]
    fn test_create_then_fetch_newest_first() {
        let (_store, service) = service();
        service
            .create_ledger(&uid(), &LedgerDraft::new("Wallet", LedgerCategory::Personal))
            .unwrap();
        service
            .create_ledger(&uid(), &LedgerDraft::new(" Shop ", LedgerCategory::Business))
            .unwrap();

        let ledgers = service.fetch_ledgers_once(&uid()).unwrap();

        let names: Vec<_> = ledgers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Shop", "Wallet"]);
    }

    #[test]
    fn test_invalid_draft_never_reaches_store() {
        let (store, service) = service();
        let head = store.head();

        let result =
            service.create_ledger(&uid(), &LedgerDraft::new("", LedgerCategory::Personal));

        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert_eq!(store.head(), head);
    }

    #[test]
    fn test_update_and_delete() {
        let (_store, service) = service();
        let id = service
            .create_ledger(&uid(), &LedgerDraft::new("Wallet", LedgerCategory::Personal))
            .unwrap();

        service
            .update_ledger(&uid(), &id, &LedgerDraft::new("Savings", LedgerCategory::Personal))
            .unwrap();
        assert_eq!(service.fetch_ledgers_once(&uid()).unwrap()[0].name, "Savings");

        service.delete_ledger(&uid(), &id).unwrap();
        assert!(service.fetch_ledgers_once(&uid()).unwrap().is_empty());
    }

    #[test]
    fn test_update_missing_ledger_fails() {
        let (_store, service) = service();
        let missing = DocumentId::parse("nope").unwrap();

        let result = service.update_ledger(
            &uid(),
            &missing,
            &LedgerDraft::new("Wallet", LedgerCategory::Personal),
        );

        assert!(matches!(
            result,
            Err(ServiceError::Store(StoreError::DocumentNotFound(_)))
        ));
    }
}
