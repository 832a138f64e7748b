//! Tie live stores to the signed-in identity.

use std::sync::Arc;

use tracing::debug;

use super::scope::{LedgerScope, TransactionScope};
use super::store::{LedgerStore, TransactionStore};
use crate::auth::SessionState;
use crate::remote::RemoteDataService;
use crate::types::DocumentId;

/// Something that listens on behalf of the signed-in user.
pub trait IdentityScoped {
    /// Start, or restart, for `uid`.
    fn on_identity(&mut self, uid: &DocumentId);

    /// Stop and clear everything held for the previous user.
    fn on_identity_lost(&mut self);
}

impl IdentityScoped for LedgerStore {
    fn on_identity(&mut self, uid: &DocumentId) {
        self.start_listening(LedgerScope::new(uid.as_str()));
    }

    fn on_identity_lost(&mut self) {
        self.stop_listening();
    }
}

/// A transaction store bound to one ledger, following the signed-in user.
pub struct LedgerTransactions {
    ledger_id: String,
    store: TransactionStore,
}

impl LedgerTransactions {
    pub fn new(remote: Arc<dyn RemoteDataService>, ledger_id: impl Into<String>) -> Self {
        Self {
            ledger_id: ledger_id.into(),
            store: TransactionStore::new(remote),
        }
    }

    pub fn ledger_id(&self) -> &str {
        &self.ledger_id
    }

    pub fn store(&self) -> &TransactionStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TransactionStore {
        &mut self.store
    }
}

impl IdentityScoped for LedgerTransactions {
    fn on_identity(&mut self, uid: &DocumentId) {
        self.store
            .start_listening(TransactionScope::new(uid.as_str(), self.ledger_id.as_str()));
    }

    fn on_identity_lost(&mut self) {
        self.store.stop_listening();
    }
}

/// Starts and stops a target as the session's identity changes.
///
/// The target is stopped when the coordinator is torn down or dropped.
pub struct LifecycleCoordinator<T: IdentityScoped> {
    target: T,
    identity: Option<DocumentId>,
}

impl<T: IdentityScoped> LifecycleCoordinator<T> {
    pub fn new(target: T) -> Self {
        Self {
            target,
            identity: None,
        }
    }

    /// React to the current session.
    ///
    /// Sessions that have not yet heard from the auth service are ignored.
    pub fn observe(&mut self, session: &SessionState) {
        if !session.initialized {
            return;
        }

        let next = session.user.as_ref().map(|user| &user.uid);
        if next == self.identity.as_ref() {
            return;
        }

        match next {
            Some(uid) => {
                debug!(uid = %uid, "Identity changed, starting");
                self.target.on_identity(uid);
            }
            None => {
                debug!("Identity lost, stopping");
                self.target.on_identity_lost();
            }
        }
        self.identity = next.cloned();
    }

    /// Stop the target unconditionally.
    pub fn teardown(&mut self) {
        self.target.on_identity_lost();
        self.identity = None;
    }

    pub fn identity(&self) -> Option<&DocumentId> {
        self.identity.as_ref()
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }
}

impl<T: IdentityScoped> Drop for LifecycleCoordinator<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl IdentityScoped for Recorder {
        fn on_identity(&mut self, uid: &DocumentId) {
            self.calls.push(format!("start {}", uid));
        }

        fn on_identity_lost(&mut self) {
            self.calls.push("stop".into());
        }
    }

    fn signed_in(uid: &str) -> SessionState {
        SessionState {
            user: Some(Identity {
                uid: DocumentId::parse(uid).unwrap(),
                email: format!("{uid}@example.com"),
                display_name: None,
            }),
            loading: false,
            error: None,
            initialized: true,
        }
    }

    fn signed_out() -> SessionState {
        SessionState {
            user: None,
            loading: false,
            error: None,
            initialized: true,
        }
    }

    #[test]
    fn test_uninitialized_session_is_ignored() {
        let mut coordinator = LifecycleCoordinator::new(Recorder::default());

        coordinator.observe(&SessionState::default());

        assert!(coordinator.target().calls.is_empty());
    }

    #[test]
    fn test_follows_identity_transitions() {
        let mut coordinator = LifecycleCoordinator::new(Recorder::default());

        coordinator.observe(&signed_out());
        coordinator.observe(&signed_in("a"));
        coordinator.observe(&signed_in("a"));
        coordinator.observe(&signed_in("b"));
        coordinator.observe(&signed_out());
        coordinator.observe(&signed_out());

        assert_eq!(
            coordinator.target().calls,
            vec!["start a", "start b", "stop"]
        );
        assert_eq!(coordinator.identity(), None);
    }

    #[test]
    fn test_teardown_always_stops() {
        let mut coordinator = LifecycleCoordinator::new(Recorder::default());
        coordinator.observe(&signed_in("a"));

        coordinator.teardown();

        assert_eq!(coordinator.target().calls, vec!["start a", "stop"]);
        assert_eq!(coordinator.identity(), None);
    }
}
