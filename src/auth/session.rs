//! Session state derived from identity changes.

use std::sync::Arc;

use crossbeam_channel::{Receiver, TryRecvError};
use tracing::{debug, warn};

use super::service::{AuthService, Identity};
use crate::types::DocumentId;

/// What the rest of the app knows about the signed-in user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionState {
    pub user: Option<Identity>,
    /// True until the first identity is observed, and while signing out.
    pub loading: bool,
    pub error: Option<String>,
    /// Set once the auth service has reported an identity (or none).
    pub initialized: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            loading: true,
            error: None,
            initialized: false,
        }
    }
}

/// Session state fed by an [AuthService]'s identity stream.
///
/// Changes are applied on the owner's thread by [SessionStore::pump].
pub struct SessionStore {
    auth: Arc<dyn AuthService>,
    changes: Option<Receiver<Option<Identity>>>,
    state: SessionState,
    version: u64,
}

impl SessionStore {
    /// Start observing `auth`. Nothing is applied until the first `pump`.
    pub fn new(auth: Arc<dyn AuthService>) -> Self {
        let changes = Some(auth.identity_changes());
        Self {
            auth,
            changes,
            state: SessionState::default(),
            version: 0,
        }
    }

    /// Apply every pending identity change. Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let next = match &self.changes {
                Some(rx) => rx.try_recv(),
                None => return applied,
            };
            match next {
                Ok(identity) => {
                    self.set_user(identity);
                    applied += 1;
                }
                Err(TryRecvError::Empty) => return applied,
                Err(TryRecvError::Disconnected) => {
                    warn!("Identity stream closed");
                    self.changes = None;
                    self.state.user = None;
                    self.state.loading = false;
                    self.state.initialized = true;
                    self.state.error = Some("Authentication error occurred".into());
                    self.version += 1;
                    return applied + 1;
                }
            }
        }
    }

    pub fn set_user(&mut self, user: Option<Identity>) {
        debug!(signed_in = user.is_some(), "Session user changed");
        self.state.user = user;
        self.state.loading = false;
        self.state.error = None;
        self.state.initialized = true;
        self.version += 1;
    }

    /// Sign out through the auth service.
    ///
    /// The user is cleared right away; the matching identity change that
    /// arrives later is a no-op.
    pub fn logout(&mut self) {
        self.state.loading = true;
        self.version += 1;

        match self.auth.sign_out() {
            Ok(()) => self.set_user(None),
            Err(e) => {
                self.state.loading = false;
                self.state.error = Some(e.to_string());
                self.version += 1;
            }
        }
    }

    pub fn clear_error(&mut self) {
        if self.state.error.take().is_some() {
            self.version += 1;
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.user.is_some()
    }

    pub fn user_id(&self) -> Option<&DocumentId> {
        self.state.user.as_ref().map(|u| &u.uid)
    }

    pub fn user_email(&self) -> Option<&str> {
        self.state.user.as_ref().map(|u| u.email.as_str())
    }

    /// Incremented on every state change.
    pub fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthConfig, LocalAuth};
    use crate::store::DocumentStore;

    fn session() -> (Arc<LocalAuth>, SessionStore) {
        let store = Arc::new(DocumentStore::in_memory());
        let config = AuthConfig {
            bcrypt_cost: 4,
            ..Default::default()
        };
        let auth = Arc::new(LocalAuth::new(store, config));
        let session = SessionStore::new(auth.clone());
        (auth, session)
    }

    #[test]
    fn test_starts_loading_until_first_pump() {
        let (_auth, mut session) = session();
        assert!(session.state().loading);
        assert!(!session.state().initialized);

        assert_eq!(session.pump(), 1);

        assert!(!session.state().loading);
        assert!(session.state().initialized);
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_follows_sign_in_and_out() {
        let (auth, mut session) = session();
        session.pump();

        let identity = auth.sign_up("a@b.co", "secret1", "").unwrap();
        session.pump();
        assert_eq!(session.user_id(), Some(&identity.uid));
        assert_eq!(session.user_email(), Some("a@b.co"));

        session.logout();
        assert!(!session.is_authenticated());
        assert!(!session.state().loading);

        // The queued sign-out change leaves the state where it is.
        session.pump();
        assert!(!session.is_authenticated());
        assert_eq!(auth.current(), None);
    }

    #[test]
    fn test_version_tracks_changes() {
        let (_auth, mut session) = session();
        let v0 = session.version();

        session.pump();
        assert!(session.version() > v0);

        let v1 = session.version();
        session.clear_error();
        assert_eq!(session.version(), v1);
    }
}
