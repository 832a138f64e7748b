//! Local email and password accounts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::password::PasswordHash;
use super::profile::{UserProfile, USERS_COLLECTION};
use crate::error::StoreError;
use crate::model::FromDocument;
use crate::remote::RemoteDataService;
use crate::types::{CollectionPath, DocumentId, DocumentPath, Timestamp};

/// Length of generated user ids.
const UID_LEN: usize = 28;

/// The signed-in user as seen by the rest of the crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub uid: DocumentId,
    pub email: String,
    pub display_name: Option<String>,
}

/// Authentication failures, worded for display to the user.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("An account with this email already exists.")]
    EmailInUse,

    #[error("Password should be at least {min_len} characters long.")]
    WeakPassword { min_len: usize },

    #[error("Please enter a valid email address.")]
    InvalidEmail,

    #[error("Password is required.")]
    PasswordRequired,

    #[error("Invalid email or password. Please check your credentials.")]
    InvalidCredential,

    #[error("Too many failed attempts. Please try again later.")]
    TooManyRequests,

    #[error("Could not save the user profile: {0}")]
    Profile(String),

    #[error("An unexpected error occurred. Please try again.")]
    Unexpected(String),
}

impl From<bcrypt::BcryptError> for AuthError {
    fn from(e: bcrypt::BcryptError) -> Self {
        AuthError::Unexpected(e.to_string())
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::Profile(e.to_string())
    }
}

/// Authentication settings.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// bcrypt cost for new password hashes.
    /// Default: [PasswordHash::DEFAULT_COST]
    pub bcrypt_cost: u32,

    /// Minimum password length for sign up.
    /// Default: 6
    pub min_password_len: usize,

    /// Consecutive failed sign ins before an email is locked out.
    /// Default: 5
    pub max_failed_attempts: u32,

    /// How long a locked-out email stays locked.
    /// Default: 60 seconds
    pub lockout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: PasswordHash::DEFAULT_COST,
            min_password_len: 6,
            max_failed_attempts: 5,
            lockout: Duration::from_secs(60),
        }
    }
}

/// The identity provider seam.
pub trait AuthService: Send + Sync {
    /// Register a new account and sign it in.
    fn sign_up(&self, email: &str, password: &str, display_name: &str)
        -> Result<Identity, AuthError>;

    fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    fn sign_out(&self) -> Result<(), AuthError>;

    /// The currently signed-in identity, if any.
    fn current(&self) -> Option<Identity>;

    /// A stream of identity changes. The current identity is delivered
    /// first so a new listener learns the initial state.
    fn identity_changes(&self) -> Receiver<Option<Identity>>;
}

/// `local@domain.tld` with no whitespace and a single `@`.
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

struct Account {
    uid: DocumentId,
    email: String,
    display_name: Option<String>,
    password: PasswordHash,
}

impl Account {
    fn identity(&self) -> Identity {
        Identity {
            uid: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

#[derive(Default)]
struct Failures {
    count: u32,
    last: Option<Instant>,
}

/// In-process account registry backed by bcrypt hashes.
///
/// Profiles are written to `users/{uid}` on the given data service.
pub struct LocalAuth {
    config: AuthConfig,
    remote: Arc<dyn RemoteDataService>,
    /// Keyed by lowercased email.
    accounts: RwLock<HashMap<String, Account>>,
    failures: Mutex<HashMap<String, Failures>>,
    current: RwLock<Option<Identity>>,
    listeners: Mutex<Vec<Sender<Option<Identity>>>>,
    next_uid: AtomicU64,
}

impl LocalAuth {
    pub fn new(remote: Arc<dyn RemoteDataService>, config: AuthConfig) -> Self {
        Self {
            config,
            remote,
            accounts: RwLock::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            current: RwLock::new(None),
            listeners: Mutex::new(Vec::new()),
            next_uid: AtomicU64::new(0),
        }
    }

    /// Read a user's profile document.
    pub fn profile(&self, uid: &DocumentId) -> Result<Option<UserProfile>, AuthError> {
        let users = CollectionPath::root(USERS_COLLECTION)?;
        let Some(doc) = self.remote.get(&users.doc(uid))? else {
            return Ok(None);
        };
        UserProfile::from_document(&users, &doc)
            .map(Some)
            .map_err(|e| AuthError::Profile(e.to_string()))
    }

    fn profile_path(uid: &DocumentId) -> Result<DocumentPath, AuthError> {
        Ok(CollectionPath::root(USERS_COLLECTION)?.doc(uid))
    }

    fn generate_uid(&self, email: &str) -> Result<DocumentId, AuthError> {
        let n = self.next_uid.fetch_add(1, Ordering::SeqCst);

        let mut hasher = Sha256::new();
        hasher.update(email.as_bytes());
        hasher.update(n.to_le_bytes());
        hasher.update(Timestamp::now().0.to_le_bytes());
        let digest = hex::encode(hasher.finalize());

        Ok(DocumentId::parse(&digest[..UID_LEN])?)
    }

    fn set_current(&self, identity: Option<Identity>) {
        *self.current.write() = identity.clone();
        self.listeners
            .lock()
            .retain(|tx| tx.send(identity.clone()).is_ok());
    }

    fn check_lockout(&self, key: &str) -> Result<(), AuthError> {
        let mut failures = self.failures.lock();
        let Some(entry) = failures.get_mut(key) else {
            return Ok(());
        };
        if entry.count < self.config.max_failed_attempts {
            return Ok(());
        }
        match entry.last {
            Some(at) if at.elapsed() < self.config.lockout => Err(AuthError::TooManyRequests),
            _ => {
                failures.remove(key);
                Ok(())
            }
        }
    }

    fn record_failure(&self, key: &str) {
        let mut failures = self.failures.lock();
        let entry = failures.entry(key.to_string()).or_default();
        entry.count += 1;
        entry.last = Some(Instant::now());
    }

    /// Stamp `lastLoginAt` on an existing profile. Never fails the sign in.
    fn touch_profile(&self, uid: &DocumentId) {
        let result = Self::profile_path(uid).and_then(|path| {
            if self.remote.get(&path)?.is_some() {
                self.remote
                    .set(&path, UserProfile::login_fields(Timestamp::now()), true)?;
            }
            Ok(())
        });
        if let Err(e) = result {
            warn!(uid = %uid, error = %e, "Failed to update last login time");
        }
    }
}

impl AuthService for LocalAuth {
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, AuthError> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        if password.chars().count() < self.config.min_password_len {
            return Err(AuthError::WeakPassword {
                min_len: self.config.min_password_len,
            });
        }

        let key = email.to_lowercase();
        if self.accounts.read().contains_key(&key) {
            return Err(AuthError::EmailInUse);
        }

        let hash = PasswordHash::new(password, self.config.bcrypt_cost)?;
        let uid = self.generate_uid(&key)?;
        let display_name = Some(display_name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        // The profile goes first so a failed write leaves no account behind.
        let profile = UserProfile::new(uid.clone(), &key, display_name.clone());
        self.remote
            .set(&Self::profile_path(&uid)?, profile.to_fields(), false)?;

        let account = Account {
            uid,
            email: key.clone(),
            display_name,
            password: hash,
        };
        let identity = account.identity();
        {
            let mut accounts = self.accounts.write();
            if accounts.contains_key(&key) {
                return Err(AuthError::EmailInUse);
            }
            accounts.insert(key, account);
        }

        info!(uid = %identity.uid, "Account created");
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        if password.is_empty() {
            return Err(AuthError::PasswordRequired);
        }

        let key = email.to_lowercase();
        self.check_lockout(&key)?;

        let identity = {
            let accounts = self.accounts.read();
            match accounts.get(&key) {
                Some(account) if account.password.verify(password)? => Some(account.identity()),
                _ => None,
            }
        };
        let Some(identity) = identity else {
            debug!("Sign in rejected");
            self.record_failure(&key);
            return Err(AuthError::InvalidCredential);
        };

        self.failures.lock().remove(&key);
        self.touch_profile(&identity.uid);

        info!(uid = %identity.uid, "Signed in");
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    fn sign_out(&self) -> Result<(), AuthError> {
        if self.current.read().is_some() {
            info!("Signed out");
        }
        self.set_current(None);
        Ok(())
    }

    fn current(&self) -> Option<Identity> {
        self.current.read().clone()
    }

    fn identity_changes(&self) -> Receiver<Option<Identity>> {
        let (tx, rx) = unbounded();
        // Sent under the listener lock so no change can slip in between.
        let mut listeners = self.listeners.lock();
        if tx.send(self.current()).is_ok() {
            listeners.push(tx);
        }
        rx
    }
}
