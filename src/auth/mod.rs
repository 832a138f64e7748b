//! Accounts, sign in and the observed session.
//!
//! [LocalAuth] keeps accounts in process with bcrypt password hashes and
//! writes a profile document per user. [SessionStore] follows the
//! identity stream of any [AuthService] and is what the lifecycle
//! coordinator watches.

mod password;
mod profile;
mod service;
mod session;

pub use password::PasswordHash;
pub use profile::{UserProfile, USERS_COLLECTION};
pub use service::{AuthConfig, AuthError, AuthService, Identity, LocalAuth};
pub use session::{SessionState, SessionStore};
