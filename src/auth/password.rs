//! Password hashing for locally registered accounts.

use std::fmt;

use bcrypt::{hash, verify, BcryptError};

/// A salted and hashed password.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// An alias for the default encryption cost for hashing passwords.
    pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

    /// Hash `raw_password` with the given bcrypt `cost`.
    ///
    /// `cost` increases the rounds of hashing and therefore the time needed
    /// to verify a password. Pass [PasswordHash::DEFAULT_COST] outside tests.
    pub fn new(raw_password: &str, cost: u32) -> Result<Self, BcryptError> {
        hash(raw_password, cost).map(Self)
    }

    /// Check that `raw_password` matches the stored password.
    pub fn verify(&self, raw_password: &str) -> Result<bool, BcryptError> {
        verify(raw_password, &self.0)
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(********)")
    }
}
