//! Credential Store
//!
//! Username-keyed credential records for API login:
//! - Record lookup
//! - bcrypt password verification
//! - Authentication that costs the same for unknown users and wrong passwords

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// bcrypt work factor used when none is configured
pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

/// Demo account seeded when no users are configured
pub const DEMO_USERNAME: &str = "user@example.com";
pub const DEMO_PASSWORD: &str = "password";
pub const DEMO_FULL_NAME: &str = "Test User";

/// Credential store error types
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    #[error("User already registered: {0}")]
    DuplicateUser(String),

    #[error("Username must not be empty")]
    EmptyUsername,
}

/// A registered API user
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub username: String,
    pub full_name: String,
    pub password_hash: String,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("username", &self.username)
            .field("full_name", &self.full_name)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

/// Verify a plaintext password against a bcrypt hash.
///
/// A hash that bcrypt cannot parse verifies as `false`.
pub fn verify_password(plain_password: &str, password_hash: &str) -> bool {
    match bcrypt::verify(plain_password, password_hash) {
        Ok(matches) => matches,
        Err(e) => {
            debug!("Stored password hash rejected by bcrypt: {}", e);
            false
        }
    }
}

/// Lookup and verification primitives for login.
///
/// Failures are reported as `None`/`false`, never as errors, so callers
/// cannot tell an unknown user from a wrong password.
pub trait CredentialStore: Send + Sync {
    /// Find the record for a username
    fn lookup(&self, username: &str) -> Option<CredentialRecord>;

    /// Check a plaintext password against a record
    fn verify(&self, plain_password: &str, record: &CredentialRecord) -> bool {
        verify_password(plain_password, &record.password_hash)
    }

    /// Lookup followed by verification
    fn authenticate(&self, username: &str, password: &str) -> Option<CredentialRecord> {
        let record = self.lookup(username)?;
        self.verify(password, &record).then_some(record)
    }
}

/// In-memory credential table, fixed after startup
pub struct InMemoryCredentialStore {
    records: HashMap<String, CredentialRecord>,
    /// bcrypt cost for newly registered passwords
    cost: u32,
    /// Hash checked when the username is unknown
    dummy_hash: String,
}

impl InMemoryCredentialStore {
    /// Create an empty store hashing at the given bcrypt cost
    pub fn new(cost: u32) -> Result<Self, CredentialError> {
        let dummy_hash = bcrypt::hash("dummy-password-for-unknown-users", cost)?;
        Ok(Self {
            records: HashMap::new(),
            cost,
            dummy_hash,
        })
    }

    /// Create a store holding only the demo account
    pub fn with_demo_user(cost: u32) -> Result<Self, CredentialError> {
        let mut store = Self::new(cost)?;
        store.register(DEMO_USERNAME, DEMO_FULL_NAME, DEMO_PASSWORD)?;
        Ok(store)
    }

    /// Add a record whose password is already hashed
    pub fn insert(&mut self, record: CredentialRecord) -> Result<(), CredentialError> {
        if record.username.is_empty() {
            return Err(CredentialError::EmptyUsername);
        }
        if self.records.contains_key(&record.username) {
            return Err(CredentialError::DuplicateUser(record.username));
        }

        info!(user = %record.username, "Registered credential");
        self.records.insert(record.username.clone(), record);
        Ok(())
    }

    /// Hash a plaintext password and add the resulting record
    pub fn register(
        &mut self,
        username: &str,
        full_name: &str,
        password: &str,
    ) -> Result<(), CredentialError> {
        let password_hash = bcrypt::hash(password, self.cost)?;
        self.insert(CredentialRecord {
            username: username.to_string(),
            full_name: full_name.to_string(),
            password_hash,
        })
    }

    /// Number of registered users
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no users are registered
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn lookup(&self, username: &str) -> Option<CredentialRecord> {
        self.records.get(username).cloned()
    }

    fn authenticate(&self, username: &str, password: &str) -> Option<CredentialRecord> {
        match self.records.get(username) {
            Some(record) => self.verify(password, record).then(|| record.clone()),
            None => {
                // Same bcrypt work as a real check
                let _ = verify_password(password, &self.dummy_hash);
                None
            }
        }
    }
}
