pub mod memory;
pub mod postgres;

use std::collections::BTreeMap;

use argon2::{
    password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An identity-provider account. The profile store holds a denormalized copy
/// of the display name and email keyed by the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub email_verified: bool,
    pub claims: BTreeMap<String, bool>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn is_admin(&self) -> bool {
        self.claims.get("admin").copied().unwrap_or(false)
    }
}

/// Input record for account creation. Exists only for the duration of one
/// call; the password is hashed before anything is persisted.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub email_verified: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("an account already exists for email: {0}")]
    EmailExists(String),
    #[error("account not found: {0}")]
    NotFound(String),
    #[error("password must be at least {0} characters")]
    WeakPassword(usize),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("password hashing error: {0}")]
    Hash(String),
    #[error("identity backend error: {0}")]
    Backend(String),
}

/// The identity provider seam. Handles are injected into the provisioning
/// service at construction; nothing holds one through a global.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account. Fails deterministically with `EmailExists` when
    /// the email is already taken, which also arbitrates concurrent
    /// provisioning races for the same email.
    async fn create_account(&self, new: NewAccount) -> Result<Account, IdentityError>;

    async fn account(&self, id: Uuid) -> Result<Account, IdentityError>;

    async fn account_by_email(&self, email: &str) -> Result<Account, IdentityError>;

    /// Merge one claim into the account's claim map, preserving unrelated
    /// claims. Idempotent: re-setting an identical value still succeeds.
    async fn set_claim(&self, id: Uuid, claim: &str, value: bool) -> Result<(), IdentityError>;

    /// Check credentials and return the account. Unknown email and wrong
    /// password are indistinguishable to the caller.
    async fn verify_password(&self, email: &str, password: &str)
        -> Result<Account, IdentityError>;

    /// All account ids, for the orphan reconciliation sweep.
    async fn list_account_ids(&self) -> Result<Vec<Uuid>, IdentityError>;
}

pub(crate) fn hash_password(password: &str) -> Result<String, IdentityError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| IdentityError::Hash(e.to_string()))
}

pub(crate) fn check_password(password: &str, phc_hash: &str) -> bool {
    PasswordHash::new(phc_hash)
        .and_then(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed))
        .is_ok()
}

pub(crate) fn enforce_password_policy(
    password: &str,
    min_len: usize,
) -> Result<(), IdentityError> {
    if password.chars().count() < min_len {
        return Err(IdentityError::WeakPassword(min_len));
    }
    Ok(())
}
