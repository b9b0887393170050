use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{
    check_password, enforce_password_policy, hash_password, Account, IdentityError,
    IdentityProvider, NewAccount,
};

struct StoredAccount {
    account: Account,
    password_hash: String,
}

/// In-memory identity backend. Starts empty on every boot; used for local
/// development and the hermetic integration-test harness.
pub struct MemoryIdentityProvider {
    accounts: RwLock<HashMap<Uuid, StoredAccount>>,
    min_password_len: usize,
}

impl MemoryIdentityProvider {
    pub fn new(min_password_len: usize) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            min_password_len,
        }
    }

    fn lock_err<T>(_: T) -> IdentityError {
        IdentityError::Backend("account map lock poisoned".to_string())
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn create_account(&self, new: NewAccount) -> Result<Account, IdentityError> {
        enforce_password_policy(&new.password, self.min_password_len)?;
        let password_hash = hash_password(&new.password)?;

        let mut accounts = self.accounts.write().map_err(Self::lock_err)?;

        // Uniqueness is on the exact email string, no normalization
        if accounts.values().any(|s| s.account.email == new.email) {
            return Err(IdentityError::EmailExists(new.email));
        }

        let account = Account {
            id: Uuid::new_v4(),
            email: new.email,
            display_name: new.display_name,
            email_verified: new.email_verified,
            claims: BTreeMap::new(),
            created_at: Utc::now(),
        };

        accounts.insert(
            account.id,
            StoredAccount {
                account: account.clone(),
                password_hash,
            },
        );

        Ok(account)
    }

    async fn account(&self, id: Uuid) -> Result<Account, IdentityError> {
        let accounts = self.accounts.read().map_err(Self::lock_err)?;
        accounts
            .get(&id)
            .map(|s| s.account.clone())
            .ok_or_else(|| IdentityError::NotFound(id.to_string()))
    }

    async fn account_by_email(&self, email: &str) -> Result<Account, IdentityError> {
        let accounts = self.accounts.read().map_err(Self::lock_err)?;
        accounts
            .values()
            .find(|s| s.account.email == email)
            .map(|s| s.account.clone())
            .ok_or_else(|| IdentityError::NotFound(email.to_string()))
    }

    async fn set_claim(&self, id: Uuid, claim: &str, value: bool) -> Result<(), IdentityError> {
        let mut accounts = self.accounts.write().map_err(Self::lock_err)?;
        let stored = accounts
            .get_mut(&id)
            .ok_or_else(|| IdentityError::NotFound(id.to_string()))?;

        stored.account.claims.insert(claim.to_string(), value);
        Ok(())
    }

    async fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Account, IdentityError> {
        let accounts = self.accounts.read().map_err(Self::lock_err)?;
        let stored = accounts
            .values()
            .find(|s| s.account.email == email)
            .ok_or(IdentityError::InvalidCredentials)?;

        if !check_password(password, &stored.password_hash) {
            return Err(IdentityError::InvalidCredentials);
        }

        Ok(stored.account.clone())
    }

    async fn list_account_ids(&self) -> Result<Vec<Uuid>, IdentityError> {
        let accounts = self.accounts.read().map_err(Self::lock_err)?;
        Ok(accounts.keys().copied().collect())
    }
}
