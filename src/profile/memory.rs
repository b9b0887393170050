use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{ProfileError, ProfileStore, VendorProfile};

/// In-memory profile store, paired with the memory identity backend.
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<Uuid, VendorProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
        }
    }

    fn lock_err<T>(_: T) -> ProfileError {
        ProfileError::Backend("profile map lock poisoned".to_string())
    }
}

impl Default for MemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn put(
        &self,
        account_id: Uuid,
        name: &str,
        email: &str,
    ) -> Result<VendorProfile, ProfileError> {
        let profile = VendorProfile {
            account_id,
            name: name.to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        };

        let mut profiles = self.profiles.write().map_err(Self::lock_err)?;
        profiles.insert(account_id, profile.clone());

        Ok(profile)
    }

    async fn get(&self, account_id: Uuid) -> Result<VendorProfile, ProfileError> {
        let profiles = self.profiles.read().map_err(Self::lock_err)?;
        profiles
            .get(&account_id)
            .cloned()
            .ok_or(ProfileError::NotFound(account_id))
    }

    async fn list_ids(&self) -> Result<Vec<Uuid>, ProfileError> {
        let profiles = self.profiles.read().map_err(Self::lock_err)?;
        Ok(profiles.keys().copied().collect())
    }
}
