pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Denormalized vendor profile, keyed by the identity account id. The two
/// records are created together by the provisioning service but are not
/// written transactionally; a profile's key always refers to an account that
/// existed when the profile was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorProfile {
    pub account_id: Uuid,
    pub name: String,
    pub email: String,
    /// Assigned by the store at write time, never taken from the request.
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("no vendor profile for account: {0}")]
    NotFound(Uuid),
    #[error("profile store error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Write the profile document for an account. The store assigns the
    /// creation timestamp.
    async fn put(&self, account_id: Uuid, name: &str, email: &str)
        -> Result<VendorProfile, ProfileError>;

    async fn get(&self, account_id: Uuid) -> Result<VendorProfile, ProfileError>;

    /// All profiled account ids, for the orphan reconciliation sweep.
    async fn list_ids(&self) -> Result<Vec<Uuid>, ProfileError>;
}
