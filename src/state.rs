use std::sync::Arc;

use anyhow::Context;

use crate::config::{AppConfig, StorageBackend};
use crate::identity::memory::MemoryIdentityProvider;
use crate::identity::postgres::PgIdentityProvider;
use crate::identity::{IdentityProvider, NewAccount};
use crate::profile::memory::MemoryProfileStore;
use crate::profile::postgres::PgProfileStore;
use crate::profile::ProfileStore;
use crate::provisioning::ProvisioningService;

/// Shared handler state. The provider and store handles are built once at
/// startup and injected everywhere; request handlers stay stateless.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub profiles: Arc<dyn ProfileStore>,
    pub provisioner: Arc<ProvisioningService>,
}

impl AppState {
    pub fn new(identity: Arc<dyn IdentityProvider>, profiles: Arc<dyn ProfileStore>) -> Self {
        let provisioner = Arc::new(ProvisioningService::new(identity.clone(), profiles.clone()));
        Self { identity, profiles, provisioner }
    }

    /// Build the state for the configured backend, creating schemas as
    /// needed. The memory backend starts empty, so it optionally seeds one
    /// admin account from the dev credentials. The postgres backend never
    /// seeds; its first admin comes from `perksctl grant-admin`.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let min_password_len = config.security.min_password_len;

        let state = match config.storage.backend {
            StorageBackend::Postgres => {
                let url = config
                    .storage
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL is required for the postgres backend")?;

                let identity = PgIdentityProvider::connect(url, min_password_len)
                    .await
                    .context("failed to connect identity backend")?;
                identity.ensure_schema().await.context("failed to create accounts schema")?;

                let profiles = PgProfileStore::new(identity.pool().clone());
                profiles.ensure_schema().await.context("failed to create profiles schema")?;

                Self::new(Arc::new(identity), Arc::new(profiles))
            }
            StorageBackend::Memory => {
                let state = Self::new(
                    Arc::new(MemoryIdentityProvider::new(min_password_len)),
                    Arc::new(MemoryProfileStore::new()),
                );
                state.seed_dev_admin(config).await?;
                state
            }
        };

        Ok(state)
    }

    async fn seed_dev_admin(&self, config: &AppConfig) -> anyhow::Result<()> {
        let (email, password) = match (
            &config.storage.dev_admin_email,
            &config.storage.dev_admin_password,
        ) {
            (Some(email), Some(password)) => (email.clone(), password.clone()),
            _ => return Ok(()),
        };

        let account = self
            .identity
            .create_account(NewAccount {
                email,
                password,
                display_name: "Dev Admin".to_string(),
                email_verified: true,
            })
            .await
            .context("failed to seed dev admin account")?;

        self.identity
            .set_claim(account.id, "admin", true)
            .await
            .context("failed to grant seeded dev admin claim")?;

        tracing::info!(target: "audit", account_id = %account.id, "dev admin seeded");
        Ok(())
    }
}
