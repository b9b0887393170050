use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{ProfileError, ProfileStore, VendorProfile};

/// Postgres-backed profile store. One row per vendor, keyed by account id.
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), ProfileError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vendor_profiles (
                account_id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ProfileError::Backend(e.to_string()))?;

        Ok(())
    }

    fn profile_from_row(row: &sqlx::postgres::PgRow) -> Result<VendorProfile, sqlx::Error> {
        Ok(VendorProfile {
            account_id: row.try_get("account_id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn put(
        &self,
        account_id: Uuid,
        name: &str,
        email: &str,
    ) -> Result<VendorProfile, ProfileError> {
        let row = sqlx::query(
            r#"
            INSERT INTO vendor_profiles (account_id, name, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (account_id) DO UPDATE SET name = $2, email = $3
            RETURNING account_id, name, email, created_at
            "#,
        )
        .bind(account_id)
        .bind(name)
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ProfileError::Backend(e.to_string()))?;

        Self::profile_from_row(&row).map_err(|e| ProfileError::Backend(e.to_string()))
    }

    async fn get(&self, account_id: Uuid) -> Result<VendorProfile, ProfileError> {
        let row = sqlx::query(
            "SELECT account_id, name, email, created_at FROM vendor_profiles WHERE account_id = $1",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ProfileError::Backend(e.to_string()))?
        .ok_or(ProfileError::NotFound(account_id))?;

        Self::profile_from_row(&row).map_err(|e| ProfileError::Backend(e.to_string()))
    }

    async fn list_ids(&self) -> Result<Vec<Uuid>, ProfileError> {
        let rows = sqlx::query("SELECT account_id FROM vendor_profiles ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ProfileError::Backend(e.to_string()))?;

        rows.iter()
            .map(|row| {
                row.try_get("account_id")
                    .map_err(|e| ProfileError::Backend(e.to_string()))
            })
            .collect()
    }
}
