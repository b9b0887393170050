use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{
    check_password, enforce_password_policy, hash_password, Account, IdentityError,
    IdentityProvider, NewAccount,
};

/// Postgres-backed identity provider. Claims live in a jsonb column so the
/// claim map stays open-ended without schema churn.
pub struct PgIdentityProvider {
    pool: PgPool,
    min_password_len: usize,
}

impl PgIdentityProvider {
    pub fn new(pool: PgPool, min_password_len: usize) -> Self {
        Self { pool, min_password_len }
    }

    pub async fn connect(database_url: &str, min_password_len: usize) -> Result<Self, IdentityError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| IdentityError::Backend(e.to_string()))?;

        Ok(Self::new(pool, min_password_len))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ensure_schema(&self) -> Result<(), IdentityError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id UUID PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL,
                email_verified BOOLEAN NOT NULL DEFAULT FALSE,
                password_hash TEXT NOT NULL,
                claims JSONB NOT NULL DEFAULT '{}'::jsonb,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IdentityError::Backend(e.to_string()))?;

        Ok(())
    }

    fn account_from_row(row: &PgRow) -> Result<Account, sqlx::Error> {
        let claims: sqlx::types::Json<BTreeMap<String, bool>> = row.try_get("claims")?;

        Ok(Account {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            display_name: row.try_get("display_name")?,
            email_verified: row.try_get("email_verified")?,
            claims: claims.0,
            created_at: row.try_get("created_at")?,
        })
    }
}

const ACCOUNT_COLUMNS: &str = "id, email, display_name, email_verified, claims, created_at";

#[async_trait]
impl IdentityProvider for PgIdentityProvider {
    async fn create_account(&self, new: NewAccount) -> Result<Account, IdentityError> {
        enforce_password_policy(&new.password, self.min_password_len)?;
        let password_hash = hash_password(&new.password)?;
        let id = Uuid::new_v4();

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO accounts (id, email, display_name, email_verified, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&new.email)
        .bind(&new.display_name)
        .bind(new.email_verified)
        .bind(&password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                IdentityError::EmailExists(new.email.clone())
            }
            _ => IdentityError::Backend(e.to_string()),
        })?;

        Self::account_from_row(&row).map_err(|e| IdentityError::Backend(e.to_string()))
    }

    async fn account(&self, id: Uuid) -> Result<Account, IdentityError> {
        let row = sqlx::query(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IdentityError::Backend(e.to_string()))?
            .ok_or_else(|| IdentityError::NotFound(id.to_string()))?;

        Self::account_from_row(&row).map_err(|e| IdentityError::Backend(e.to_string()))
    }

    async fn account_by_email(&self, email: &str) -> Result<Account, IdentityError> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IdentityError::Backend(e.to_string()))?
        .ok_or_else(|| IdentityError::NotFound(email.to_string()))?;

        Self::account_from_row(&row).map_err(|e| IdentityError::Backend(e.to_string()))
    }

    async fn set_claim(&self, id: Uuid, claim: &str, value: bool) -> Result<(), IdentityError> {
        // jsonb || merges in a single statement, preserving unrelated claims
        let mut patch = BTreeMap::new();
        patch.insert(claim.to_string(), value);

        let result = sqlx::query("UPDATE accounts SET claims = claims || $2::jsonb WHERE id = $1")
            .bind(id)
            .bind(sqlx::types::Json(patch))
            .execute(&self.pool)
            .await
            .map_err(|e| IdentityError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(IdentityError::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Account, IdentityError> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS}, password_hash FROM accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IdentityError::Backend(e.to_string()))?
        .ok_or(IdentityError::InvalidCredentials)?;

        let password_hash: String = row
            .try_get("password_hash")
            .map_err(|e| IdentityError::Backend(e.to_string()))?;

        if !check_password(password, &password_hash) {
            return Err(IdentityError::InvalidCredentials);
        }

        Self::account_from_row(&row).map_err(|e| IdentityError::Backend(e.to_string()))
    }

    async fn list_account_ids(&self) -> Result<Vec<Uuid>, IdentityError> {
        let rows = sqlx::query("SELECT id FROM accounts ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| IdentityError::Backend(e.to_string()))?;

        rows.iter()
            .map(|row| row.try_get("id").map_err(|e| IdentityError::Backend(e.to_string())))
            .collect()
    }
}
