use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    /// Provider password policy. Accounts cannot be created with a shorter password.
    pub min_password_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database_url: Option<String>,
    /// Seed credentials for an initial admin account. Only honored by the
    /// memory backend, which starts empty on every boot.
    pub dev_admin_email: Option<String>,
    pub dev_admin_password: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(v) = env::var("PERKS_API_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Security overrides
        if let Ok(v) = env::var("PERKS_JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("PERKS_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("PERKS_MIN_PASSWORD_LEN") {
            self.security.min_password_len = v.parse().unwrap_or(self.security.min_password_len);
        }

        // Storage overrides
        if let Ok(v) = env::var("PERKS_BACKEND") {
            self.storage.backend = match v.as_str() {
                "postgres" => StorageBackend::Postgres,
                "memory" => StorageBackend::Memory,
                _ => self.storage.backend,
            };
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.storage.database_url = Some(v);
        }
        if let Ok(v) = env::var("PERKS_DEV_ADMIN_EMAIL") {
            self.storage.dev_admin_email = Some(v);
        }
        if let Ok(v) = env::var("PERKS_DEV_ADMIN_PASSWORD") {
            self.storage.dev_admin_password = Some(v);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 3000 },
            security: SecurityConfig {
                jwt_secret: "dev-secret-change-me".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                min_password_len: 6,
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                database_url: None,
                dev_admin_email: None,
                dev_admin_password: None,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig { port: 3000 },
            security: SecurityConfig {
                jwt_secret: String::new(), // must come from PERKS_JWT_SECRET
                jwt_expiry_hours: 24,
                min_password_len: 6,
            },
            storage: StorageConfig {
                backend: StorageBackend::Postgres,
                database_url: None,
                dev_admin_email: None,
                dev_admin_password: None,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig { port: 3000 },
            security: SecurityConfig {
                jwt_secret: String::new(), // must come from PERKS_JWT_SECRET
                jwt_expiry_hours: 4,
                min_password_len: 6,
            },
            storage: StorageConfig {
                backend: StorageBackend::Postgres,
                database_url: None,
                dev_admin_email: None,
                dev_admin_password: None,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
