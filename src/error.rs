// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::auth::TokenError;
use crate::identity::IdentityError;
use crate::profile::ProfileError;
use crate::provisioning::ProvisionError;

/// HTTP API error carrying the fixed caller-visible taxonomy.
///
/// The `code` strings are part of the wire contract consumed by the admin
/// console; they never change shape even when messages do.
#[derive(Debug)]
pub enum ApiError {
    // 401
    Unauthenticated(String),
    // 403
    PermissionDenied(String),
    // 400
    InvalidArgument(String),
    // 404
    NotFound(String),
    // 409 (identity provider uniqueness conflicts, passed through)
    AlreadyExists(String),
    // 500
    Internal(String),
    // 503
    Unavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::AlreadyExists(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::Unauthenticated(msg)
            | ApiError::PermissionDenied(msg)
            | ApiError::InvalidArgument(msg)
            | ApiError::NotFound(msg)
            | ApiError::AlreadyExists(msg)
            | ApiError::Internal(msg)
            | ApiError::Unavailable(msg) => msg,
        }
    }

    /// Get machine-readable error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::PermissionDenied(_) => "permission-denied",
            ApiError::InvalidArgument(_) => "invalid-argument",
            ApiError::NotFound(_) => "not-found",
            ApiError::AlreadyExists(_) => "already-exists",
            ApiError::Internal(_) => "internal",
            ApiError::Unavailable(_) => "unavailable",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "success": false,
            "error": self.message(),
            "code": self.error_code(),
        })
    }
}

// Static constructor methods, mirroring the taxonomy names on the wire
impl ApiError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ApiError::Unauthenticated(message.into())
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        ApiError::PermissionDenied(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        ApiError::InvalidArgument(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        ApiError::AlreadyExists(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        ApiError::Unavailable(message.into())
    }
}

// Convert service-layer errors to ApiError at the HTTP boundary
impl From<ProvisionError> for ApiError {
    fn from(err: ProvisionError) -> Self {
        match err {
            ProvisionError::Unauthenticated => {
                ApiError::unauthenticated("User not authenticated")
            }
            ProvisionError::PermissionDenied => {
                ApiError::permission_denied("Admin access required")
            }
            ProvisionError::InvalidArgument(msg) => ApiError::invalid_argument(msg),
            ProvisionError::Identity(e) => e.into(),
            ProvisionError::Profile(e) => e.into(),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            // Provider rejections are surfaced verbatim to the caller
            IdentityError::EmailExists(_) => ApiError::already_exists(err.to_string()),
            IdentityError::WeakPassword(_) => ApiError::invalid_argument(err.to_string()),
            IdentityError::NotFound(_) => ApiError::not_found(err.to_string()),
            IdentityError::InvalidCredentials => {
                ApiError::unauthenticated("invalid email or password")
            }
            IdentityError::Hash(msg) => {
                tracing::error!("password hashing error: {}", msg);
                ApiError::internal("An error occurred while processing your request")
            }
            IdentityError::Backend(msg) => {
                tracing::error!("identity backend error: {}", msg);
                ApiError::unavailable("Identity backend temporarily unavailable")
            }
        }
    }
}

impl From<ProfileError> for ApiError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::NotFound(_) => ApiError::not_found(err.to_string()),
            ProfileError::Backend(msg) => {
                tracing::error!("profile store error: {}", msg);
                ApiError::unavailable("Profile store temporarily unavailable")
            }
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid(_) | TokenError::Expired => {
                ApiError::unauthenticated(err.to_string())
            }
            TokenError::MissingSecret | TokenError::Generation(_) => {
                tracing::error!("token error: {}", err);
                ApiError::internal("Failed to issue session token")
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}
