// handlers/auth.rs - session issuance and introspection

use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{self, Claims};
use crate::error::ApiError;
use crate::identity::{Account, IdentityError};
use crate::middleware::{ApiResponse, AuthUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AccountView {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub admin: bool,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            display_name: account.display_name.clone(),
            admin: account.is_admin(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginData {
    pub token: String,
    pub expires_in: u64,
    pub account: AccountView,
}

/// POST /auth/login - verify credentials and issue a session token.
///
/// The token snapshots the account's claims at issuance. A claim granted
/// later is only honored after the account logs in again.
pub async fn session_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<ApiResponse<LoginData>, ApiError> {
    if req.email.is_empty() || req.password.is_empty() {
        return Err(ApiError::invalid_argument("email and password are required"));
    }

    let account = state
        .identity
        .verify_password(&req.email, &req.password)
        .await
        .map_err(|e| match e {
            IdentityError::InvalidCredentials | IdentityError::NotFound(_) => {
                ApiError::unauthenticated("invalid email or password")
            }
            other => other.into(),
        })?;

    let token = auth::generate_token(&Claims::for_account(&account))?;

    tracing::debug!(account_id = %account.id, "session issued");

    Ok(ApiResponse::success(LoginData {
        token,
        expires_in: auth::expiry_seconds(),
        account: AccountView::from(account),
    }))
}

/// GET /api/auth/whoami - current caller, as seen by the session token
pub async fn session_whoami(
    Extension(user): Extension<AuthUser>,
) -> ApiResponse<serde_json::Value> {
    ApiResponse::success(serde_json::json!({
        "id": user.account_id,
        "email": user.email,
        "admin": user.admin,
    }))
}
