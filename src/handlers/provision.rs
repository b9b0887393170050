// handlers/provision.rs - the two privileged provisioning endpoints
//
// Authorization is not enforced by middleware here: the provisioning service
// runs its own ordered checks, so an unauthenticated or non-admin caller
// fails before any input validation and before any provider call. The
// optional_auth layer only establishes who the caller is.

use axum::extract::State;
use axum::{Extension, Json};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::provisioning::Caller;
use crate::state::AppState;

/// POST /api/provision/vendor - create a vendor account plus its profile.
///
/// Response shape is the wire contract the console expects: `{uid, success}`.
pub async fn vendor_create(
    State(state): State<AppState>,
    caller: Option<Extension<AuthUser>>,
    Json(input): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let caller = Caller::from(caller.map(|Extension(user)| user));

    let out = state.provisioner.create_vendor_account(&caller, input).await?;

    Ok(Json(json!({
        "uid": out.account_id,
        "success": true,
    })))
}

/// POST /api/provision/admin-claim - grant the admin claim to an account.
///
/// The grant takes effect on the target's next login, not on sessions
/// already in flight.
pub async fn admin_claim(
    State(state): State<AppState>,
    caller: Option<Extension<AuthUser>>,
    Json(input): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let caller = Caller::from(caller.map(|Extension(user)| user));

    let out = state.provisioner.set_admin_claim(&caller, input).await?;

    Ok(Json(json!({
        "success": true,
        "uid": out.account_id,
    })))
}
