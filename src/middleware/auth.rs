use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::auth::{self, Claims};
use crate::error::ApiError;
use crate::provisioning::Caller;

/// Authenticated caller context extracted from a verified session token
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub account_id: Uuid,
    pub email: String,
    pub admin: bool,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            account_id: claims.sub,
            email: claims.email,
            admin: claims.admin,
        }
    }
}

impl From<Option<AuthUser>> for Caller {
    fn from(user: Option<AuthUser>) -> Self {
        match user {
            Some(u) => Caller::Authenticated {
                account_id: u.account_id,
                admin: u.admin,
            },
            None => Caller::Anonymous,
        }
    }
}

/// Middleware for routes that are unusable without a session: rejects with
/// `unauthenticated` unless a valid Bearer token is present.
pub async fn require_auth(
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&headers)?.ok_or_else(|| {
        ApiError::unauthenticated("Missing Authorization header")
    })?;

    let claims = auth::verify_token(&token).map_err(ApiError::from)?;
    request.extensions_mut().insert(AuthUser::from(claims));

    Ok(next.run(request).await)
}

/// Middleware for the provisioning routes. The provisioning service performs
/// the authorization checks itself, in order, so the caller context must
/// reach it even when no token was supplied. A header that is present but
/// malformed or unverifiable is still rejected here.
pub async fn optional_auth(
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(token) = bearer_token(&headers)? {
        let claims = auth::verify_token(&token).map_err(ApiError::from)?;
        request.extensions_mut().insert(AuthUser::from(claims));
    }

    Ok(next.run(request).await)
}

/// Extract the Bearer token, if any, from the Authorization header
fn bearer_token(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let auth_header = match headers.get("authorization") {
        Some(h) => h,
        None => return Ok(None),
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| ApiError::unauthenticated("Invalid Authorization header format"))?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthenticated("Authorization header must use Bearer token format"))?;

    if token.trim().is_empty() {
        return Err(ApiError::unauthenticated("Empty session token"));
    }

    Ok(Some(token.to_string()))
}
