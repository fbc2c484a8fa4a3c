//! Authentication and tier guards
//!
//! `jwt_auth_layer` runs first on every protected router and leaves an
//! [`AuthContext`] in the request extensions; the tier guards read it.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use fintrack_shared::auth::middleware::{authenticate, AuthContext, AuthError};

use crate::{app::AppState, error::ApiError};

/// Validates the bearer token and attaches the caller
pub async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth = authenticate(&state.db, &state.config.jwt.secret, request.headers()).await?;

    tracing::debug!(user_id = %auth.user_id, tier = %auth.tier, "Authenticated request");
    request.extensions_mut().insert(auth);

    Ok(next.run(request).await)
}

fn caller(request: &Request) -> Result<&AuthContext, ApiError> {
    request
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| ApiError::Unauthorized("Token required".to_string()))
}

/// Admits `premium` and `premium+`
pub async fn require_premium(request: Request, next: Next) -> Result<Response, ApiError> {
    if !caller(&request)?.is_premium() {
        return Err(ApiError::Forbidden(
            "Premium subscription required".to_string(),
        ));
    }
    Ok(next.run(request).await)
}

/// Admits `premium+` only
pub async fn require_premium_plus(request: Request, next: Next) -> Result<Response, ApiError> {
    if !caller(&request)?.is_premium_plus() {
        return Err(ApiError::Forbidden(
            "Premium+ subscription required".to_string(),
        ));
    }
    Ok(next.run(request).await)
}
