/// Authentication endpoints
///
/// - `POST /api/auth/register`: create an account and receive a token pair
/// - `POST /api/auth/login`: exchange credentials for a token pair
/// - `POST /api/auth/refresh`: exchange a refresh token for a new access token
/// - `POST /api/auth/logout`: acknowledge; tokens are stateless and the client discards them
///
/// Access tokens live 15 minutes, refresh tokens 7 days, and each kind has its own
/// signing secret.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    extract::ApiJson,
    response::ApiResponse,
};
use axum::extract::State;
use fintrack_shared::{
    auth::{jwt, password},
    models::user::{CreateUser, User},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Checked against the password policy after field validation
    pub password: String,

    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Returned by register and login
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: &'static str,
}

fn token_response(state: &AppState, user: User) -> Result<AuthResponse, ApiError> {
    let tokens = jwt::issue_token_pair(
        user.id,
        &state.config.jwt.secret,
        &state.config.jwt.refresh_secret,
    )?;

    Ok(AuthResponse {
        user,
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    })
}

/// Register a new user on the free tier
///
/// # Errors
///
/// - `400`: invalid email or a password that fails the policy
/// - `409`: email already registered
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<AuthResponse> {
    req.validate()?;

    password::validate_password_strength(&req.password).map_err(|message| {
        ApiError::ValidationError(vec![ValidationErrorDetail::new("password", message)])
    })?;

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email.trim().to_string(),
            password_hash,
            name: req.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok(ApiResponse::created(token_response(&state, user)?))
}

/// Log in with email and password
///
/// Unknown email and wrong password are indistinguishable: both are 401.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<AuthResponse> {
    req.validate()?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = User::find_by_email(&state.db, req.email.trim())
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "Failed login attempt");
        return Err(invalid());
    }

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(ApiResponse::success(token_response(&state, user)?))
}

/// Exchange a refresh token for a new access token
///
/// Expired refresh token is 401; any other failure (bad signature, access token supplied)
/// is 403.
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RefreshRequest>,
) -> ApiResult<RefreshResponse> {
    if req.refresh_token.trim().is_empty() {
        return Err(ApiError::BadRequest("Refresh token is required".to_string()));
    }

    let access_token = jwt::refresh_access_token(
        req.refresh_token.trim(),
        &state.config.jwt.refresh_secret,
        &state.config.jwt.secret,
    )?;

    Ok(ApiResponse::success(RefreshResponse { access_token }))
}

pub async fn logout() -> ApiResult<LogoutResponse> {
    Ok(ApiResponse::success(LogoutResponse {
        message: "Logged out",
    }))
}
