/// Error handling for the API server
///
/// Handlers return [`ApiResult`]; every error renders as the failure envelope
///
/// ```json
/// { "success": false, "message": "...", "error": "bad_request", "details": [...] }
/// ```
///
/// Usage-limit denials carry `limits` and `upgrade_required` alongside the message.
///
/// # Example
///
/// ```
/// use fintrack_api::error::{ApiError, ApiResult};
/// use fintrack_api::response::ApiResponse;
///
/// async fn handler(amount: f64) -> ApiResult<f64> {
///     if amount <= 0.0 {
///         return Err(ApiError::BadRequest("Amount must be positive".to_string()));
///     }
///     Ok(ApiResponse::success(amount))
/// }
/// ```

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use fintrack_shared::auth::{jwt::JwtError, middleware::AuthError, password::PasswordError};
use fintrack_shared::providers::ProviderError;
use fintrack_shared::subscription::SubscriptionError;
use fintrack_shared::usage::{UsageError, UsageLimits};
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<crate::response::ApiResponse<T>, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409), e.g. duplicate email or payment
    Conflict(String),

    /// Field validation failures (400)
    ValidationError(Vec<ValidationErrorDetail>),

    /// Tier usage ceiling reached (429)
    UsageLimitExceeded {
        message: String,
        limits: UsageLimits,
    },

    /// Global request rate limit (429)
    RateLimitExceeded { retry_after: u64, message: String },

    /// Internal server error (500)
    InternalError(String),

    /// A required collaborator is not configured (503)
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Failure envelope
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always `false`
    pub success: bool,

    /// Human-readable message
    pub message: String,

    /// Machine-readable code (e.g. "bad_request", "usage_limit_exceeded")
    pub error: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<UsageLimits>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_required: Option<bool>,
}

impl ErrorResponse {
    fn new(error: &str, message: String) -> Self {
        Self {
            success: false,
            message,
            error: error.to_string(),
            details: None,
            limits: None,
            upgrade_required: None,
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::UsageLimitExceeded { .. } | ApiError::RateLimitExceeded { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Wraps any unexpected error as a 500
    pub fn internal(err: impl fmt::Display) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::UsageLimitExceeded { message, .. } => {
                write!(f, "Usage limit exceeded: {}", message)
            }
            ApiError::RateLimitExceeded { message, .. } => {
                write!(f, "Rate limit exceeded: {}", message)
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (body, retry_after) = match self {
            ApiError::BadRequest(msg) => (ErrorResponse::new("bad_request", msg), None),
            ApiError::Unauthorized(msg) => (ErrorResponse::new("unauthorized", msg), None),
            ApiError::Forbidden(msg) => (ErrorResponse::new("forbidden", msg), None),
            ApiError::NotFound(msg) => (ErrorResponse::new("not_found", msg), None),
            ApiError::Conflict(msg) => (ErrorResponse::new("conflict", msg), None),
            ApiError::ValidationError(errors) => {
                let mut body =
                    ErrorResponse::new("validation_error", "Request validation failed".to_string());
                body.details = Some(errors);
                (body, None)
            }
            ApiError::UsageLimitExceeded { message, limits } => {
                let mut body = ErrorResponse::new("usage_limit_exceeded", message);
                body.limits = Some(limits);
                body.upgrade_required = Some(true);
                (body, None)
            }
            ApiError::RateLimitExceeded {
                retry_after,
                message,
            } => (
                ErrorResponse::new("rate_limit_exceeded", message),
                Some(retry_after),
            ),
            ApiError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    ErrorResponse::new("internal_error", "An internal error occurred".to_string()),
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => {
                (ErrorResponse::new("service_unavailable", msg), None)
            }
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(retry_after) = retry_after {
            response
                .headers_mut()
                .insert("Retry-After", HeaderValue::from(retry_after));
        }
        response
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if let Some(constraint) = db_err.constraint() {
                    if constraint.contains("email") {
                        return ApiError::Conflict("Email already registered".to_string());
                    }
                    if db_err.is_unique_violation() {
                        return ApiError::Conflict(format!("Constraint violation: {}", constraint));
                    }
                }

                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken | AuthError::Expired | AuthError::UserNotFound => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::InvalidToken(_) => ApiError::Forbidden(err.to_string()),
            AuthError::Database(e) => e.into(),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Refresh-token failures: expired is 401, anything else 403
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::ValidationError(_) => ApiError::Forbidden("Invalid token".to_string()),
            JwtError::CreateError(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<UsageError> for ApiError {
    fn from(err: UsageError) -> Self {
        match err {
            UsageError::LimitExceeded(check) => ApiError::UsageLimitExceeded {
                message: check.message,
                limits: check.limits,
            },
            UsageError::UserNotFound(_) => ApiError::Unauthorized("User not found".to_string()),
            UsageError::Database(e) => e.into(),
        }
    }
}

impl From<SubscriptionError> for ApiError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::AlreadyProcessed(_) => {
                ApiError::Conflict("Payment already processed".to_string())
            }
            SubscriptionError::AlreadyFree => {
                ApiError::BadRequest("No active paid subscription to cancel".to_string())
            }
            SubscriptionError::UserNotFound(_) => ApiError::NotFound("User not found".to_string()),
            SubscriptionError::Database(e) => e.into(),
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotConfigured(name) => {
                ApiError::ServiceUnavailable(format!("{} is not configured", name))
            }
            ProviderError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            other => ApiError::InternalError(format!("Provider call failed: {}", other)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::ValidationError(details)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
