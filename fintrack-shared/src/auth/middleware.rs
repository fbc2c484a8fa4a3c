/// Bearer-token authentication for Axum
///
/// [`authenticate`] validates the `Authorization: Bearer <token>` access token and loads the
/// user row to pick up the current subscription tier and chat counter. The API's middleware
/// inserts the resulting [`AuthContext`] into the request extensions.
///
/// | Failure                         | Status | Message            |
/// |---------------------------------|--------|--------------------|
/// | header or token missing         | 401    | `Token required`   |
/// | token expired                   | 401    | `Token expired`    |
/// | any other verification failure  | 403    | `Invalid token`    |
/// | user row gone                   | 401    | `User not found`   |
///
/// # Example
///
/// ```no_run
/// use axum::http::HeaderMap;
/// use fintrack_shared::auth::middleware::{authenticate, AuthError};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, headers: HeaderMap) -> Result<(), AuthError> {
/// let auth = authenticate(&pool, "secret", &headers).await?;
/// println!("{} ({})", auth.user_id, auth.tier);
/// # Ok(())
/// # }
/// ```

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::jwt::{validate_access_token, JwtError};
use crate::models::user::{SubscriptionTier, User};

/// Authenticated caller, attached to request extensions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,

    /// Tier read from the user row at authentication time
    pub tier: SubscriptionTier,

    /// Lifetime chat counter at authentication time
    pub ai_questions_used: i32,
}

impl AuthContext {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            tier: user.tier(),
            ai_questions_used: user.ai_questions_used,
        }
    }

    /// `premium` or `premium+`
    pub fn is_premium(&self) -> bool {
        self.tier.is_paid()
    }

    pub fn is_premium_plus(&self) -> bool {
        self.tier == SubscriptionTier::PremiumPlus
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token required")]
    MissingToken,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    InvalidToken(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingToken | AuthError::Expired | AuthError::UserNotFound => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::InvalidToken(_) => StatusCode::FORBIDDEN,
            AuthError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::Expired,
            other => AuthError::InvalidToken(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Database error during authentication");
                "Internal server error".to_string()
            }
            AuthError::InvalidToken(reason) => {
                tracing::debug!(reason = %reason, "Rejected bearer token");
                self.to_string()
            }
            _ => self.to_string(),
        };

        let body = serde_json::json!({
            "success": false,
            "message": message,
            "error": status.canonical_reason().unwrap_or("Error"),
        });

        (status, Json(body)).into_response()
    }
}

/// Extracts the bearer token; an empty token counts as missing
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Validates the request's bearer token and loads the caller
pub async fn authenticate(
    pool: &PgPool,
    secret: &str,
    headers: &HeaderMap,
) -> Result<AuthContext, AuthError> {
    let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;
    let claims = validate_access_token(token, secret)?;

    let user = User::find_by_id(pool, claims.sub)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    Ok(AuthContext::from_user(&user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn context(tier: SubscriptionTier) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            tier,
            ai_questions_used: 0,
        }
    }

    #[test]
    fn test_tier_predicates() {
        assert!(!context(SubscriptionTier::Free).is_premium());
        assert!(context(SubscriptionTier::Premium).is_premium());
        assert!(context(SubscriptionTier::PremiumPlus).is_premium());

        assert!(!context(SubscriptionTier::Premium).is_premium_plus());
        assert!(context(SubscriptionTier::PremiumPlus).is_premium_plus());
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }

    #[test]
    fn test_auth_error_statuses() {
        assert_eq!(AuthError::MissingToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::Expired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::UserNotFound.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::InvalidToken("bad signature".into()).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_jwt_error_mapping() {
        assert!(matches!(AuthError::from(JwtError::Expired), AuthError::Expired));
        assert!(matches!(
            AuthError::from(JwtError::ValidationError("x".into())),
            AuthError::InvalidToken(_)
        ));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_before_database() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgresql://localhost:1/fintrack")
            .unwrap();
        let mut headers = HeaderMap::new();

        let missing = authenticate(&pool, "secret", &headers).await;
        assert!(matches!(missing, Err(AuthError::MissingToken)));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer not.a.jwt"));
        let invalid = authenticate(&pool, "secret", &headers).await;
        assert!(matches!(invalid, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_auth_error_messages() {
        assert_eq!(AuthError::MissingToken.to_string(), "Token required");
        assert_eq!(AuthError::Expired.to_string(), "Token expired");
        assert_eq!(AuthError::InvalidToken("x".into()).to_string(), "Invalid token");
        assert_eq!(AuthError::UserNotFound.to_string(), "User not found");
    }
}
