/// JWT token generation and validation module
///
/// Tokens are signed with HS256 (HMAC-SHA256). Access and refresh tokens use separate
/// secrets, so a leaked refresh secret cannot mint access tokens and vice versa.
///
/// # Token Types
///
/// - **Access Token**: Short-lived (15 minutes), sent as `Authorization: Bearer <token>`
/// - **Refresh Token**: Long-lived (7 days), exchanged for a new access token
///
/// # Example
///
/// ```
/// use fintrack_shared::auth::jwt::{create_token, validate_access_token, Claims, TokenType};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let user_id = Uuid::new_v4();
///
/// let claims = Claims::new(user_id, TokenType::Access);
/// let token = create_token(&claims, "your-secret-key")?;
///
/// let validated = validate_access_token(&token, "your-secret-key")?;
/// assert_eq!(validated.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Issuer claim on every token
pub const ISSUER: &str = "fintrack";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Signature, format, issuer or token type check failed
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,
}

/// Token type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    /// Gets default expiration duration for token type
    pub fn default_expiration(&self) -> Duration {
        match self {
            TokenType::Access => Duration::minutes(15),
            TokenType::Refresh => Duration::days(7),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims
///
/// - `sub`: User ID
/// - `iss`: Always "fintrack"
/// - `iat` / `exp` / `nbf`: Unix timestamps
/// - `token_type`: Access or refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub token_type: TokenType,
}

impl Claims {
    /// Creates new claims with the token type's default expiration
    pub fn new(user_id: Uuid, token_type: TokenType) -> Self {
        Self::with_expiration(user_id, token_type, token_type.default_expiration())
    }

    /// Creates claims with custom expiration
    ///
    /// # Example
    ///
    /// ```
    /// use fintrack_shared::auth::jwt::{Claims, TokenType};
    /// use chrono::Duration;
    /// use uuid::Uuid;
    ///
    /// let claims = Claims::with_expiration(Uuid::new_v4(), TokenType::Access, Duration::hours(1));
    /// assert!(!claims.is_expired());
    /// ```
    pub fn with_expiration(user_id: Uuid, token_type: TokenType, expires_in: Duration) -> Self {
        let now = Utc::now();
        let expiration = now + expires_in;

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            nbf: now.timestamp(),
            token_type,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Seconds until expiration, `None` once expired
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let now = Utc::now().timestamp();
        if self.exp > now {
            Some(Duration::seconds(self.exp - now))
        } else {
            None
        }
    }
}

/// Signs claims with HS256
///
/// # Errors
///
/// Returns `JwtError::CreateError` if encoding fails
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates a JWT token and extracts claims
///
/// Verifies the signature, expiration, `nbf` and the `fintrack` issuer. The token type is
/// not checked here; use [`validate_access_token`] or [`validate_refresh_token`].
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}

fn validate_typed(token: &str, secret: &str, expected: TokenType) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;

    if claims.token_type != expected {
        return Err(JwtError::ValidationError(format!(
            "Expected {} token, got {} token",
            expected.as_str(),
            claims.token_type.as_str()
        )));
    }

    Ok(claims)
}

/// Validates token and checks it's an access token
pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(token, secret, TokenType::Access)
}

/// Validates token and checks it's a refresh token
pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(token, secret, TokenType::Refresh)
}

/// Access and refresh token pair handed out on register and login
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues a fresh access/refresh pair for a user
pub fn issue_token_pair(
    user_id: Uuid,
    access_secret: &str,
    refresh_secret: &str,
) -> Result<TokenPair, JwtError> {
    Ok(TokenPair {
        access_token: create_token(&Claims::new(user_id, TokenType::Access), access_secret)?,
        refresh_token: create_token(&Claims::new(user_id, TokenType::Refresh), refresh_secret)?,
    })
}

/// Exchanges a refresh token (signed with `refresh_secret`) for a new access token
///
/// # Example
///
/// ```
/// use fintrack_shared::auth::jwt::{create_token, refresh_access_token, Claims, TokenType};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let refresh = create_token(&Claims::new(Uuid::new_v4(), TokenType::Refresh), "refresh")?;
/// let access = refresh_access_token(&refresh, "refresh", "access")?;
/// assert!(!access.is_empty());
/// # Ok(())
/// # }
/// ```
pub fn refresh_access_token(
    refresh_token: &str,
    refresh_secret: &str,
    access_secret: &str,
) -> Result<String, JwtError> {
    let refresh_claims = validate_refresh_token(refresh_token, refresh_secret)?;
    let access_claims = Claims::new(refresh_claims.sub, TokenType::Access);

    create_token(&access_claims, access_secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS: &str = "test-access-secret-at-least-32-bytes-long";
    const REFRESH: &str = "test-refresh-secret-at-least-32-bytes-long";

    #[test]
    fn test_token_type_expiration() {
        assert_eq!(TokenType::Access.default_expiration(), Duration::minutes(15));
        assert_eq!(TokenType::Refresh.default_expiration(), Duration::days(7));
    }

    #[test]
    fn test_claims_creation() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, TokenType::Access);

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "fintrack");
        assert_eq!(claims.token_type, TokenType::Access);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_create_and_validate_token() {
        let user_id = Uuid::new_v4();
        let token = create_token(&Claims::new(user_id, TokenType::Access), ACCESS).unwrap();

        let validated = validate_access_token(&token, ACCESS).unwrap();
        assert_eq!(validated.sub, user_id);
        assert_eq!(validated.iss, "fintrack");
    }

    #[test]
    fn test_validate_with_wrong_secret() {
        let token = create_token(&Claims::new(Uuid::new_v4(), TokenType::Access), ACCESS).unwrap();
        assert!(matches!(
            validate_token(&token, "wrong-secret"),
            Err(JwtError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_expired_token() {
        let claims =
            Claims::with_expiration(Uuid::new_v4(), TokenType::Access, Duration::seconds(-3600));
        assert!(claims.is_expired());
        assert!(claims.time_until_expiration().is_none());

        let token = create_token(&claims, ACCESS).unwrap();
        assert!(matches!(validate_token(&token, ACCESS), Err(JwtError::Expired)));
    }

    #[test]
    fn test_token_type_is_enforced() {
        let refresh = create_token(&Claims::new(Uuid::new_v4(), TokenType::Refresh), ACCESS).unwrap();
        assert!(validate_access_token(&refresh, ACCESS).is_err());

        let access = create_token(&Claims::new(Uuid::new_v4(), TokenType::Access), REFRESH).unwrap();
        assert!(validate_refresh_token(&access, REFRESH).is_err());
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let mut claims = Claims::new(Uuid::new_v4(), TokenType::Access);
        claims.iss = "someone-else".to_string();
        let token = create_token(&claims, ACCESS).unwrap();

        assert!(validate_token(&token, ACCESS).is_err());
    }

    #[test]
    fn test_token_pair_uses_separate_secrets() {
        let user_id = Uuid::new_v4();
        let pair = issue_token_pair(user_id, ACCESS, REFRESH).unwrap();

        assert_eq!(validate_access_token(&pair.access_token, ACCESS).unwrap().sub, user_id);
        assert_eq!(validate_refresh_token(&pair.refresh_token, REFRESH).unwrap().sub, user_id);
        assert!(validate_refresh_token(&pair.refresh_token, ACCESS).is_err());
    }

    #[test]
    fn test_refresh_access_token() {
        let user_id = Uuid::new_v4();
        let refresh = create_token(&Claims::new(user_id, TokenType::Refresh), REFRESH).unwrap();

        let access = refresh_access_token(&refresh, REFRESH, ACCESS).unwrap();
        let validated = validate_access_token(&access, ACCESS).unwrap();
        assert_eq!(validated.sub, user_id);
    }

    #[test]
    fn test_refresh_with_access_token_fails() {
        let access = create_token(&Claims::new(Uuid::new_v4(), TokenType::Access), REFRESH).unwrap();
        assert!(refresh_access_token(&access, REFRESH, ACCESS).is_err());
    }
}
