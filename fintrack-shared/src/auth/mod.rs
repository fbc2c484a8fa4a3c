/// Authentication primitives
///
/// - [`password`]: Argon2id password hashing and the registration password policy
/// - [`jwt`]: HS256 access and refresh tokens
/// - [`middleware`]: Axum bearer-token guard producing an [`middleware::AuthContext`]
///
/// # Example
///
/// ```no_run
/// use fintrack_shared::auth::jwt::issue_token_pair;
/// use fintrack_shared::auth::password::{hash_password, verify_password};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("savings2024")?;
/// assert!(verify_password("savings2024", &hash)?);
///
/// let tokens = issue_token_pair(Uuid::new_v4(), "access-secret", "refresh-secret")?;
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod middleware;
pub mod password;
