/// Configuration management for the API server
///
/// Loaded once at startup from the environment (a `.env` file is read first when present).
///
/// # Environment Variables
///
/// - `API_HOST` (default `0.0.0.0`), `PORT` (default `5001`)
/// - `DATABASE_URL` (required), `DB_POOL_LIMIT` (default `10`)
/// - `JWT_SECRET`, `JWT_REFRESH_SECRET` (required, at least 32 characters, distinct)
/// - `CORS_ORIGINS` (default `*`), `PRODUCTION` (default `false`)
/// - `REDIS_URL`: enables the global rate limiter
/// - `STRIPE_SECRET_KEY`, `STRIPE_WEBHOOK_SECRET`: payments and webhook verification
/// - `OPENROUTER`, `OPENROUTER_MODEL`: LLM completions
/// - `HTTP_TIMEOUT_SECS` (default `30`): outbound provider timeout
///
/// # Example
///
/// ```no_run
/// use fintrack_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use fintrack_shared::providers::openrouter::DEFAULT_MODEL;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Minimum length of each JWT secret
pub const MIN_SECRET_LENGTH: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub providers: ProviderConfig,

    /// Enables the global rate limiter when set
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `["*"]` allows any origin
    pub cors_origins: Vec<String>,

    /// Enables HSTS
    pub production: bool,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Signs access tokens
    pub secret: String,

    /// Signs refresh tokens
    pub refresh_secret: String,
}

/// Credentials for the external collaborators; unset ones disable their endpoints
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub openrouter_model: String,
    pub http_timeout: Duration,
}

/// Reads an optional variable, treating an empty value as unset
fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn required(name: &str) -> anyhow::Result<String> {
    optional(name).ok_or_else(|| anyhow::anyhow!("{} environment variable is required", name))
}

fn parsed<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", name, raw, e)),
        None => Ok(default),
    }
}

/// Splits a comma-separated origin list, dropping blanks
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Fails when a required variable is missing, a value does not parse, or the JWT secrets
    /// are too short or identical.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            refresh_secret: required("JWT_REFRESH_SECRET")?,
        };
        jwt.validate()?;

        let cors_origins = parse_origins(&optional("CORS_ORIGINS").unwrap_or_else(|| "*".into()));

        Ok(Self {
            api: ApiConfig {
                host: optional("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parsed("PORT", 5001u16)?,
                cors_origins,
                production: parsed("PRODUCTION", false)?,
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                max_connections: parsed("DB_POOL_LIMIT", 10u32)?,
            },
            jwt,
            providers: ProviderConfig {
                stripe_secret_key: optional("STRIPE_SECRET_KEY"),
                stripe_webhook_secret: optional("STRIPE_WEBHOOK_SECRET"),
                openrouter_api_key: optional("OPENROUTER"),
                openrouter_model: optional("OPENROUTER_MODEL")
                    .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                http_timeout: Duration::from_secs(parsed("HTTP_TIMEOUT_SECS", 30u64)?),
            },
            redis_url: optional("REDIS_URL"),
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

impl JwtConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.secret.len() < MIN_SECRET_LENGTH {
            anyhow::bail!("JWT_SECRET must be at least {} characters long", MIN_SECRET_LENGTH);
        }
        if self.refresh_secret.len() < MIN_SECRET_LENGTH {
            anyhow::bail!(
                "JWT_REFRESH_SECRET must be at least {} characters long",
                MIN_SECRET_LENGTH
            );
        }
        if self.secret == self.refresh_secret {
            anyhow::bail!("JWT_SECRET and JWT_REFRESH_SECRET must differ");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt(secret: &str, refresh: &str) -> JwtConfig {
        JwtConfig {
            secret: secret.to_string(),
            refresh_secret: refresh.to_string(),
        }
    }

    #[test]
    fn test_bind_address() {
        let config = Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 5001,
                cors_origins: vec!["*".to_string()],
                production: false,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/test".to_string(),
                max_connections: 10,
            },
            jwt: jwt(&"a".repeat(32), &"b".repeat(32)),
            providers: ProviderConfig {
                stripe_secret_key: None,
                stripe_webhook_secret: None,
                openrouter_api_key: None,
                openrouter_model: DEFAULT_MODEL.to_string(),
                http_timeout: Duration::from_secs(30),
            },
            redis_url: None,
        };

        assert_eq!(config.bind_address(), "127.0.0.1:5001");
    }

    #[test]
    fn test_jwt_secret_rules() {
        assert!(jwt(&"a".repeat(32), &"b".repeat(32)).validate().is_ok());
        assert!(jwt("short", &"b".repeat(32)).validate().is_err());
        assert!(jwt(&"a".repeat(32), "short").validate().is_err());
        assert!(jwt(&"a".repeat(32), &"a".repeat(32)).validate().is_err());
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(parse_origins("*"), vec!["*"]);
        assert_eq!(
            parse_origins("http://localhost:3000, https://app.example.com,"),
            vec!["http://localhost:3000", "https://app.example.com"]
        );
    }
}
