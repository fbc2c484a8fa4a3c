/// User model and database operations
///
/// Users own every other row in the system. Besides credentials, a user row carries the
/// subscription tier and the lifetime AI-question counter that the usage limiter reads.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email VARCHAR(255) NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     name VARCHAR(255),
///     subscription_type VARCHAR(16) NOT NULL DEFAULT 'free',
///     ai_questions_used INTEGER NOT NULL DEFAULT 0,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use fintrack_shared::models::user::{CreateUser, User};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(
///     &pool,
///     CreateUser {
///         email: "user@example.com".to_string(),
///         password_hash: "$argon2id$...".to_string(),
///         name: Some("Ada".to_string()),
///     },
/// )
/// .await?;
///
/// let found = User::find_by_email(&pool, "user@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

/// Subscription tier
///
/// Stored as `free`, `premium` or `premium+` in `users.subscription_type` and snapshotted
/// into `ai_usage.subscription_type` on every metered call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionTier {
    #[serde(rename = "free")]
    Free,

    #[serde(rename = "premium")]
    Premium,

    #[serde(rename = "premium+")]
    PremiumPlus,
}

impl SubscriptionTier {
    /// Converts tier to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Premium => "premium",
            SubscriptionTier::PremiumPlus => "premium+",
        }
    }

    /// Parses tier from its stored representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "free" => Some(SubscriptionTier::Free),
            "premium" => Some(SubscriptionTier::Premium),
            "premium+" => Some(SubscriptionTier::PremiumPlus),
            _ => None,
        }
    }

    /// True for every paid tier
    pub fn is_paid(&self) -> bool {
        !matches!(self, SubscriptionTier::Free)
    }
}

impl std::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,

    /// Email address, unique across users
    pub email: String,

    /// Argon2id password hash, never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    /// Optional display name
    pub name: Option<String>,

    /// Subscription tier as stored (`free`, `premium`, `premium+`)
    pub subscription_type: String,

    /// Lifetime count of AI chat questions, reset only by an upgrade
    pub ai_questions_used: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Typed subscription tier
    ///
    /// Unknown values (which the table's CHECK constraint rules out) degrade to `Free`.
    pub fn tier(&self) -> SubscriptionTier {
        SubscriptionTier::parse(&self.subscription_type).unwrap_or(SubscriptionTier::Free)
    }
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,

    pub name: Option<String>,
}

const USER_COLUMNS: &str = "id, email, password_hash, name, subscription_type, ai_questions_used, created_at, updated_at";

impl User {
    /// Creates a new user on the free tier
    ///
    /// # Errors
    ///
    /// Returns an error if the email already exists (unique violation on
    /// `users_email_key`) or the database is unreachable.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, name)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(data.email.to_lowercase())
        .bind(data.password_hash)
        .bind(data.name)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by ID
    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(user)
    }

    /// Finds a user by email address (case-insensitive)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.to_lowercase())
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Loads a user and locks the row until the surrounding transaction ends
    ///
    /// Metered operations take this lock first so that concurrent requests from the same
    /// user serialize their check-then-record sequence.
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(user)
    }

    /// Sets the subscription tier
    ///
    /// When `reset_questions` is true the lifetime AI-question counter returns to zero,
    /// which only a paid upgrade is allowed to do.
    pub async fn set_subscription<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
        tier: SubscriptionTier,
        reset_questions: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET subscription_type = $2,
                ai_questions_used = CASE WHEN $3 THEN 0 ELSE ai_questions_used END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(tier.as_str())
        .bind(reset_questions)
        .fetch_optional(executor)
        .await?;

        Ok(user)
    }

    /// Increments the lifetime AI-question counter and returns the new value
    pub async fn increment_ai_questions<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
    ) -> Result<i32, sqlx::Error> {
        let used: i32 = sqlx::query_scalar(
            r#"
            UPDATE users
            SET ai_questions_used = ai_questions_used + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING ai_questions_used
            "#,
        )
        .bind(id)
        .fetch_one(executor)
        .await?;

        Ok(used)
    }

    /// Deletes a user and, by cascade, everything the user owns
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
