/// Database models for FinTrack
///
/// Each model is a `sqlx::FromRow` row type with its queries as associated functions.
/// Functions that take `impl PgExecutor<'e>` run against either the pool or an open
/// transaction (`&mut *tx`).
///
/// # Models
///
/// - `user`: Accounts, subscription tier and chat question counter
/// - `transaction`: Income and expense ledger entries
/// - `goal`: Savings goals and their progress
/// - `reminder`: Bill reminders, optionally recurring
/// - `market_data`: Latest crypto and stock snapshots
/// - `investment_analysis`: Per-symbol buy/sell/hold recommendations
/// - `personalized_analysis`: Stored AI portfolio analyses
/// - `ai_conversation`: Chat history
/// - `ai_usage`: Metered AI calls
/// - `payment`: Confirmed subscription payments
/// - `scraping`: Market refresh configuration and run log
///
/// # Example
///
/// ```no_run
/// use fintrack_shared::models::user::{CreateUser, User};
/// use fintrack_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(
///     &pool,
///     CreateUser {
///         email: "user@example.com".to_string(),
///         password_hash: "$argon2id$...".to_string(),
///         name: Some("Jane Doe".to_string()),
///     },
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```

pub mod ai_conversation;
pub mod ai_usage;
pub mod goal;
pub mod investment_analysis;
pub mod market_data;
pub mod payment;
pub mod personalized_analysis;
pub mod reminder;
pub mod scraping;
pub mod transaction;
pub mod user;
