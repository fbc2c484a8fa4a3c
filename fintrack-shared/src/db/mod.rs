/// Database layer for FinTrack
///
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: embedded `sqlx` migration runner
///
/// Models live in the crate-level `models` module.
///
/// # Example
///
/// ```no_run
/// use fintrack_shared::db::migrations::run_migrations;
/// use fintrack_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool(DatabaseConfig::from_url(std::env::var("DATABASE_URL")?)).await?;
///     run_migrations(&pool).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;
