/// Market refresh bookkeeping: the singleton `scraping_config` row and `scraping_logs`
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::market_data::MarketType;

pub const SCRAPING_CONFIG_ID: i32 = 1;
pub const DEFAULT_UPDATE_INTERVAL_MINUTES: i32 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScrapingConfig {
    pub id: i32,
    pub last_crypto_update: Option<DateTime<Utc>>,
    pub last_stocks_update: Option<DateTime<Utc>>,
    pub scraping_enabled: bool,
    pub update_interval_minutes: i32,
    pub updated_at: DateTime<Utc>,
}

impl ScrapingConfig {
    pub async fn load<'e>(executor: impl PgExecutor<'e>) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ScrapingConfig>(
            r#"
            SELECT id, last_crypto_update, last_stocks_update, scraping_enabled,
                   update_interval_minutes, updated_at
            FROM scraping_config
            WHERE id = $1
            "#,
        )
        .bind(SCRAPING_CONFIG_ID)
        .fetch_optional(executor)
        .await
    }

    /// Inserts the default row if missing; returns true when a row was created
    pub async fn ensure_default<'e>(executor: impl PgExecutor<'e>) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO scraping_config (id, scraping_enabled, update_interval_minutes)
            VALUES ($1, TRUE, $2)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(SCRAPING_CONFIG_ID)
        .bind(DEFAULT_UPDATE_INTERVAL_MINUTES)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Stamps the last refresh time for one market type
    pub async fn touch<'e>(
        executor: impl PgExecutor<'e>,
        kind: MarketType,
    ) -> Result<(), sqlx::Error> {
        let column = match kind {
            MarketType::Crypto => "last_crypto_update",
            MarketType::Stocks => "last_stocks_update",
            MarketType::Forex => return Ok(()),
        };

        sqlx::query(&format!(
            "UPDATE scraping_config SET {column} = NOW(), updated_at = NOW() WHERE id = $1"
        ))
        .bind(SCRAPING_CONFIG_ID)
        .execute(executor)
        .await?;

        Ok(())
    }
}

/// Scope of one refresh run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeScope {
    Crypto,
    Stocks,
    Forex,
    Full,
}

impl ScrapeScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeScope::Crypto => "crypto",
            ScrapeScope::Stocks => "stocks",
            ScrapeScope::Forex => "forex",
            ScrapeScope::Full => "full",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStatus {
    Success,
    Error,
    Partial,
}

impl ScrapeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeStatus::Success => "success",
            ScrapeStatus::Error => "error",
            ScrapeStatus::Partial => "partial",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScrapingLog {
    pub id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub scope: String,
    pub status: String,
    pub records_updated: i32,
    pub error_message: Option<String>,
    pub execution_time_ms: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateScrapingLog {
    pub scope: ScrapeScope,
    pub status: ScrapeStatus,
    pub records_updated: i32,
    pub error_message: Option<String>,
    pub execution_time_ms: i64,
}

impl ScrapingLog {
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        data: CreateScrapingLog,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ScrapingLog>(
            r#"
            INSERT INTO scraping_logs (type, status, records_updated, error_message, execution_time_ms)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, type, status, records_updated, error_message, execution_time_ms, created_at
            "#,
        )
        .bind(data.scope.as_str())
        .bind(data.status.as_str())
        .bind(data.records_updated)
        .bind(data.error_message)
        .bind(data.execution_time_ms)
        .fetch_one(executor)
        .await
    }

    pub async fn purge_before<'e>(
        executor: impl PgExecutor<'e>,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM scraping_logs WHERE created_at < $1")
            .bind(cutoff)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}
