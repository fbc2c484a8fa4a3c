/// Metered AI usage log
///
/// Append-only: one row per permitted metered call, with the caller's tier snapshotted at
/// call time. The usage limiter counts these rows to enforce per-tier windows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::user::SubscriptionTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageType {
    MarketAnalysis,
    Chat,
    InvestmentAdvice,
}

impl UsageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageType::MarketAnalysis => "market_analysis",
            UsageType::Chat => "chat",
            UsageType::InvestmentAdvice => "investment_advice",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AiUsage {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub subscription_type: String,
    pub created_at: DateTime<Utc>,
}

/// Count of usage rows of one type
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UsageCount {
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub count: i64,
}

impl AiUsage {
    /// Appends a usage row with the tier snapshot
    pub async fn record<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
        kind: UsageType,
        tier: SubscriptionTier,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AiUsage>(
            r#"
            INSERT INTO ai_usage (user_id, type, subscription_type)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, type, subscription_type, created_at
            "#,
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(tier.as_str())
        .fetch_one(executor)
        .await
    }

    /// Counts rows of `kind` created at or after `since`
    pub async fn count_since<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
        kind: UsageType,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM ai_usage
            WHERE user_id = $1 AND type = $2 AND created_at >= $3
            "#,
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(since)
        .fetch_one(executor)
        .await
    }

    /// Per-type counts of rows created at or after `since`
    pub async fn counts_by_type<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<UsageCount>, sqlx::Error> {
        sqlx::query_as::<_, UsageCount>(
            r#"
            SELECT type, COUNT(*) AS count FROM ai_usage
            WHERE user_id = $1 AND created_at >= $2
            GROUP BY type
            ORDER BY type
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(executor)
        .await
    }

    /// Deletes rows older than `cutoff`, returning how many were removed
    pub async fn purge_before<'e>(
        executor: impl PgExecutor<'e>,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM ai_usage WHERE created_at < $1")
            .bind(cutoff)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_type_storage_form() {
        assert_eq!(UsageType::MarketAnalysis.as_str(), "market_analysis");
        assert_eq!(
            serde_json::to_string(&UsageType::InvestmentAdvice).unwrap(),
            "\"investment_advice\""
        );
    }
}
