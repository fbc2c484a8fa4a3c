/// Savings goals
///
/// A goal tracks progress toward a target amount. Adding progress that reaches the target
/// flips the goal to `completed` in the same statement; `active` and `paused` toggle only
/// by explicit request.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    Active,
    Completed,
    Paused,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::Completed => "completed",
            GoalStatus::Paused => "paused",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(GoalStatus::Active),
            "completed" => Some(GoalStatus::Completed),
            "paused" => Some(GoalStatus::Paused),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub target_amount: Decimal,
    pub current_amount: Decimal,
    pub deadline: Option<NaiveDate>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Goal {
    pub fn is_completed(&self) -> bool {
        self.current_amount >= self.target_amount
    }
}

#[derive(Debug, Clone)]
pub struct CreateGoal {
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub target_amount: Decimal,
    pub deadline: Option<NaiveDate>,
}

/// Per-status counts and totals across a user's goals
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GoalStats {
    pub total_goals: i64,
    pub active_goals: i64,
    pub completed_goals: i64,
    pub paused_goals: i64,
    pub total_target: Decimal,
    pub total_current: Decimal,
    /// Mean progress percentage of active goals, absent when none are active
    pub avg_progress: Option<Decimal>,
}

const GOAL_COLUMNS: &str =
    "id, user_id, title, description, target_amount, current_amount, deadline, status, created_at, updated_at";

impl Goal {
    pub async fn create(pool: &PgPool, data: CreateGoal) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Goal>(&format!(
            r#"
            INSERT INTO goals (user_id, title, description, target_amount, deadline)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {GOAL_COLUMNS}
            "#
        ))
        .bind(data.user_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.target_amount)
        .bind(data.deadline)
        .fetch_one(pool)
        .await
    }

    /// Lists a user's goals, newest first, optionally filtered by status
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: Uuid,
        status: Option<GoalStatus>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Goal>(&format!(
            r#"
            SELECT {GOAL_COLUMNS} FROM goals
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#
        ))
        .bind(user_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(pool)
        .await
    }

    /// Finds a goal owned by `user_id`
    pub async fn find_owned(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Goal>(&format!(
            "SELECT {GOAL_COLUMNS} FROM goals WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Adds `amount` to the current amount, completing the goal when it reaches the target
    ///
    /// Returns `None` when the goal does not exist or belongs to someone else.
    pub async fn add_progress(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        amount: Decimal,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Goal>(&format!(
            r#"
            UPDATE goals
            SET current_amount = current_amount + $3,
                status = CASE
                    WHEN current_amount + $3 >= target_amount THEN 'completed'
                    ELSE status
                END,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {GOAL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(amount)
        .fetch_optional(pool)
        .await
    }

    pub async fn set_status(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        status: GoalStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Goal>(&format!(
            r#"
            UPDATE goals SET status = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {GOAL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(status.as_str())
        .fetch_optional(pool)
        .await
    }

    pub async fn delete_owned(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM goals WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Active goals, nearest deadline first (used for AI context)
    pub async fn active(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Goal>(&format!(
            r#"
            SELECT {GOAL_COLUMNS} FROM goals
            WHERE user_id = $1 AND status = 'active'
            ORDER BY deadline ASC NULLS LAST, created_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn recent(pool: &PgPool, user_id: Uuid, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Goal>(&format!(
            "SELECT {GOAL_COLUMNS} FROM goals WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn stats(pool: &PgPool, user_id: Uuid) -> Result<GoalStats, sqlx::Error> {
        sqlx::query_as::<_, GoalStats>(
            r#"
            SELECT
                COUNT(*) AS total_goals,
                COUNT(*) FILTER (WHERE status = 'active') AS active_goals,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed_goals,
                COUNT(*) FILTER (WHERE status = 'paused') AS paused_goals,
                COALESCE(SUM(target_amount), 0) AS total_target,
                COALESCE(SUM(current_amount), 0) AS total_current,
                ROUND(AVG(LEAST(current_amount / target_amount * 100, 100))
                    FILTER (WHERE status = 'active'), 2) AS avg_progress
            FROM goals
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_status_parse() {
        assert_eq!(GoalStatus::parse("paused"), Some(GoalStatus::Paused));
        assert_eq!(GoalStatus::parse("archived"), None);
        assert_eq!(GoalStatus::Completed.as_str(), "completed");
    }

    #[test]
    fn test_is_completed_at_exact_target() {
        let goal = Goal {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Emergency fund".to_string(),
            description: None,
            target_amount: Decimal::new(1000, 0),
            current_amount: Decimal::new(1000, 0),
            deadline: None,
            status: "completed".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(goal.is_completed());
    }
}
