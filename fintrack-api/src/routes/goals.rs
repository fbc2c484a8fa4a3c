/// Savings goal endpoints
///
/// ```text
/// POST   /api/goals                 create
/// GET    /api/goals?status=         list with progress and deadline info
/// GET    /api/goals/summary         counts, totals, 5 most recent
/// PUT    /api/goals/:id/progress    add to the saved amount
/// GET    /api/goals/:id/plan        suggested daily/weekly/monthly savings
/// PUT    /api/goals/:id/status      active, completed or paused
/// DELETE /api/goals/:id
/// ```
///
/// A goal moves to `completed` on its own once the saved amount reaches the target.
/// Goals that do not exist and goals owned by someone else are both 404.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{parse_id, ApiJson, ApiQuery},
    response::ApiResponse,
};
use axum::{
    extract::{Path, State},
    Extension,
};
use chrono::{DateTime, NaiveDate, Utc};
use fintrack_shared::{
    auth::middleware::AuthContext,
    calculators::{self, SavingsPlan},
    models::{
        goal::{CreateGoal, Goal, GoalStats, GoalStatus},
        transaction::Transaction,
    },
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Months of income history behind the plan's income share
const INCOME_LOOKBACK_MONTHS: i32 = 3;

const RECENT_GOALS: i64 = 5;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGoalRequest {
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,

    pub target_amount: Decimal,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    pub deadline: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

/// A goal with its derived figures
#[derive(Debug, Serialize)]
pub struct GoalView {
    #[serde(flatten)]
    pub goal: Goal,
    pub progress: Decimal,
    pub days_remaining: Option<i64>,
    pub is_overdue: bool,
}

impl GoalView {
    pub fn new(goal: Goal, now: DateTime<Utc>) -> Self {
        let days_remaining = goal
            .deadline
            .map(|deadline| calculators::days_remaining(deadline, now));

        Self {
            progress: calculators::progress(goal.current_amount, goal.target_amount),
            is_overdue: days_remaining.is_some_and(calculators::is_overdue),
            days_remaining,
            goal,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GoalSummary {
    pub summary: GoalStats,
    pub recent_goals: Vec<GoalView>,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub message: &'static str,
    pub goal: Goal,
    pub progress: Decimal,
    pub is_completed: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

fn parse_status(raw: &str) -> Result<GoalStatus, ApiError> {
    GoalStatus::parse(raw.trim()).ok_or_else(|| {
        ApiError::BadRequest("Status must be one of active, completed, paused".to_string())
    })
}

fn not_found() -> ApiError {
    ApiError::NotFound("Goal not found".to_string())
}

pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateGoalRequest>,
) -> ApiResult<GoalView> {
    req.validate()?;

    if req.target_amount <= Decimal::ZERO {
        return Err(ApiError::BadRequest(
            "Target amount must be greater than zero".to_string(),
        ));
    }

    let goal = Goal::create(
        &state.db,
        CreateGoal {
            user_id: auth.user_id,
            title: req.title.trim().to_string(),
            description: req.description,
            target_amount: req.target_amount.round_dp(2),
            deadline: req.deadline,
        },
    )
    .await?;

    tracing::debug!(user_id = %auth.user_id, goal_id = %goal.id, "Goal created");

    Ok(ApiResponse::created(GoalView::new(goal, Utc::now())))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(filter): ApiQuery<StatusFilter>,
) -> ApiResult<Vec<GoalView>> {
    let status = filter.status.as_deref().map(parse_status).transpose()?;
    let now = Utc::now();

    let goals = Goal::list_by_user(&state.db, auth.user_id, status)
        .await?
        .into_iter()
        .map(|goal| GoalView::new(goal, now))
        .collect();

    Ok(ApiResponse::success(goals))
}

pub async fn summary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<GoalSummary> {
    let stats = Goal::stats(&state.db, auth.user_id).await?;
    let now = Utc::now();

    let recent_goals = Goal::recent(&state.db, auth.user_id, RECENT_GOALS)
        .await?
        .into_iter()
        .map(|goal| GoalView::new(goal, now))
        .collect();

    Ok(ApiResponse::success(GoalSummary {
        summary: stats,
        recent_goals,
    }))
}

pub async fn add_progress(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ProgressRequest>,
) -> ApiResult<ProgressResponse> {
    let id = parse_id(&id, "goal")?;

    if req.amount <= Decimal::ZERO {
        return Err(ApiError::BadRequest(
            "Amount must be greater than zero".to_string(),
        ));
    }

    let goal = Goal::add_progress(&state.db, id, auth.user_id, req.amount.round_dp(2))
        .await?
        .ok_or_else(not_found)?;

    let is_completed = goal.is_completed();
    if is_completed {
        tracing::info!(user_id = %auth.user_id, goal_id = %goal.id, "Goal completed");
    }

    Ok(ApiResponse::success(ProgressResponse {
        message: if is_completed {
            "Goal completed!"
        } else {
            "Progress updated"
        },
        progress: calculators::progress(goal.current_amount, goal.target_amount),
        is_completed,
        goal,
    }))
}

pub async fn savings_plan(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<SavingsPlan> {
    let id = parse_id(&id, "goal")?;

    let goal = Goal::find_owned(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(not_found)?;

    let avg_income =
        Transaction::average_monthly_income(&state.db, auth.user_id, INCOME_LOOKBACK_MONTHS)
            .await?;

    let days_remaining = goal
        .deadline
        .map(|deadline| calculators::days_remaining(deadline, Utc::now()));

    Ok(ApiResponse::success(calculators::savings_plan(
        goal.current_amount,
        goal.target_amount,
        days_remaining,
        avg_income,
    )))
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> ApiResult<Goal> {
    let id = parse_id(&id, "goal")?;
    let status = parse_status(&req.status)?;

    let goal = Goal::set_status(&state.db, id, auth.user_id, status)
        .await?
        .ok_or_else(not_found)?;

    Ok(ApiResponse::success(goal))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<MessageResponse> {
    let id = parse_id(&id, "goal")?;

    if !Goal::delete_owned(&state.db, id, auth.user_id).await? {
        return Err(not_found());
    }

    Ok(ApiResponse::success(MessageResponse {
        message: "Goal deleted successfully",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn goal(current: i64, target: i64, deadline: Option<NaiveDate>) -> Goal {
        let now = Utc::now();
        Goal {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Vacation".to_string(),
            description: None,
            target_amount: Decimal::from(target),
            current_amount: Decimal::from(current),
            deadline,
            status: "active".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_view_of_overdue_goal() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let view = GoalView::new(
            goal(250, 1000, NaiveDate::from_ymd_opt(2024, 3, 1)),
            now,
        );

        assert_eq!(view.progress, Decimal::from(25));
        assert!(view.is_overdue);
        assert!(view.days_remaining.unwrap() < 0);
    }

    #[test]
    fn test_view_without_deadline() {
        let view = GoalView::new(goal(1200, 1000, None), Utc::now());

        assert_eq!(view.progress, Decimal::from(100));
        assert_eq!(view.days_remaining, None);
        assert!(!view.is_overdue);
    }

    #[test]
    fn test_view_serializes_flat() {
        let value = serde_json::to_value(GoalView::new(goal(0, 10, None), Utc::now())).unwrap();
        assert!(value.get("title").is_some());
        assert!(value.get("progress").is_some());
        assert!(value.get("goal").is_none());
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("paused").unwrap(), GoalStatus::Paused);
        assert!(parse_status("archived").is_err());
    }
}
