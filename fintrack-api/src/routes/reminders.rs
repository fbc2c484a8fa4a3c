/// Payment reminder endpoints
///
/// ```text
/// POST   /api/reminders                  create
/// GET    /api/reminders?status=          list by due date
/// GET    /api/reminders/upcoming?days=7  pending, due within the next `days`
/// GET    /api/reminders/notifications    pending, inside their own notification window
/// GET    /api/reminders/summary          counts plus next 5 pending
/// PUT    /api/reminders/:id/complete     complete; recurring ones spawn a successor
/// PUT    /api/reminders/:id              partial update
/// DELETE /api/reminders/:id
/// ```

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
    calculators,
    models::reminder::{
        CompletedReminder, CreateReminder, RecurrenceType, Reminder, ReminderStats,
        ReminderStatus, UpdateReminder, DEFAULT_REMINDER_DAYS,
    },
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

const DEFAULT_UPCOMING_DAYS: i32 = 7;
const MAX_UPCOMING_DAYS: i32 = 365;
const NEXT_PENDING: i64 = 5;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReminderRequest {
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,

    pub due_date: NaiveDate,

    pub description: Option<String>,

    pub amount: Option<Decimal>,

    #[validate(range(min = 0, max = 365, message = "reminder_days must be between 0 and 365"))]
    pub reminder_days: Option<i32>,

    #[serde(default)]
    pub is_recurring: bool,

    pub recurrence_type: Option<String>,
}

impl CreateReminderRequest {
    fn into_create(self, user_id: uuid::Uuid, today: NaiveDate) -> Result<CreateReminder, ApiError> {
        if self.due_date <= today {
            return Err(ApiError::BadRequest(
                "Due date must be in the future".to_string(),
            ));
        }

        let recurrence = if self.is_recurring {
            let recurrence = self
                .recurrence_type
                .as_deref()
                .and_then(RecurrenceType::parse)
                .ok_or_else(|| {
                    ApiError::BadRequest(
                        "Recurring reminders need recurrence_type monthly or yearly".to_string(),
                    )
                })?;
            Some(recurrence)
        } else {
            None
        };

        Ok(CreateReminder {
            user_id,
            title: self.title.trim().to_string(),
            description: self.description,
            amount: self.amount.map(|a| a.round_dp(2)),
            due_date: self.due_date,
            reminder_days: self.reminder_days.unwrap_or(DEFAULT_REMINDER_DAYS),
            recurrence,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    pub days: Option<i32>,
}

/// A reminder with its derived figures
#[derive(Debug, Serialize)]
pub struct ReminderView {
    #[serde(flatten)]
    pub reminder: Reminder,
    pub days_remaining: i64,
    pub is_overdue: bool,
    pub should_notify: bool,
}

impl ReminderView {
    pub fn new(reminder: Reminder, now: DateTime<Utc>) -> Self {
        let days_remaining = calculators::days_remaining(reminder.due_date, now);

        Self {
            is_overdue: calculators::is_overdue(days_remaining),
            should_notify: calculators::should_notify(days_remaining, reminder.reminder_days),
            days_remaining,
            reminder,
        }
    }
}

fn views(reminders: Vec<Reminder>) -> Vec<ReminderView> {
    let now = Utc::now();
    reminders
        .into_iter()
        .map(|reminder| ReminderView::new(reminder, now))
        .collect()
}

#[derive(Debug, Serialize)]
pub struct ReminderSummary {
    pub summary: ReminderStats,
    pub next_pending: Vec<ReminderView>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Reminder not found".to_string())
}

fn validate_patch(patch: &UpdateReminder) -> Result<(), ApiError> {
    if patch.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }
    if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::BadRequest("Title cannot be empty".to_string()));
    }
    if patch.reminder_days.is_some_and(|d| d < 0) {
        return Err(ApiError::BadRequest(
            "reminder_days cannot be negative".to_string(),
        ));
    }
    Ok(())
}

pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateReminderRequest>,
) -> ApiResult<ReminderView> {
    req.validate()?;
    let data = req.into_create(auth.user_id, Utc::now().date_naive())?;

    let reminder = Reminder::create(&state.db, data).await?;

    Ok(ApiResponse::created(ReminderView::new(reminder, Utc::now())))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(filter): ApiQuery<StatusFilter>,
) -> ApiResult<Vec<ReminderView>> {
    let status = filter
        .status
        .as_deref()
        .map(|raw| {
            ReminderStatus::parse(raw.trim()).ok_or_else(|| {
                ApiError::BadRequest(
                    "Status must be one of pending, completed, overdue".to_string(),
                )
            })
        })
        .transpose()?;

    let reminders = Reminder::list_by_user(&state.db, auth.user_id, status).await?;
    Ok(ApiResponse::success(views(reminders)))
}

pub async fn upcoming(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(query): ApiQuery<UpcomingQuery>,
) -> ApiResult<Vec<ReminderView>> {
    let days = query.days.unwrap_or(DEFAULT_UPCOMING_DAYS);
    if !(0..=MAX_UPCOMING_DAYS).contains(&days) {
        return Err(ApiError::BadRequest(format!(
            "days must be between 0 and {}",
            MAX_UPCOMING_DAYS
        )));
    }

    let reminders =
        Reminder::upcoming(&state.db, auth.user_id, Utc::now().date_naive(), days).await?;
    Ok(ApiResponse::success(views(reminders)))
}

pub async fn notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Vec<ReminderView>> {
    let reminders =
        Reminder::due_for_notification(&state.db, auth.user_id, Utc::now().date_naive()).await?;
    Ok(ApiResponse::success(views(reminders)))
}

pub async fn summary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ReminderSummary> {
    let stats = Reminder::stats(&state.db, auth.user_id).await?;
    let next = Reminder::next_pending(&state.db, auth.user_id, NEXT_PENDING).await?;

    Ok(ApiResponse::success(ReminderSummary {
        summary: stats,
        next_pending: views(next),
    }))
}

pub async fn complete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<CompletedReminder> {
    let id = parse_id(&id, "reminder")?;

    let completed = Reminder::complete_owned(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(not_found)?;

    if let Some(next) = &completed.next {
        tracing::debug!(reminder_id = %id, next_id = %next.id, due_date = %next.due_date, "Recurring reminder rolled over");
    }

    Ok(ApiResponse::success(completed))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<UpdateReminder>,
) -> ApiResult<ReminderView> {
    let id = parse_id(&id, "reminder")?;
    validate_patch(&patch)?;

    let reminder = Reminder::update_owned(&state.db, id, auth.user_id, patch)
        .await?
        .ok_or_else(not_found)?;

    Ok(ApiResponse::success(ReminderView::new(reminder, Utc::now())))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<MessageResponse> {
    let id = parse_id(&id, "reminder")?;

    if !Reminder::delete_owned(&state.db, id, auth.user_id).await? {
        return Err(not_found());
    }

    Ok(ApiResponse::success(MessageResponse {
        message: "Reminder deleted successfully",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn request(due: NaiveDate) -> CreateReminderRequest {
        CreateReminderRequest {
            title: "Rent".to_string(),
            due_date: due,
            description: None,
            amount: Some(Decimal::new(120000, 2)),
            reminder_days: None,
            is_recurring: false,
            recurrence_type: None,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    #[test]
    fn test_defaults_reminder_days() {
        let data = request(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
            .into_create(Uuid::new_v4(), today())
            .unwrap();

        assert_eq!(data.reminder_days, DEFAULT_REMINDER_DAYS);
        assert_eq!(data.recurrence, None);
    }

    #[test]
    fn test_past_due_date_rejected() {
        let err = request(today())
            .into_create(Uuid::new_v4(), today())
            .unwrap_err();
        assert!(err.to_string().contains("future"));
    }

    #[test]
    fn test_recurring_requires_type() {
        let mut req = request(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        req.is_recurring = true;
        req.recurrence_type = Some("weekly".to_string());
        assert!(req.into_create(Uuid::new_v4(), today()).is_err());

        let mut req = request(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        req.is_recurring = true;
        req.recurrence_type = Some("monthly".to_string());
        let data = req.into_create(Uuid::new_v4(), today()).unwrap();
        assert_eq!(data.recurrence, Some(RecurrenceType::Monthly));
    }

    #[test]
    fn test_patch_validation() {
        assert!(validate_patch(&UpdateReminder::default()).is_err());

        let blank_title = UpdateReminder {
            title: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(validate_patch(&blank_title).is_err());

        let ok = UpdateReminder {
            reminder_days: Some(5),
            ..Default::default()
        };
        assert!(validate_patch(&ok).is_ok());
    }
}
