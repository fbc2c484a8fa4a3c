/// Payment reminders
///
/// Reminders carry a calendar due date and a notification window (`reminder_days`).
/// Completing a recurring reminder inserts its successor and marks the original
/// `completed` inside one transaction.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::calculators;

pub const DEFAULT_REMINDER_DAYS: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Pending,
    Completed,
    Overdue,
}

impl ReminderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderStatus::Pending => "pending",
            ReminderStatus::Completed => "completed",
            ReminderStatus::Overdue => "overdue",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReminderStatus::Pending),
            "completed" => Some(ReminderStatus::Completed),
            "overdue" => Some(ReminderStatus::Overdue),
            _ => None,
        }
    }
}

/// Recurrence period of a recurring reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceType {
    Monthly,
    Yearly,
}

impl RecurrenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceType::Monthly => "monthly",
            RecurrenceType::Yearly => "yearly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(RecurrenceType::Monthly),
            "yearly" => Some(RecurrenceType::Yearly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reminder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub due_date: NaiveDate,
    pub reminder_days: i32,
    pub is_recurring: bool,
    pub recurrence_type: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reminder {
    pub fn recurrence(&self) -> Option<RecurrenceType> {
        if !self.is_recurring {
            return None;
        }
        self.recurrence_type.as_deref().and_then(RecurrenceType::parse)
    }
}

#[derive(Debug, Clone)]
pub struct CreateReminder {
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub due_date: NaiveDate,
    pub reminder_days: i32,
    pub recurrence: Option<RecurrenceType>,
}

/// Partial update; `None` leaves the column untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateReminder {
    pub title: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub reminder_days: Option<i32>,
    pub is_recurring: Option<bool>,
    pub recurrence_type: Option<RecurrenceType>,
}

impl UpdateReminder {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.amount.is_none()
            && self.due_date.is_none()
            && self.reminder_days.is_none()
            && self.is_recurring.is_none()
            && self.recurrence_type.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReminderStats {
    pub total_reminders: i64,
    pub pending_reminders: i64,
    pub completed_reminders: i64,
    pub overdue_reminders: i64,
    pub recurring_reminders: i64,
}

/// Outcome of completing a reminder
#[derive(Debug, Clone, Serialize)]
pub struct CompletedReminder {
    pub reminder: Reminder,
    pub next: Option<Reminder>,
}

const REMINDER_COLUMNS: &str = "id, user_id, title, description, amount, due_date, reminder_days, \
     is_recurring, recurrence_type, status, created_at, updated_at";

impl Reminder {
    pub async fn create<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        data: CreateReminder,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Reminder>(&format!(
            r#"
            INSERT INTO reminders
                (user_id, title, description, amount, due_date, reminder_days, is_recurring, recurrence_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {REMINDER_COLUMNS}
            "#
        ))
        .bind(data.user_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.amount)
        .bind(data.due_date)
        .bind(data.reminder_days)
        .bind(data.recurrence.is_some())
        .bind(data.recurrence.map(|r| r.as_str()))
        .fetch_one(executor)
        .await
    }

    /// Lists reminders ordered by due date, optionally filtered by status
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: Uuid,
        status: Option<ReminderStatus>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Reminder>(&format!(
            r#"
            SELECT {REMINDER_COLUMNS} FROM reminders
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY due_date ASC
            "#
        ))
        .bind(user_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(pool)
        .await
    }

    /// Pending reminders due between today and `days` days from today (inclusive)
    pub async fn upcoming(
        pool: &PgPool,
        user_id: Uuid,
        today: NaiveDate,
        days: i32,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Reminder>(&format!(
            r#"
            SELECT {REMINDER_COLUMNS} FROM reminders
            WHERE user_id = $1
              AND status = 'pending'
              AND due_date BETWEEN $2 AND $2 + $3
            ORDER BY due_date ASC
            "#
        ))
        .bind(user_id)
        .bind(today)
        .bind(days)
        .fetch_all(pool)
        .await
    }

    /// Pending reminders whose due date falls inside their own notification window
    pub async fn due_for_notification(
        pool: &PgPool,
        user_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Reminder>(&format!(
            r#"
            SELECT {REMINDER_COLUMNS} FROM reminders
            WHERE user_id = $1
              AND status = 'pending'
              AND due_date BETWEEN $2 AND $2 + reminder_days
            ORDER BY due_date ASC
            "#
        ))
        .bind(user_id)
        .bind(today)
        .fetch_all(pool)
        .await
    }

    /// Next `limit` pending reminders by due date
    pub async fn next_pending(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Reminder>(&format!(
            r#"
            SELECT {REMINDER_COLUMNS} FROM reminders
            WHERE user_id = $1 AND status = 'pending'
            ORDER BY due_date ASC
            LIMIT $2
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn stats(pool: &PgPool, user_id: Uuid) -> Result<ReminderStats, sqlx::Error> {
        sqlx::query_as::<_, ReminderStats>(
            r#"
            SELECT
                COUNT(*) AS total_reminders,
                COUNT(*) FILTER (WHERE status = 'pending') AS pending_reminders,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed_reminders,
                COUNT(*) FILTER (WHERE status = 'overdue') AS overdue_reminders,
                COUNT(*) FILTER (WHERE is_recurring) AS recurring_reminders
            FROM reminders
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// Marks a reminder completed, spawning the next occurrence when it recurs
    ///
    /// Returns `None` when the reminder does not exist or belongs to someone else. An
    /// already completed reminder is returned unchanged with no successor, so each
    /// occurrence rolls over once.
    pub async fn complete_owned(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<CompletedReminder>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let existing = sqlx::query_as::<_, Reminder>(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = $1 AND user_id = $2 FOR UPDATE"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(existing) = existing else {
            return Ok(None);
        };

        if ReminderStatus::parse(&existing.status) == Some(ReminderStatus::Completed) {
            tx.commit().await?;
            return Ok(Some(CompletedReminder {
                reminder: existing,
                next: None,
            }));
        }

        let next = match existing.recurrence() {
            Some(recurrence) => {
                let successor = CreateReminder {
                    user_id,
                    title: existing.title.clone(),
                    description: existing.description.clone(),
                    amount: existing.amount,
                    due_date: calculators::next_due_date(existing.due_date, recurrence),
                    reminder_days: existing.reminder_days,
                    recurrence: Some(recurrence),
                };
                Some(Reminder::create(&mut *tx, successor).await?)
            }
            None => None,
        };

        let reminder = sqlx::query_as::<_, Reminder>(&format!(
            r#"
            UPDATE reminders SET status = 'completed', updated_at = NOW()
            WHERE id = $1
            RETURNING {REMINDER_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(CompletedReminder { reminder, next }))
    }

    /// Applies a partial update; returns `None` when not found or not owned
    pub async fn update_owned(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        patch: UpdateReminder,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE reminders SET updated_at = NOW()");

        if let Some(title) = patch.title {
            builder.push(", title = ").push_bind(title);
        }
        if let Some(description) = patch.description {
            builder.push(", description = ").push_bind(description);
        }
        if let Some(amount) = patch.amount {
            builder.push(", amount = ").push_bind(amount);
        }
        if let Some(due_date) = patch.due_date {
            builder.push(", due_date = ").push_bind(due_date);
        }
        if let Some(days) = patch.reminder_days {
            builder.push(", reminder_days = ").push_bind(days);
        }
        if let Some(is_recurring) = patch.is_recurring {
            builder.push(", is_recurring = ").push_bind(is_recurring);
        }
        if let Some(recurrence) = patch.recurrence_type {
            builder
                .push(", recurrence_type = ")
                .push_bind(recurrence.as_str());
        }

        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" AND user_id = ")
            .push_bind(user_id)
            .push(" RETURNING ")
            .push(REMINDER_COLUMNS);

        builder
            .build_query_as::<Reminder>()
            .fetch_optional(pool)
            .await
    }

    pub async fn delete_owned(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM reminders WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_patch() {
        assert!(UpdateReminder::default().is_empty());

        let patch = UpdateReminder {
            reminder_days: Some(5),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_recurrence_requires_flag() {
        let mut reminder = Reminder {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Rent".to_string(),
            description: None,
            amount: Some(Decimal::new(120000, 2)),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            reminder_days: DEFAULT_REMINDER_DAYS,
            is_recurring: false,
            recurrence_type: Some("monthly".to_string()),
            status: "pending".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(reminder.recurrence(), None);

        reminder.is_recurring = true;
        assert_eq!(reminder.recurrence(), Some(RecurrenceType::Monthly));
    }

    #[test]
    fn test_patch_deserializes_recurrence() {
        let patch: UpdateReminder =
            serde_json::from_str(r#"{"recurrence_type": "yearly", "title": "Insurance"}"#).unwrap();
        assert_eq!(patch.recurrence_type, Some(RecurrenceType::Yearly));
        assert_eq!(patch.title.as_deref(), Some("Insurance"));
    }
}
