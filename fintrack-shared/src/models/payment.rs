/// Subscription payments
///
/// Append-only. `transaction_id` holds the processor's payment-intent id and is unique
/// (`payments_transaction_id_key`), which makes confirmation idempotent.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::user::SubscriptionTier;

/// Name of the unique constraint guarding `payments.transaction_id`
pub const TRANSACTION_ID_CONSTRAINT: &str = "payments_transaction_id_key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub transaction_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub subscription_type: String,
    pub status: String,
    pub payment_method: Option<String>,
    pub payment_provider: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub user_id: Uuid,
    pub transaction_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub subscription_type: SubscriptionTier,
    pub status: PaymentStatus,
    pub payment_method: Option<String>,
    pub payment_provider: String,
}

const PAYMENT_COLUMNS: &str = "id, user_id, transaction_id, amount, currency, subscription_type, \
     status, payment_method, payment_provider, created_at, updated_at";

impl Payment {
    /// Inserts a payment row
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on [`TRANSACTION_ID_CONSTRAINT`] when the transaction
    /// id was already recorded.
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        data: CreatePayment,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments
                (user_id, transaction_id, amount, currency, subscription_type, status,
                 payment_method, payment_provider)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(data.user_id)
        .bind(data.transaction_id)
        .bind(data.amount)
        .bind(data.currency.to_lowercase())
        .bind(data.subscription_type.as_str())
        .bind(data.status.as_str())
        .bind(data.payment_method)
        .bind(data.payment_provider)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_transaction_id<'e>(
        executor: impl PgExecutor<'e>,
        transaction_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE transaction_id = $1"
        ))
        .bind(transaction_id)
        .fetch_optional(executor)
        .await
    }

    /// The caller's payments, newest first
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Most recent completed payment
    pub async fn last_completed(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
            WHERE user_id = $1 AND status = 'completed'
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn count_completed_by_transaction<'e>(
        executor: impl PgExecutor<'e>,
        transaction_id: &str,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM payments WHERE transaction_id = $1 AND status = 'completed'",
        )
        .bind(transaction_id)
        .fetch_one(executor)
        .await
    }
}

/// True when `err` is the unique violation on `payments.transaction_id`
pub fn is_duplicate_transaction(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() && db_err.constraint() == Some(TRANSACTION_ID_CONSTRAINT)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_error_is_not_duplicate() {
        assert!(!is_duplicate_transaction(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn test_status_storage_form() {
        assert_eq!(PaymentStatus::Completed.as_str(), "completed");
        assert_eq!(PaymentStatus::Refunded.as_str(), "refunded");
    }
}
