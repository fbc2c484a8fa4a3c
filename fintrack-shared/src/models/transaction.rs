/// Ledger transactions
///
/// A transaction is an income or expense entry owned by one user. Rows are immutable
/// once written; the only mutation is deletion by the owner.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Direction of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "income" => Some(TransactionType::Income),
            "expense" => Some(TransactionType::Expense),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub amount: Decimal,
    pub category: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTransaction {
    pub user_id: Uuid,
    pub title: String,
    pub amount: Decimal,
    pub category: String,
    pub kind: TransactionType,
}

/// Income, expense and balance totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub balance: Decimal,
    pub income: Decimal,
    pub expenses: Decimal,
}

impl LedgerSummary {
    /// Builds a summary; balance is income minus expenses
    pub fn new(income: Decimal, expenses: Decimal) -> Self {
        LedgerSummary {
            balance: income - expenses,
            income,
            expenses,
        }
    }
}

/// Aggregate row for one (category, type) pair
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CategoryTotal {
    pub category: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub total: Decimal,
    pub count: i64,
    pub average: Decimal,
    pub max_amount: Decimal,
    pub min_amount: Decimal,
}

/// Income and expense totals for one bucket of a time series
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PeriodTotals {
    /// Bucket label (`YYYY-MM-DD` or `YYYY-MM`)
    pub period: String,
    pub income: Decimal,
    pub expenses: Decimal,
    pub transaction_count: i64,
}

const TRANSACTION_COLUMNS: &str = "id, user_id, title, amount, category, type, created_at";

impl Transaction {
    pub async fn create(pool: &PgPool, data: CreateTransaction) -> Result<Self, sqlx::Error> {
        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            INSERT INTO transactions (user_id, title, amount, category, type)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(data.user_id)
        .bind(data.title)
        .bind(data.amount)
        .bind(data.category)
        .bind(data.kind.as_str())
        .fetch_one(pool)
        .await?;

        Ok(transaction)
    }

    /// Lists a user's transactions, newest first
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Most recent `limit` transactions
    pub async fn recent(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Transaction>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS} FROM transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Transactions created inside `[from, to)`, ordered by largest absolute amount
    pub async fn largest_between(
        pool: &PgPool,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Transaction>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS} FROM transactions
            WHERE user_id = $1 AND created_at >= $2 AND created_at < $3
            ORDER BY ABS(amount) DESC
            LIMIT $4
            "#
        ))
        .bind(user_id)
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Deletes a transaction if it exists and belongs to `user_id`
    pub async fn delete_owned(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// All-time income/expense totals
    pub async fn summary<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
    ) -> Result<LedgerSummary, sqlx::Error> {
        let (income, expenses): (Decimal, Decimal) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(amount) FILTER (WHERE type = 'income'), 0),
                COALESCE(SUM(amount) FILTER (WHERE type = 'expense'), 0)
            FROM transactions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(executor)
        .await?;

        Ok(LedgerSummary::new(income, expenses))
    }

    /// Total income over the last `months` months divided by `months`
    pub async fn average_monthly_income(
        pool: &PgPool,
        user_id: Uuid,
        months: i32,
    ) -> Result<Decimal, sqlx::Error> {
        let total: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM transactions
            WHERE user_id = $1
              AND type = 'income'
              AND created_at >= NOW() - make_interval(months => $2)
            "#,
        )
        .bind(user_id)
        .bind(months)
        .fetch_one(pool)
        .await?;

        Ok(total / Decimal::from(months.max(1)))
    }

    /// Sum of all income ever recorded
    pub async fn total_income(pool: &PgPool, user_id: Uuid) -> Result<Decimal, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM transactions WHERE user_id = $1 AND type = 'income'",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// Income/expense totals for transactions created inside `[from, to)`
    pub async fn summary_between(
        pool: &PgPool,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<(LedgerSummary, i64), sqlx::Error> {
        let (income, expenses, count): (Decimal, Decimal, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(amount) FILTER (WHERE type = 'income'), 0),
                COALESCE(SUM(amount) FILTER (WHERE type = 'expense'), 0),
                COUNT(*)
            FROM transactions
            WHERE user_id = $1 AND created_at >= $2 AND created_at < $3
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_one(pool)
        .await?;

        Ok((LedgerSummary::new(income, expenses), count))
    }

    /// Per (category, type) aggregates inside `[from, to)`, largest totals first
    pub async fn category_totals(
        pool: &PgPool,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CategoryTotal>, sqlx::Error> {
        sqlx::query_as::<_, CategoryTotal>(
            r#"
            SELECT
                category,
                type,
                SUM(amount) AS total,
                COUNT(*) AS count,
                ROUND(AVG(amount), 2) AS average,
                MAX(amount) AS max_amount,
                MIN(amount) AS min_amount
            FROM transactions
            WHERE user_id = $1 AND created_at >= $2 AND created_at < $3
            GROUP BY category, type
            ORDER BY total DESC
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await
    }

    /// Income/expense series bucketed by `bucket` (`day` or `month`) inside `[from, to)`
    ///
    /// Buckets without transactions are absent from the result.
    pub async fn totals_by_period(
        pool: &PgPool,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        bucket: PeriodBucket,
    ) -> Result<Vec<PeriodTotals>, sqlx::Error> {
        sqlx::query_as::<_, PeriodTotals>(
            r#"
            SELECT
                TO_CHAR(DATE_TRUNC($4, created_at), $5) AS period,
                COALESCE(SUM(amount) FILTER (WHERE type = 'income'), 0) AS income,
                COALESCE(SUM(amount) FILTER (WHERE type = 'expense'), 0) AS expenses,
                COUNT(*) AS transaction_count
            FROM transactions
            WHERE user_id = $1 AND created_at >= $2 AND created_at < $3
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .bind(bucket.trunc_unit())
        .bind(bucket.label_format())
        .fetch_all(pool)
        .await
    }
}

/// Time-series bucket size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodBucket {
    Day,
    Month,
}

impl PeriodBucket {
    fn trunc_unit(&self) -> &'static str {
        match self {
            PeriodBucket::Day => "day",
            PeriodBucket::Month => "month",
        }
    }

    fn label_format(&self) -> &'static str {
        match self {
            PeriodBucket::Day => "YYYY-MM-DD",
            PeriodBucket::Month => "YYYY-MM",
        }
    }
}
