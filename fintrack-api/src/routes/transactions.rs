/// Ledger endpoints
///
/// ```text
/// GET    /api/transactions/summary            balance, income, expenses
/// GET    /api/transactions/summary/:user_id   same, 403 unless :user_id is the caller
/// GET    /api/transactions                    caller's transactions, newest first
/// GET    /api/transactions/:user_id           same, 403 unless :user_id is the caller
/// POST   /api/transactions                    record an income or expense
/// DELETE /api/transactions/:id                delete one of the caller's transactions
/// ```

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ensure_same_user, parse_id, ApiJson},
    response::ApiResponse,
};
use axum::{
    extract::{Path, State},
    Extension,
};
use fintrack_shared::{
    auth::middleware::AuthContext,
    models::transaction::{CreateTransaction, LedgerSummary, Transaction, TransactionType},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Every field is required; they are optional here so a missing one gets a
/// descriptive 400 rather than a deserialization error
#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub title: Option<String>,
    pub amount: Option<Decimal>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: &'static str,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CreateTransactionRequest {
    fn into_create(self, user_id: uuid::Uuid) -> Result<CreateTransaction, ApiError> {
        let (Some(title), Some(amount), Some(category), Some(kind)) = (
            non_blank(self.title),
            self.amount,
            non_blank(self.category),
            non_blank(self.kind),
        ) else {
            return Err(ApiError::BadRequest("All fields are required".to_string()));
        };

        let kind = TransactionType::parse(&kind).ok_or_else(|| {
            ApiError::BadRequest("Type must be either income or expense".to_string())
        })?;

        Ok(CreateTransaction {
            user_id,
            title,
            amount: amount.round_dp(2),
            category,
            kind,
        })
    }
}

pub async fn summary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<LedgerSummary> {
    let summary = Transaction::summary(&state.db, auth.user_id).await?;
    Ok(ApiResponse::success(summary))
}

pub async fn summary_for_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<String>,
) -> ApiResult<LedgerSummary> {
    ensure_same_user(Some(&user_id), auth.user_id)?;
    summary(State(state), Extension(auth)).await
}

pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Vec<Transaction>> {
    let transactions = Transaction::list_by_user(&state.db, auth.user_id).await?;
    Ok(ApiResponse::success(transactions))
}

pub async fn list_for_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<Transaction>> {
    ensure_same_user(Some(&user_id), auth.user_id)?;
    list(State(state), Extension(auth)).await
}

pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateTransactionRequest>,
) -> ApiResult<Transaction> {
    let data = req.into_create(auth.user_id)?;
    let transaction = Transaction::create(&state.db, data).await?;

    tracing::debug!(user_id = %auth.user_id, transaction_id = %transaction.id, "Transaction recorded");

    Ok(ApiResponse::created(transaction))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ApiResult<DeletedResponse> {
    let id = parse_id(&id, "transaction")?;

    if !Transaction::delete_owned(&state.db, id, auth.user_id).await? {
        return Err(ApiError::NotFound("Transaction not found".to_string()));
    }

    Ok(ApiResponse::success(DeletedResponse {
        message: "Transaction deleted successfully",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use uuid::Uuid;

    fn request(kind: &str) -> CreateTransactionRequest {
        CreateTransactionRequest {
            title: Some("Groceries".to_string()),
            amount: Some(Decimal::new(4550, 2)),
            category: Some("Food".to_string()),
            kind: Some(kind.to_string()),
        }
    }

    #[test]
    fn test_valid_request() {
        let data = request("expense").into_create(Uuid::new_v4()).unwrap();
        assert_eq!(data.kind, TransactionType::Expense);
        assert_eq!(data.amount, Decimal::new(4550, 2));
    }

    #[test]
    fn test_missing_field_rejected() {
        let mut req = request("income");
        req.category = Some("   ".to_string());

        let err = req.into_create(Uuid::new_v4()).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("All fields are required"));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = request("transfer").into_create(Uuid::new_v4()).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
