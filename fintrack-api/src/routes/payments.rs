/// Payment and subscription endpoints
///
/// ```text
/// POST /api/payments/create-intent    start a premium purchase
/// POST /api/payments/confirm          record the caller's succeeded intent and upgrade to premium
/// GET  /api/payments/history
/// GET  /api/payments/subscription
/// POST /api/payments/cancel           premium -> free
/// POST /api/payments/webhook/stripe   public; signature-checked when a secret is set
/// ```

use std::collections::BTreeMap;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    response::ApiResponse,
};
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Extension,
};
use chrono::{DateTime, Utc};
use fintrack_shared::{
    auth::middleware::AuthContext,
    models::{
        payment::Payment,
        user::{SubscriptionTier, User},
    },
    providers::stripe::verify_webhook_signature,
    subscription::{self, ConfirmedPayment},
    usage::{UsageCheck, UsageLimits},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CURRENCY: &str = "usd";

const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateIntentResponse {
    pub client_secret: String,
    pub payment_intent_id: String,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub payment_intent_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub message: &'static str,
    pub subscription_type: SubscriptionTier,
    pub transaction_id: String,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionInfo {
    pub subscription_type: SubscriptionTier,
    pub ai_questions_used: i32,
    pub limits: UsageLimits,
    pub member_since: DateTime<Utc>,
    pub last_payment: Option<Payment>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub message: &'static str,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

/// Lowercased three-letter currency code, `usd` when absent
pub fn normalize_currency(raw: Option<&str>) -> Result<String, ApiError> {
    let currency = raw
        .map(|c| c.trim().to_lowercase())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    if currency.len() == 3 && currency.chars().all(|c| c.is_ascii_lowercase()) {
        Ok(currency)
    } else {
        Err(ApiError::BadRequest("Invalid currency".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<WebhookData>,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    object: WebhookObject,
}

#[derive(Debug, Deserialize)]
struct WebhookObject {
    id: String,
}

pub async fn create_intent(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateIntentRequest>,
) -> ApiResult<CreateIntentResponse> {
    let amount = req
        .amount
        .filter(|a| *a > Decimal::ZERO)
        .ok_or_else(|| ApiError::BadRequest("Invalid amount".to_string()))?
        .round_dp(2);
    let currency = normalize_currency(req.currency.as_deref())?;
    let payments = state.payments()?;

    let metadata = BTreeMap::from([
        ("user_id".to_string(), auth.user_id.to_string()),
        (
            "subscription_type".to_string(),
            SubscriptionTier::Premium.as_str().to_string(),
        ),
    ]);

    let intent = payments.create_intent(amount, &currency, &metadata).await?;

    tracing::info!(user_id = %auth.user_id, intent_id = %intent.id, %amount, %currency, "Payment intent created");

    Ok(ApiResponse::success(CreateIntentResponse {
        client_secret: intent.client_secret,
        payment_intent_id: intent.id,
        amount,
        currency,
    }))
}

pub async fn confirm(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<ConfirmRequest>,
) -> ApiResult<ConfirmResponse> {
    let intent_id = req
        .payment_intent_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("payment_intent_id is required".to_string()))?;
    let payments = state.payments()?;

    let intent = payments.retrieve_intent(&intent_id).await?;
    if !intent.created_for(auth.user_id) {
        tracing::warn!(user_id = %auth.user_id, intent_id = %intent.id, "Payment intent owned by another account");
        return Err(ApiError::Forbidden(
            "Payment does not belong to this account".to_string(),
        ));
    }
    if !intent.succeeded() {
        return Err(ApiError::BadRequest(format!(
            "Payment not completed (status: {})",
            intent.status
        )));
    }

    let amount = intent.received_amount();
    if amount <= Decimal::ZERO {
        return Err(ApiError::BadRequest(
            "Invalid amount received from payment processor".to_string(),
        ));
    }

    let (user, payment) = subscription::confirm_payment(
        &state.db,
        auth.user_id,
        ConfirmedPayment {
            transaction_id: intent.id.clone(),
            amount,
            currency: intent.currency.to_lowercase(),
            payment_method: Some(intent.payment_method()),
            provider: payments.name().to_string(),
        },
    )
    .await?;

    Ok(ApiResponse::success(ConfirmResponse {
        message: "Payment confirmed and subscription updated",
        subscription_type: user.tier(),
        transaction_id: payment.transaction_id,
        amount: payment.amount,
        currency: payment.currency,
    }))
}

pub async fn history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Vec<Payment>> {
    let payments = Payment::list_by_user(&state.db, auth.user_id).await?;
    Ok(ApiResponse::success(payments))
}

pub async fn subscription(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<SubscriptionInfo> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    let last_payment = Payment::last_completed(&state.db, auth.user_id).await?;
    let tier = user.tier();

    Ok(ApiResponse::success(SubscriptionInfo {
        subscription_type: tier,
        ai_questions_used: user.ai_questions_used,
        limits: UsageCheck::chat(tier, user.ai_questions_used).limits,
        member_since: user.created_at,
        last_payment,
    }))
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<CancelResponse> {
    let user = subscription::cancel(&state.db, auth.user_id).await?;

    Ok(ApiResponse::success(CancelResponse {
        message: "Subscription cancelled",
        user,
    }))
}

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<WebhookAck> {
    let Some(secret) = state.config.providers.stripe_webhook_secret.as_deref() else {
        tracing::debug!("Webhook secret not configured, skipping event");
        return Ok(ApiResponse::accepted(WebhookAck {
            received: true,
            skipped: Some("webhook_secret_missing"),
            event_type: None,
        }));
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing Stripe-Signature header".to_string()))?;

    verify_webhook_signature(&body, signature, secret, Utc::now().timestamp()).map_err(|e| {
        tracing::warn!(error = %e, "Rejected webhook");
        ApiError::BadRequest(format!("Invalid webhook signature: {e}"))
    })?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|_| ApiError::BadRequest("Invalid webhook payload".to_string()))?;

    match event.kind.as_str() {
        "payment_intent.succeeded" => {
            let intent_id = event.data.map(|d| d.object.id).unwrap_or_default();
            tracing::info!(intent_id = %intent_id, "Payment intent succeeded");
        }
        other => tracing::debug!(event_type = %other, "Unhandled webhook event"),
    }

    Ok(ApiResponse::success(WebhookAck {
        received: true,
        skipped: None,
        event_type: Some(event.kind),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_normalization() {
        assert_eq!(normalize_currency(None).unwrap(), "usd");
        assert_eq!(normalize_currency(Some(" EUR ")).unwrap(), "eur");
        assert!(normalize_currency(Some("euro")).is_err());
        assert!(normalize_currency(Some("u5d")).is_err());
    }

    #[test]
    fn test_webhook_event_shape() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_123","amount":999}}}"#,
        )
        .unwrap();

        assert_eq!(event.kind, "payment_intent.succeeded");
        assert_eq!(event.data.unwrap().object.id, "pi_123");
    }
}
