/// Stripe payment intents over the REST API, plus webhook signature verification
///
/// Requests are form-encoded and authenticated with the secret key as a bearer token.
/// Webhook payloads are signed with HMAC-SHA256 over `"{timestamp}.{payload}"`; the
/// `Stripe-Signature` header carries `t=<timestamp>` and one or more `v1=<hex>` entries.

use std::collections::BTreeMap;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use sha2::Sha256;

use super::{ensure_success, CreatedIntent, PaymentIntent, PaymentProcessor, ProviderError};

type HmacSha256 = Hmac<Sha256>;

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Maximum age of a signed webhook before it is rejected as a replay
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl StripeClient {
    pub fn new(http: reqwest::Client, secret_key: impl Into<String>) -> Self {
        StripeClient {
            http,
            secret_key: secret_key.into(),
            base_url: STRIPE_API_BASE.to_string(),
        }
    }

    /// Points the client at another base URL (stripe-mock, a local stub)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct CreateIntentResponse {
    id: String,
    client_secret: Option<String>,
}

/// Converts a major-unit amount to minor units, rounding half away from zero
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    fn name(&self) -> &str {
        "stripe"
    }

    async fn create_intent(
        &self,
        amount: Decimal,
        currency: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<CreatedIntent, ProviderError> {
        let minor = to_minor_units(amount)
            .ok_or_else(|| ProviderError::InvalidRequest(format!("amount out of range: {amount}")))?;

        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), minor.to_string()),
            ("currency".to_string(), currency.to_string()),
            ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
        ];
        for (key, value) in metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }

        let response = self
            .http
            .post(format!("{}/v1/payment_intents", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        let created: CreateIntentResponse = ensure_success(response).await?.json().await?;

        let client_secret = created.client_secret.ok_or_else(|| {
            ProviderError::InvalidResponse("payment intent without client_secret".to_string())
        })?;

        Ok(CreatedIntent {
            id: created.id,
            client_secret,
        })
    }

    async fn retrieve_intent(&self, id: &str) -> Result<PaymentIntent, ProviderError> {
        let response = self
            .http
            .get(format!("{}/v1/payment_intents/{}", self.base_url, id))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        Ok(ensure_success(response).await?.json().await?)
    }
}

/// Webhook signature verification error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookSignatureError {
    #[error("Malformed signature header")]
    MalformedHeader,

    #[error("Signature timestamp outside tolerance")]
    Expired,

    #[error("No matching signature")]
    Mismatch,
}

/// Verifies a `Stripe-Signature` header against the raw request body
///
/// `now` is the current Unix time in seconds.
pub fn verify_webhook_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), WebhookSignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookSignatureError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(WebhookSignatureError::MalformedHeader);
    }

    if (now - timestamp).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err(WebhookSignatureError::Expired);
    }

    let matched = signatures.iter().any(|signature| {
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(signature).is_ok()
    });

    if matched {
        Ok(())
    } else {
        Err(WebhookSignatureError::Mismatch)
    }
}
