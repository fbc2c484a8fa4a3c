/// External collaborators
///
/// Every third-party service the backend calls sits behind an `async_trait` seam so the
/// HTTP layer can hold `Arc<dyn Trait>` and tests can substitute in-memory fakes.
///
/// - [`PaymentProcessor`]: creates and retrieves payment intents ([`stripe::StripeClient`])
/// - [`MarketDataProvider`]: fetches crypto and stock quotes ([`market::HttpMarketProvider`])
/// - [`CompletionClient`]: LLM chat completions ([`openrouter::OpenRouterClient`])
///
/// Calls are single-attempt and bounded by the HTTP client's timeout.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::market_data::MarketQuote;

pub mod market;
pub mod openrouter;
pub mod stripe;

/// Provider error
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),
}

/// Builds the shared outbound HTTP client
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("fintrack/", env!("CARGO_PKG_VERSION")))
        .build()?;

    Ok(client)
}

/// Turns a non-success response into `ProviderError::Api`
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(ProviderError::Api {
        status: status.as_u16(),
        message,
    })
}

/// A freshly created payment intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedIntent {
    pub id: String,
    pub client_secret: String,
}

/// Payment intent as reported by the processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    /// Amount in minor units (cents)
    pub amount: i64,
    #[serde(default)]
    pub amount_received: Option<i64>,
    pub currency: String,
    #[serde(default)]
    pub payment_method_types: Vec<String>,
    /// Key/value pairs attached at creation; `user_id` names the paying account
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl PaymentIntent {
    pub fn succeeded(&self) -> bool {
        self.status == "succeeded"
    }

    /// Received amount in major units, falling back to the requested amount
    pub fn received_amount(&self) -> Decimal {
        Decimal::new(self.amount_received.unwrap_or(self.amount), 2)
    }

    /// Whether the intent was created for `user_id`; intents without an owner match nobody
    pub fn created_for(&self, user_id: Uuid) -> bool {
        self.metadata
            .get("user_id")
            .is_some_and(|owner| owner.eq_ignore_ascii_case(&user_id.to_string()))
    }

    pub fn payment_method(&self) -> String {
        self.payment_method_types
            .first()
            .cloned()
            .unwrap_or_else(|| "card".to_string())
    }
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Provider name stored in `payments.payment_provider`
    fn name(&self) -> &str;

    /// Creates an intent for `amount` (major units) in `currency`
    async fn create_intent(
        &self,
        amount: Decimal,
        currency: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<CreatedIntent, ProviderError>;

    async fn retrieve_intent(&self, id: &str) -> Result<PaymentIntent, ProviderError>;
}

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Top crypto assets by market cap
    async fn fetch_crypto(&self) -> Result<Vec<MarketQuote>, ProviderError>;

    /// Quotes for the given stock tickers; tickers that fail individually are skipped
    async fn fetch_stocks(&self, symbols: &[&str]) -> Result<Vec<MarketQuote>, ProviderError>;
}

/// One completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Overrides the client's default model
    pub model: Option<String>,
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(status: &str, received: Option<i64>) -> PaymentIntent {
        PaymentIntent {
            id: "pi_123".to_string(),
            status: status.to_string(),
            amount: 999,
            amount_received: received,
            currency: "usd".to_string(),
            payment_method_types: vec![],
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_intent_succeeded() {
        assert!(intent("succeeded", None).succeeded());
        assert!(!intent("requires_payment_method", None).succeeded());
    }

    #[test]
    fn test_received_amount_in_major_units() {
        assert_eq!(intent("succeeded", Some(1250)).received_amount(), Decimal::new(1250, 2));
        assert_eq!(intent("succeeded", None).received_amount(), Decimal::new(999, 2));
    }

    #[test]
    fn test_created_for_owner_only() {
        let owner = Uuid::new_v4();
        let mut owned = intent("succeeded", None);
        owned.metadata.insert("user_id".to_string(), owner.to_string());

        assert!(owned.created_for(owner));
        assert!(!owned.created_for(Uuid::new_v4()));
        assert!(!intent("succeeded", None).created_for(owner));
    }

    #[test]
    fn test_metadata_deserializes() {
        let json = serde_json::json!({
            "id": "pi_1",
            "status": "succeeded",
            "amount": 999,
            "currency": "usd",
            "metadata": {"user_id": "42", "subscription_type": "premium"}
        });
        let parsed: PaymentIntent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.metadata.get("user_id").map(String::as_str), Some("42"));

        let bare: PaymentIntent = serde_json::from_value(serde_json::json!({
            "id": "pi_2", "status": "processing", "amount": 100, "currency": "eur"
        }))
        .unwrap();
        assert!(bare.metadata.is_empty());
    }

    #[test]
    fn test_payment_method_defaults_to_card() {
        assert_eq!(intent("succeeded", None).payment_method(), "card");
    }
}
