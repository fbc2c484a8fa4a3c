//! Router behaviour that needs no database or Redis
//!
//! The pool in these tests points at a closed port, so anything that reaches Postgres
//! fails fast. Everything asserted here is decided before that.

mod common;

use axum::{
    middleware::from_fn,
    routing::{get, post},
    Extension, Router,
};
use chrono::Utc;
use common::{json_request, offline_state, send};
use fintrack_api::{
    app::build_router,
    middleware::auth::{require_premium, require_premium_plus},
};
use fintrack_shared::{auth::middleware::AuthContext, models::user::SubscriptionTier};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tower::Service as _;
use uuid::Uuid;

const WEBHOOK_SECRET: &str = "whsec_test";

fn stripe_signature(payload: &str, secret: &str) -> String {
    let timestamp = Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

#[tokio::test]
async fn test_health_reports_disconnected_database() {
    let app = build_router(offline_state(None));

    let (status, body) = send(&app, json_request("GET", "/api/health", None, None)).await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["database"], "disconnected");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = build_router(offline_state(None));

    for uri in ["/api/transactions", "/api/goals", "/api/ai/conversations", "/api/users/profile"] {
        let (status, body) = send(&app, json_request("GET", uri, None, None)).await;
        assert_eq!(status, 401, "{uri}");
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Token required");
    }
}

#[tokio::test]
async fn test_garbage_token_is_forbidden() {
    let app = build_router(offline_state(None));

    let (status, body) = send(
        &app,
        json_request("GET", "/api/transactions", Some("not-a-jwt"), None),
    )
    .await;

    assert_eq!(status, 403);
    assert_eq!(body["message"], "Invalid token");
}

#[tokio::test]
async fn test_register_rejects_invalid_email() {
    let app = build_router(offline_state(None));

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"email": "not-an-email", "password": "Str0ng!Passw0rd"})),
        ),
    )
    .await;

    assert_eq!(status, 400);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_refresh_requires_token() {
    let app = build_router(offline_state(None));

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/refresh",
            None,
            Some(json!({"refresh_token": ""})),
        ),
    )
    .await;

    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_webhook_skipped_without_secret() {
    let app = build_router(offline_state(None));

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/payments/webhook/stripe",
            None,
            Some(json!({"type": "payment_intent.succeeded"})),
        ),
    )
    .await;

    assert_eq!(status, 202);
    assert_eq!(body["data"]["received"], true);
    assert_eq!(body["data"]["skipped"], "webhook_secret_missing");
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let app = build_router(offline_state(Some(WEBHOOK_SECRET)));
    let payload = r#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_1"}}}"#;

    let mut request = json_request("POST", "/api/payments/webhook/stripe", None, None);
    *request.body_mut() = payload.into();
    request.headers_mut().insert(
        "stripe-signature",
        stripe_signature(payload, "whsec_other").parse().unwrap(),
    );
    let (status, body) = send(&app, request).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "bad_request");

    let mut unsigned = json_request("POST", "/api/payments/webhook/stripe", None, None);
    *unsigned.body_mut() = payload.into();
    let (status, _) = send(&app, unsigned).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_webhook_accepts_valid_signature() {
    let app = build_router(offline_state(Some(WEBHOOK_SECRET)));
    let payload = r#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_1"}}}"#;

    let mut request = json_request("POST", "/api/payments/webhook/stripe", None, None);
    *request.body_mut() = payload.into();
    request.headers_mut().insert(
        "stripe-signature",
        stripe_signature(payload, WEBHOOK_SECRET).parse().unwrap(),
    );

    let (status, body) = send(&app, request).await;

    assert_eq!(status, 200);
    assert_eq!(body["data"]["received"], true);
    assert_eq!(body["data"]["event_type"], "payment_intent.succeeded");
}

#[tokio::test]
async fn test_security_headers_present() {
    let mut app = build_router(offline_state(None));

    let response = app
        .call(json_request("GET", "/api/health", None, None))
        .await
        .unwrap();
    let headers = response.headers();

    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.contains_key("content-security-policy"));
    assert!(!headers.contains_key("strict-transport-security"));
}

fn guarded(tier: SubscriptionTier) -> Router {
    let caller = AuthContext {
        user_id: Uuid::new_v4(),
        tier,
        ai_questions_used: 0,
    };

    Router::new()
        .route(
            "/premium",
            post(|| async { "ok" }).route_layer(from_fn(require_premium)),
        )
        .route(
            "/premium-plus",
            get(|| async { "ok" }).route_layer(from_fn(require_premium_plus)),
        )
        .layer(Extension(caller))
}

#[tokio::test]
async fn test_premium_guard() {
    let (status, body) = send(
        &guarded(SubscriptionTier::Free),
        json_request("POST", "/premium", None, None),
    )
    .await;
    assert_eq!(status, 403);
    assert_eq!(body["message"], "Premium subscription required");

    for tier in [SubscriptionTier::Premium, SubscriptionTier::PremiumPlus] {
        let (status, _) = send(&guarded(tier), json_request("POST", "/premium", None, None)).await;
        assert_eq!(status, 200);
    }
}

#[tokio::test]
async fn test_premium_plus_guard() {
    for tier in [SubscriptionTier::Free, SubscriptionTier::Premium] {
        let (status, body) =
            send(&guarded(tier), json_request("GET", "/premium-plus", None, None)).await;
        assert_eq!(status, 403);
        assert_eq!(body["message"], "Premium+ subscription required");
    }

    let (status, _) = send(
        &guarded(SubscriptionTier::PremiumPlus),
        json_request("GET", "/premium-plus", None, None),
    )
    .await;
    assert_eq!(status, 200);
}
