//! Account endpoints: profile, subscription downgrade and usage overview

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    response::ApiResponse,
};
use axum::{extract::State, Extension};
use fintrack_shared::{
    auth::middleware::AuthContext,
    models::{
        ai_usage::{AiUsage, UsageCount},
        user::{SubscriptionTier, User},
    },
    subscription,
    usage::{AnalysisCeiling, UsageCheck, UsageLimits},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct UpdateSubscriptionRequest {
    pub subscription_type: String,
}

#[derive(Debug, Serialize)]
pub struct UsageOverview {
    pub subscription_type: SubscriptionTier,
    pub ai_questions_used: i32,
    pub chat: UsageLimits,
    pub market_analysis: UsageLimits,
    pub window_start: chrono::DateTime<Utc>,
    pub usage_by_type: Vec<UsageCount>,
}

async fn load_user(state: &AppState, auth: &AuthContext) -> Result<User, ApiError> {
    User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<User> {
    Ok(ApiResponse::success(load_user(&state, &auth).await?))
}

/// Explicit downgrade to `free`
///
/// Upgrades only happen through a confirmed payment.
pub async fn update_subscription(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<UpdateSubscriptionRequest>,
) -> ApiResult<User> {
    match SubscriptionTier::parse(req.subscription_type.trim()) {
        Some(SubscriptionTier::Free) => {
            let user = subscription::cancel(&state.db, auth.user_id).await?;
            Ok(ApiResponse::success(user))
        }
        Some(_) => Err(ApiError::BadRequest(
            "Upgrades require a confirmed payment".to_string(),
        )),
        None => Err(ApiError::BadRequest(
            "subscription_type must be one of free, premium, premium+".to_string(),
        )),
    }
}

pub async fn usage(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<UsageOverview> {
    let user = load_user(&state, &auth).await?;
    let tier = user.tier();

    let window_start = AnalysisCeiling::for_tier(tier).window_start(Utc::now());
    let analysis = state.usage().analysis_status(user.id, tier).await?;
    let usage_by_type = AiUsage::counts_by_type(&state.db, user.id, window_start).await?;

    Ok(ApiResponse::success(UsageOverview {
        subscription_type: tier,
        ai_questions_used: user.ai_questions_used,
        chat: UsageCheck::chat(tier, user.ai_questions_used).limits,
        market_analysis: analysis.limits,
        window_start,
        usage_by_type,
    }))
}
