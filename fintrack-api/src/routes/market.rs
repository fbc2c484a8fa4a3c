/// Market data endpoints
///
/// ```text
/// GET  /api/market/crypto                   tracked crypto snapshots (10 min cache)
/// GET  /api/market/stocks                   tracked stock snapshots (10 min cache)
/// GET  /api/market/analysis                 metered market overview
/// POST /api/market/personalized-analysis    premium+ only, LLM required
/// GET  /api/market/history?symbol=&type=    stored snapshot of one symbol
/// ```
///
/// Metered handlers fetch and complete before taking the caller's usage lock.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiQuery},
    response::ApiResponse,
};
use axum::{extract::State, Extension};
use chrono::{DateTime, Utc};
use fintrack_shared::{
    advisor::{self, InvestorProfile},
    auth::middleware::AuthContext,
    market::{self, Sentiment},
    models::{
        ai_usage::UsageType,
        market_data::{MarketData, MarketType},
        personalized_analysis::{CreatePersonalizedAnalysis, PersonalizedAnalysis, RiskTolerance},
        transaction::Transaction,
        user::SubscriptionTier,
    },
    usage::UsageLimits,
};
use serde::{Deserialize, Serialize};

/// Snapshots per market fed into the personalised analysis
const PERSONALIZED_TOP: i64 = 5;

#[derive(Debug, Serialize)]
pub struct CryptoResponse {
    pub crypto: Vec<MarketData>,
}

#[derive(Debug, Serialize)]
pub struct StocksResponse {
    pub stocks: Vec<MarketData>,
}

/// Aggregate view of one market
#[derive(Debug, Serialize)]
pub struct MarketOverview {
    pub average_change: f64,
    pub top_gainer: Option<MarketData>,
    pub top_loser: Option<MarketData>,
}

impl MarketOverview {
    pub fn of(rows: &[MarketData]) -> Self {
        Self {
            average_change: market::average_change(rows),
            top_gainer: market::top_gainer(rows).cloned(),
            top_loser: market::top_loser(rows).cloned(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MarketAnalysis {
    pub crypto: MarketOverview,
    pub stocks: MarketOverview,
    pub market_sentiment: Sentiment,
    pub recommendations: Vec<&'static str>,
    pub ai_analysis: Option<String>,
    pub has_ai_analysis: bool,
    pub timestamp: DateTime<Utc>,
    pub limits: UsageLimits,
}

#[derive(Debug, Deserialize)]
pub struct PersonalizedRequest {
    pub risk_tolerance: Option<RiskTolerance>,
    pub investment_goals: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PersonalizedResponse {
    pub analysis: String,
    pub user_profile: InvestorProfile,
    pub market_data: MarketSnapshot,
    pub record: PersonalizedAnalysis,
    pub limits: UsageLimits,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketSnapshot {
    pub crypto: Vec<MarketData>,
    pub stocks: Vec<MarketData>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub symbol: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Sentiment of both markets combined
pub fn overall_sentiment(crypto: &[MarketData], stocks: &[MarketData]) -> Sentiment {
    let averages: Vec<f64> = [crypto, stocks]
        .into_iter()
        .filter(|rows| !rows.is_empty())
        .map(market::average_change)
        .collect();

    if averages.is_empty() {
        return Sentiment::Mixed;
    }
    Sentiment::from_change(averages.iter().sum::<f64>() / averages.len() as f64)
}

pub async fn crypto(State(state): State<AppState>) -> ApiResult<CryptoResponse> {
    let crypto =
        market::cached_or_refresh(&state.db, state.market.as_ref(), MarketType::Crypto).await?;
    Ok(ApiResponse::success(CryptoResponse { crypto }))
}

pub async fn stocks(State(state): State<AppState>) -> ApiResult<StocksResponse> {
    let stocks =
        market::cached_or_refresh(&state.db, state.market.as_ref(), MarketType::Stocks).await?;
    Ok(ApiResponse::success(StocksResponse { stocks }))
}

pub async fn analysis(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<MarketAnalysis> {
    let usage = state.usage();
    usage.check(auth.user_id, UsageType::MarketAnalysis).await?;

    let crypto =
        market::cached_or_refresh(&state.db, state.market.as_ref(), MarketType::Crypto).await?;
    let stocks =
        market::cached_or_refresh(&state.db, state.market.as_ref(), MarketType::Stocks).await?;

    let ai_analysis = match state.llm.as_deref() {
        Some(llm) => match llm.complete(advisor::market_request(&crypto, &stocks)).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(user_id = %auth.user_id, error = %e, "Market commentary unavailable");
                None
            }
        },
        None => None,
    };

    let call = usage
        .begin(auth.user_id, UsageType::MarketAnalysis)
        .await?;
    let tier = call.tier();
    let check = call.commit().await?;

    Ok(ApiResponse::success(MarketAnalysis {
        market_sentiment: overall_sentiment(&crypto, &stocks),
        crypto: MarketOverview::of(&crypto),
        stocks: MarketOverview::of(&stocks),
        recommendations: market::recommendations(tier == SubscriptionTier::PremiumPlus),
        has_ai_analysis: ai_analysis.is_some(),
        ai_analysis,
        timestamp: Utc::now(),
        limits: check.limits,
    }))
}

pub async fn personalized_analysis(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<PersonalizedRequest>,
) -> ApiResult<PersonalizedResponse> {
    let llm = state.llm()?;

    let usage = state.usage();
    usage.check(auth.user_id, UsageType::MarketAnalysis).await?;

    let balance = Transaction::summary(&state.db, auth.user_id).await?.balance;
    let snapshot = MarketSnapshot {
        crypto: MarketData::top_by_market_cap(&state.db, MarketType::Crypto, PERSONALIZED_TOP)
            .await?,
        stocks: MarketData::top_by_market_cap(&state.db, MarketType::Stocks, PERSONALIZED_TOP)
            .await?,
    };

    let risk_tolerance = req.risk_tolerance.unwrap_or(RiskTolerance::Medium);
    let investment_goals = req
        .investment_goals
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty());
    let profile = InvestorProfile {
        balance,
        risk_tolerance: risk_tolerance.as_str().to_string(),
        investment_goals: investment_goals.clone(),
    };

    let analysis = llm
        .complete(advisor::personalized_request(
            &profile,
            &snapshot.crypto,
            &snapshot.stocks,
        ))
        .await
        .map_err(|e| {
            tracing::error!(user_id = %auth.user_id, error = %e, "Personalized analysis failed");
            ApiError::InternalError("Error generating personalized analysis".to_string())
        })?;

    let analysis_data = serde_json::to_value(&snapshot).map_err(ApiError::internal)?;

    let mut call = usage
        .begin(auth.user_id, UsageType::MarketAnalysis)
        .await?;
    let record = PersonalizedAnalysis::create(
        &mut *call.conn(),
        CreatePersonalizedAnalysis {
            user_id: auth.user_id,
            balance,
            risk_tolerance,
            investment_goals,
            analysis_data,
            recommendations: analysis.clone(),
        },
    )
    .await?;

    let check = call.commit().await?;

    Ok(ApiResponse::success(PersonalizedResponse {
        analysis,
        user_profile: profile,
        market_data: snapshot,
        record,
        limits: check.limits,
    }))
}

pub async fn history(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> ApiResult<MarketData> {
    let symbol = query
        .symbol
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("symbol is required".to_string()))?;

    let row = match query.kind.as_deref() {
        Some(raw) => {
            let kind = MarketType::parse(raw.trim()).ok_or_else(|| {
                ApiError::BadRequest("type must be one of crypto, stocks, forex".to_string())
            })?;
            MarketData::find(&state.db, symbol, kind).await?
        }
        None => MarketData::latest_for_symbol(&state.db, symbol).await?,
    };

    row.map(ApiResponse::success)
        .ok_or_else(|| ApiError::NotFound(format!("No market data for {}", symbol.to_uppercase())))
}
