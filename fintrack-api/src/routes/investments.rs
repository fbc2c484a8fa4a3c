/// Investment endpoints
///
/// ```text
/// GET  /api/investments/analysis?symbol=     snapshot, technical labels, prior analyses
/// POST /api/investments/recommend            premium guard; stored and logged as advice usage
/// GET  /api/investments/portfolio            analyses grouped by symbol
/// POST /api/investments/alert                price alert stored as a reminder
/// GET  /api/investments/trends?timeframe=    gainers/losers per market
/// ```

use std::collections::BTreeMap;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiQuery},
    response::ApiResponse,
};
use axum::{extract::State, Extension};
use chrono::{DateTime, Duration, Utc};
use fintrack_shared::{
    auth::middleware::AuthContext,
    market::{self, Level, Trend},
    models::{
        ai_usage::UsageType,
        investment_analysis::{AnalysisType, CreateInvestmentAnalysis, InvestmentAnalysis},
        market_data::{MarketData, MarketType},
        reminder::{CreateReminder, Reminder},
        transaction::{LedgerSummary, Transaction},
    },
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const PRIOR_ANALYSES: i64 = 5;
const RECOMMENDATION_CONFIDENCE: f64 = 0.7;
const ALERT_HORIZON_DAYS: i64 = 30;

#[derive(Debug, Deserialize)]
pub struct SymbolQuery {
    pub symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub symbol: Option<String>,
    pub amount: Option<Decimal>,
    pub timeframe: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AlertRequest {
    pub symbol: Option<String>,
    pub target_price: Option<f64>,
    pub alert_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
    pub timeframe: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TechnicalAnalysis {
    pub trend: Trend,
    pub volatility: Level,
    pub volume: Level,
}

impl TechnicalAnalysis {
    pub fn of(data: &MarketData) -> Self {
        Self {
            trend: Trend::from_change(data.change_24h),
            volatility: market::volatility(data.change_24h),
            volume: market::volume_level(data.volume_24h),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SymbolAnalysis {
    pub market_data: MarketData,
    pub technical_analysis: TechnicalAnalysis,
    pub user_history: Vec<InvestmentAnalysis>,
}

/// Signal derived from the 24h change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Caution,
    Opportunity,
    Neutral,
}

impl Signal {
    /// Caution after a rise above 5 %, opportunity after a drop below -5 %
    pub fn from_change(change: f64) -> Self {
        if change > 5.0 {
            Signal::Caution
        } else if change < -5.0 {
            Signal::Opportunity
        } else {
            Signal::Neutral
        }
    }

    pub fn analysis_type(&self) -> AnalysisType {
        match self {
            Signal::Caution => AnalysisType::Sell,
            Signal::Opportunity => AnalysisType::Buy,
            Signal::Neutral => AnalysisType::Hold,
        }
    }
}

/// Risk of investing `amount` relative to all-time income
pub fn risk_level(amount: Decimal, total_income: Decimal) -> Level {
    if amount > total_income * Decimal::new(10, 2) {
        Level::High
    } else if amount > total_income * Decimal::new(5, 2) {
        Level::Medium
    } else {
        Level::Low
    }
}

pub fn advice(data: &MarketData, risk: Level, ledger: &LedgerSummary) -> String {
    let mut notes = Vec::new();

    match Signal::from_change(data.change_24h) {
        Signal::Caution => {
            notes.push("Price has risen sharply; consider waiting for a correction.")
        }
        Signal::Opportunity => notes.push("Price has dropped; this may be a buying opportunity."),
        Signal::Neutral => {}
    }

    if market::volume_level(data.volume_24h) == Level::High {
        notes.push("High trading volume means better liquidity.");
    }

    notes.push(match risk {
        Level::High => "High-risk investment; do not invest more than 10% of your income.",
        Level::Medium => "Medium-risk investment; consider diversifying.",
        Level::Low => "Low-risk investment; suitable for beginners.",
    });

    if ledger.expenses > ledger.income * Decimal::new(80, 2) {
        notes.push("Consider improving your financial situation before investing.");
    }

    notes.join(" ")
}

#[derive(Debug, Serialize)]
pub struct SignalDetails {
    pub price_change: f64,
    pub volume: f64,
    pub market_cap: f64,
    pub recommendation: Signal,
}

#[derive(Debug, Serialize)]
pub struct Recommendation {
    pub symbol: String,
    pub current_price: f64,
    pub recommended_amount: Decimal,
    pub risk_level: Level,
    pub timeframe: String,
    pub analysis: SignalDetails,
    pub advice: String,
    pub record: InvestmentAnalysis,
}

#[derive(Debug, Serialize)]
pub struct PortfolioEntry {
    pub symbol: String,
    pub total_analyses: usize,
    pub latest_recommendation: Option<InvestmentAnalysis>,
    pub analyses: Vec<InvestmentAnalysis>,
    pub current_market_data: Option<MarketData>,
}

/// Groups analyses (newest first) by symbol
pub fn group_by_symbol(analyses: Vec<InvestmentAnalysis>) -> Vec<PortfolioEntry> {
    let mut groups: BTreeMap<String, Vec<InvestmentAnalysis>> = BTreeMap::new();
    for analysis in analyses {
        groups.entry(analysis.symbol.clone()).or_default().push(analysis);
    }

    groups
        .into_iter()
        .map(|(symbol, analyses)| PortfolioEntry {
            total_analyses: analyses.len(),
            latest_recommendation: analyses.iter().max_by_key(|a| a.created_at).cloned(),
            symbol,
            analyses,
            current_market_data: None,
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct AlertResponse {
    pub message: &'static str,
    pub symbol: String,
    pub current_price: f64,
    pub target_price: f64,
    pub alert_type: String,
    pub is_above: bool,
    pub reminder: Reminder,
}

#[derive(Debug, Serialize)]
pub struct MarketTrend {
    pub total: usize,
    pub gainers: usize,
    pub losers: usize,
    pub top_gainer: Option<MarketData>,
    pub top_loser: Option<MarketData>,
    pub average_change: f64,
}

impl MarketTrend {
    pub fn of(rows: &[MarketData]) -> Self {
        let top_gainer = market::top_gainer(rows).filter(|r| r.change_24h > 0.0);
        let top_loser = market::top_loser(rows).filter(|r| r.change_24h < 0.0);

        Self {
            total: rows.len(),
            gainers: rows.iter().filter(|r| r.change_24h > 0.0).count(),
            losers: rows.iter().filter(|r| r.change_24h < 0.0).count(),
            top_gainer: top_gainer.cloned(),
            top_loser: top_loser.cloned(),
            average_change: market::average_change(rows),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TrendsResponse {
    pub crypto: MarketTrend,
    pub stocks: MarketTrend,
    pub timeframe: &'static str,
}

/// Freshness window for the trends endpoint; unknown values mean 24h
pub fn timeframe_window(raw: Option<&str>) -> (&'static str, Duration) {
    match raw.map(str::trim) {
        Some("1h") => ("1h", Duration::hours(1)),
        Some("7d") => ("7d", Duration::days(7)),
        _ => ("24h", Duration::days(1)),
    }
}

fn required_symbol(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty())
}

async fn latest_snapshot(state: &AppState, symbol: &str) -> Result<MarketData, ApiError> {
    MarketData::latest_for_symbol(&state.db, symbol)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No market data found for {symbol}")))
}

pub async fn analysis(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(query): ApiQuery<SymbolQuery>,
) -> ApiResult<SymbolAnalysis> {
    let symbol = required_symbol(query.symbol)
        .ok_or_else(|| ApiError::BadRequest("symbol is required".to_string()))?;

    let data = latest_snapshot(&state, &symbol).await?;
    let user_history =
        InvestmentAnalysis::recent_for_symbol(&state.db, auth.user_id, &symbol, PRIOR_ANALYSES)
            .await?;

    Ok(ApiResponse::success(SymbolAnalysis {
        technical_analysis: TechnicalAnalysis::of(&data),
        market_data: data,
        user_history,
    }))
}

pub async fn recommend(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<RecommendRequest>,
) -> ApiResult<Recommendation> {
    let (Some(symbol), Some(amount)) = (required_symbol(req.symbol), req.amount) else {
        return Err(ApiError::BadRequest(
            "symbol and amount are required".to_string(),
        ));
    };
    if amount <= Decimal::ZERO {
        return Err(ApiError::BadRequest(
            "Amount must be greater than zero".to_string(),
        ));
    }

    let data = latest_snapshot(&state, &symbol).await?;

    let mut call = state
        .usage()
        .begin(auth.user_id, UsageType::InvestmentAdvice)
        .await?;

    let ledger = Transaction::summary(&mut *call.conn(), auth.user_id).await?;
    let risk = risk_level(amount, ledger.income);
    let signal = Signal::from_change(data.change_24h);
    let details = SignalDetails {
        price_change: data.change_24h,
        volume: data.volume_24h,
        market_cap: data.market_cap,
        recommendation: signal,
    };
    let advice = advice(&data, risk, &ledger);

    let record = InvestmentAnalysis::create(
        &mut *call.conn(),
        CreateInvestmentAnalysis {
            user_id: auth.user_id,
            symbol: data.symbol.clone(),
            analysis_type: signal.analysis_type(),
            confidence_score: RECOMMENDATION_CONFIDENCE,
            reasoning: serde_json::to_string(&details).map_err(ApiError::internal)?,
            ai_recommendation: Some(advice.clone()),
        },
    )
    .await?;

    call.commit().await?;

    Ok(ApiResponse::success(Recommendation {
        symbol: data.symbol,
        current_price: data.price,
        recommended_amount: amount.round_dp(2),
        risk_level: risk,
        timeframe: req.timeframe.unwrap_or_else(|| "long-term".to_string()),
        analysis: details,
        advice,
        record,
    }))
}

pub async fn portfolio(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Vec<PortfolioEntry>> {
    let analyses = InvestmentAnalysis::list_by_user(&state.db, auth.user_id).await?;

    let mut entries = group_by_symbol(analyses);
    for entry in &mut entries {
        entry.current_market_data = MarketData::latest_for_symbol(&state.db, &entry.symbol).await?;
    }

    Ok(ApiResponse::success(entries))
}

pub async fn create_alert(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<AlertRequest>,
) -> ApiResult<AlertResponse> {
    let (Some(symbol), Some(target_price)) = (required_symbol(req.symbol), req.target_price) else {
        return Err(ApiError::BadRequest(
            "symbol and target_price are required".to_string(),
        ));
    };
    if !target_price.is_finite() || target_price <= 0.0 {
        return Err(ApiError::BadRequest(
            "target_price must be greater than zero".to_string(),
        ));
    }

    let data = latest_snapshot(&state, &symbol).await?;
    let is_above = target_price > data.price;
    let direction = if is_above { "rise" } else { "drop" };

    let reminder = Reminder::create(
        &state.db,
        CreateReminder {
            user_id: auth.user_id,
            title: format!("{symbol} alert: {direction} to ${target_price}"),
            description: Some(format!(
                "Current price: ${}. Waiting for a {direction} to ${target_price}",
                data.price
            )),
            amount: None,
            due_date: (Utc::now() + Duration::days(ALERT_HORIZON_DAYS)).date_naive(),
            reminder_days: 1,
            recurrence: None,
        },
    )
    .await?;

    tracing::debug!(user_id = %auth.user_id, symbol = %symbol, reminder_id = %reminder.id, "Price alert created");

    Ok(ApiResponse::created(AlertResponse {
        message: "Investment alert created",
        symbol,
        current_price: data.price,
        target_price,
        alert_type: req.alert_type.unwrap_or_else(|| "price".to_string()),
        is_above,
        reminder,
    }))
}

fn fresh_since(rows: Vec<MarketData>, since: DateTime<Utc>) -> Vec<MarketData> {
    rows.into_iter().filter(|r| r.last_updated >= since).collect()
}

pub async fn trends(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TrendsQuery>,
) -> ApiResult<TrendsResponse> {
    let (timeframe, window) = timeframe_window(query.timeframe.as_deref());
    let since = Utc::now() - window;

    let crypto = MarketData::list_symbols(
        &state.db,
        MarketType::Crypto,
        market::tracked_symbols(MarketType::Crypto),
    )
    .await?;
    let stocks = MarketData::list_symbols(
        &state.db,
        MarketType::Stocks,
        market::tracked_symbols(MarketType::Stocks),
    )
    .await?;

    Ok(ApiResponse::success(TrendsResponse {
        crypto: MarketTrend::of(&fresh_since(crypto, since)),
        stocks: MarketTrend::of(&fresh_since(stocks, since)),
        timeframe,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn data(change: f64, volume: f64) -> MarketData {
        MarketData {
            id: Uuid::new_v4(),
            symbol: "BTC".to_string(),
            price: 50_000.0,
            change_24h: change,
            volume_24h: volume,
            market_cap: 0.0,
            kind: "crypto".to_string(),
            last_updated: Utc::now(),
        }
    }

    fn stored(symbol: &str, minutes_ago: i64) -> InvestmentAnalysis {
        InvestmentAnalysis {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            analysis_type: "hold".to_string(),
            confidence_score: 0.7,
            reasoning: "{}".to_string(),
            ai_recommendation: None,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn test_signal_mapping() {
        assert_eq!(Signal::from_change(6.0), Signal::Caution);
        assert_eq!(Signal::from_change(-6.0), Signal::Opportunity);
        assert_eq!(Signal::from_change(5.0), Signal::Neutral);

        assert_eq!(Signal::Caution.analysis_type(), AnalysisType::Sell);
        assert_eq!(Signal::Opportunity.analysis_type(), AnalysisType::Buy);
        assert_eq!(Signal::Neutral.analysis_type(), AnalysisType::Hold);
    }

    #[test]
    fn test_risk_level() {
        let income = Decimal::from(10_000);
        assert_eq!(risk_level(Decimal::from(1_500), income), Level::High);
        assert_eq!(risk_level(Decimal::from(800), income), Level::Medium);
        assert_eq!(risk_level(Decimal::from(500), income), Level::Low);
        assert_eq!(risk_level(Decimal::ONE, Decimal::ZERO), Level::High);
    }

    #[test]
    fn test_advice_text() {
        let ledger = LedgerSummary::new(Decimal::from(1000), Decimal::from(900));
        let text = advice(&data(7.0, 2_000_000.0), Level::High, &ledger);

        assert!(text.contains("correction"));
        assert!(text.contains("liquidity"));
        assert!(text.contains("10% of your income"));
        assert!(text.contains("before investing"));
    }

    #[test]
    fn test_technical_labels() {
        let labels = TechnicalAnalysis::of(&data(3.0, 500_000.0));
        assert_eq!(labels.trend, Trend::Bullish);
        assert_eq!(labels.volatility, Level::Medium);
        assert_eq!(labels.volume, Level::Medium);
    }

    #[test]
    fn test_group_by_symbol() {
        let entries = group_by_symbol(vec![stored("ETH", 1), stored("BTC", 5), stored("BTC", 60)]);

        assert_eq!(entries.len(), 2);
        let btc = &entries[0];
        assert_eq!(btc.symbol, "BTC");
        assert_eq!(btc.total_analyses, 2);
        assert_eq!(
            btc.latest_recommendation.as_ref().unwrap().created_at,
            btc.analyses[0].created_at
        );
    }

    #[test]
    fn test_market_trend() {
        let trend = MarketTrend::of(&[data(2.0, 0.0), data(-1.0, 0.0), data(0.0, 0.0)]);
        assert_eq!(trend.total, 3);
        assert_eq!(trend.gainers, 1);
        assert_eq!(trend.losers, 1);
        assert!(trend.top_gainer.is_some());

        let flat = MarketTrend::of(&[data(0.0, 0.0)]);
        assert!(flat.top_gainer.is_none());
        assert!(flat.top_loser.is_none());
    }

    #[test]
    fn test_timeframe_window() {
        assert_eq!(timeframe_window(Some("1h")).1, Duration::hours(1));
        assert_eq!(timeframe_window(Some("forever")).0, "24h");
        assert_eq!(timeframe_window(None).1, Duration::days(1));
    }
}
