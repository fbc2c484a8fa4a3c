/// Market data cache, refresh and trend helpers
///
/// Snapshots live in `market_data`; reads go through [`cached_or_refresh`], which refetches
/// from the provider when the tracked symbols are missing or older than [`CACHE_TTL_MINUTES`].
/// The background worker calls [`refresh_all`] on a timer and logs each run to
/// `scraping_logs`.

use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::models::market_data::{MarketData, MarketType};
use crate::models::scraping::{CreateScrapingLog, ScrapeScope, ScrapeStatus, ScrapingConfig, ScrapingLog};
use crate::providers::{MarketDataProvider, ProviderError};

pub const CRYPTO_SYMBOLS: [&str; 10] = [
    "BTC", "ETH", "BNB", "XRP", "ADA", "SOL", "DOGE", "DOT", "AVAX", "MATIC",
];

pub const STOCK_SYMBOLS: [&str; 10] = [
    "AAPL", "MSFT", "GOOGL", "AMZN", "TSLA", "META", "NVDA", "NFLX", "AMD", "INTC",
];

/// Snapshots older than this are refetched on read
pub const CACHE_TTL_MINUTES: i64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Market provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Tracked symbols of a market type
pub fn tracked_symbols(kind: MarketType) -> &'static [&'static str] {
    match kind {
        MarketType::Crypto => &CRYPTO_SYMBOLS,
        MarketType::Stocks => &STOCK_SYMBOLS,
        MarketType::Forex => &[],
    }
}

/// True when `rows` is empty or its freshest snapshot is older than the TTL
pub fn is_stale(rows: &[MarketData], now: DateTime<Utc>) -> bool {
    match rows.iter().map(|row| row.last_updated).max() {
        Some(newest) => now - newest > Duration::minutes(CACHE_TTL_MINUTES),
        None => true,
    }
}

/// Fetches one market type from the provider and upserts it
pub async fn refresh(
    pool: &PgPool,
    provider: &dyn MarketDataProvider,
    kind: MarketType,
) -> Result<u64, MarketError> {
    let quotes = match kind {
        MarketType::Crypto => provider.fetch_crypto().await?,
        MarketType::Stocks => provider.fetch_stocks(&STOCK_SYMBOLS).await?,
        MarketType::Forex => Vec::new(),
    };

    let written = MarketData::upsert_many(pool, kind, &quotes).await?;
    ScrapingConfig::touch(pool, kind).await?;

    tracing::debug!(kind = kind.as_str(), written, "Market data refreshed");
    Ok(written)
}

/// Tracked snapshots of `kind`, refetched first when stale
///
/// A provider failure is logged and the cached rows are served as they are.
pub async fn cached_or_refresh(
    pool: &PgPool,
    provider: &dyn MarketDataProvider,
    kind: MarketType,
) -> Result<Vec<MarketData>, sqlx::Error> {
    let symbols = tracked_symbols(kind);
    let rows = MarketData::list_symbols(pool, kind, symbols).await?;

    if !is_stale(&rows, Utc::now()) {
        return Ok(rows);
    }

    match refresh(pool, provider, kind).await {
        Ok(_) => MarketData::list_symbols(pool, kind, symbols).await,
        Err(MarketError::Database(e)) => Err(e),
        Err(MarketError::Provider(e)) => {
            tracing::warn!(kind = kind.as_str(), error = %e, "Market refresh failed, serving cache");
            Ok(rows)
        }
    }
}

/// Outcome of a full refresh run
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub status: ScrapeStatus,
    pub records_updated: u64,
    pub errors: Vec<String>,
    pub execution_time_ms: i64,
}

/// Refreshes crypto and stocks concurrently and writes one `full` scraping log row
///
/// Status is `success` when both succeed, `partial` when one fails, `error` when both do.
pub async fn refresh_all(
    pool: &PgPool,
    provider: &dyn MarketDataProvider,
) -> Result<RefreshReport, sqlx::Error> {
    let started = Instant::now();

    let (crypto, stocks) = tokio::join!(
        refresh(pool, provider, MarketType::Crypto),
        refresh(pool, provider, MarketType::Stocks),
    );

    let mut records_updated = 0;
    let mut errors = Vec::new();
    for (kind, result) in [(MarketType::Crypto, crypto), (MarketType::Stocks, stocks)] {
        match result {
            Ok(written) => records_updated += written,
            Err(e) => {
                tracing::warn!(kind = kind.as_str(), error = %e, "Market refresh failed");
                errors.push(format!("{}: {}", kind.as_str(), e));
            }
        }
    }

    let status = match errors.len() {
        0 => ScrapeStatus::Success,
        1 => ScrapeStatus::Partial,
        _ => ScrapeStatus::Error,
    };
    let execution_time_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

    ScrapingLog::create(
        pool,
        CreateScrapingLog {
            scope: ScrapeScope::Full,
            status,
            records_updated: i32::try_from(records_updated).unwrap_or(i32::MAX),
            error_message: (!errors.is_empty()).then(|| errors.join("; ")),
            execution_time_ms,
        },
    )
    .await?;

    Ok(RefreshReport {
        status,
        records_updated,
        errors,
        execution_time_ms,
    })
}

/// Mean 24h change; 0 for an empty slice
pub fn average_change(rows: &[MarketData]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().map(|row| row.change_24h).sum::<f64>() / rows.len() as f64
}

pub fn top_gainer(rows: &[MarketData]) -> Option<&MarketData> {
    rows.iter().max_by(|a, b| a.change_24h.total_cmp(&b.change_24h))
}

pub fn top_loser(rows: &[MarketData]) -> Option<&MarketData> {
    rows.iter().min_by(|a, b| a.change_24h.total_cmp(&b.change_24h))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Mixed,
}

impl Sentiment {
    /// Bullish above +2 %, bearish below -2 %, mixed otherwise
    pub fn from_change(change: f64) -> Self {
        if change > 2.0 {
            Sentiment::Bullish
        } else if change < -2.0 {
            Sentiment::Bearish
        } else {
            Sentiment::Mixed
        }
    }
}

/// Direction of a single asset's 24h change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl Trend {
    pub fn from_change(change: f64) -> Self {
        if change > 0.0 {
            Trend::Bullish
        } else if change < 0.0 {
            Trend::Bearish
        } else {
            Trend::Neutral
        }
    }
}

/// Three-step label shared by volatility, volume and risk classifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    High,
    Medium,
    Low,
}

/// Volatility from the 24h change: high above 5 %, medium above 2 %
pub fn volatility(change_24h: f64) -> Level {
    if change_24h > 5.0 {
        Level::High
    } else if change_24h > 2.0 {
        Level::Medium
    } else {
        Level::Low
    }
}

/// Volume label: high above 1M, medium above 100k
pub fn volume_level(volume_24h: f64) -> Level {
    if volume_24h > 1_000_000.0 {
        Level::High
    } else if volume_24h > 100_000.0 {
        Level::Medium
    } else {
        Level::Low
    }
}

const BASE_RECOMMENDATIONS: [&str; 3] = [
    "Diversify your portfolio across different assets",
    "Keep an emergency fund covering 3-6 months of expenses",
    "Only invest what you can afford to lose",
];

const ADVANCED_RECOMMENDATIONS: [&str; 4] = [
    "Consider dollar-cost averaging into long-term positions",
    "Evaluate arbitrage opportunities between exchanges",
    "Monitor advanced technical indicators",
    "Consider hedging strategies to protect gains",
];

/// General recommendations; the advanced set is added for premium+
pub fn recommendations(include_advanced: bool) -> Vec<&'static str> {
    let mut list = BASE_RECOMMENDATIONS.to_vec();
    if include_advanced {
        list.extend_from_slice(&ADVANCED_RECOMMENDATIONS);
    }
    list
}
