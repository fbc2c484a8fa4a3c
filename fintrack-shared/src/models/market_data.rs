/// Market snapshots
///
/// One row per (symbol, type) holding the latest quote. Rows are upserted by the refresh
/// path and read by the market and investment endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Crypto,
    Stocks,
    Forex,
}

impl MarketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::Crypto => "crypto",
            MarketType::Stocks => "stocks",
            MarketType::Forex => "forex",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "crypto" => Some(MarketType::Crypto),
            "stocks" => Some(MarketType::Stocks),
            "forex" => Some(MarketType::Forex),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MarketData {
    pub id: Uuid,
    pub symbol: String,
    pub price: f64,
    pub change_24h: f64,
    pub volume_24h: f64,
    pub market_cap: f64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub last_updated: DateTime<Utc>,
}

/// Quote as fetched from a market-data provider, before persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub symbol: String,
    pub price: f64,
    pub change_24h: f64,
    pub volume_24h: f64,
    pub market_cap: f64,
}

const MARKET_COLUMNS: &str =
    "id, symbol, price, change_24h, volume_24h, market_cap, type, last_updated";

impl MarketData {
    /// Inserts or refreshes quotes for one market type, returning the number of rows written
    pub async fn upsert_many(
        pool: &PgPool,
        kind: MarketType,
        quotes: &[MarketQuote],
    ) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut written = 0;

        for quote in quotes {
            let result = sqlx::query(
                r#"
                INSERT INTO market_data (symbol, price, change_24h, volume_24h, market_cap, type, last_updated)
                VALUES ($1, $2, $3, $4, $5, $6, NOW())
                ON CONFLICT (symbol, type) DO UPDATE SET
                    price = EXCLUDED.price,
                    change_24h = EXCLUDED.change_24h,
                    volume_24h = EXCLUDED.volume_24h,
                    market_cap = EXCLUDED.market_cap,
                    last_updated = EXCLUDED.last_updated
                "#,
            )
            .bind(&quote.symbol)
            .bind(quote.price)
            .bind(quote.change_24h)
            .bind(quote.volume_24h)
            .bind(quote.market_cap)
            .bind(kind.as_str())
            .execute(&mut *tx)
            .await?;

            written += result.rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }

    /// Rows of `kind` restricted to `symbols`, largest market cap first
    pub async fn list_symbols(
        pool: &PgPool,
        kind: MarketType,
        symbols: &[&str],
    ) -> Result<Vec<Self>, sqlx::Error> {
        let symbols: Vec<String> = symbols.iter().map(|s| s.to_string()).collect();

        sqlx::query_as::<_, MarketData>(&format!(
            r#"
            SELECT {MARKET_COLUMNS} FROM market_data
            WHERE type = $1 AND symbol = ANY($2)
            ORDER BY market_cap DESC
            "#
        ))
        .bind(kind.as_str())
        .bind(symbols)
        .fetch_all(pool)
        .await
    }

    /// All rows of one market type
    pub async fn list_by_type(pool: &PgPool, kind: MarketType) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, MarketData>(&format!(
            "SELECT {MARKET_COLUMNS} FROM market_data WHERE type = $1 ORDER BY change_24h DESC"
        ))
        .bind(kind.as_str())
        .fetch_all(pool)
        .await
    }

    /// Top `limit` rows of one market type by market cap
    pub async fn top_by_market_cap(
        pool: &PgPool,
        kind: MarketType,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, MarketData>(&format!(
            "SELECT {MARKET_COLUMNS} FROM market_data WHERE type = $1 ORDER BY market_cap DESC LIMIT $2"
        ))
        .bind(kind.as_str())
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn find(
        pool: &PgPool,
        symbol: &str,
        kind: MarketType,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MarketData>(&format!(
            "SELECT {MARKET_COLUMNS} FROM market_data WHERE symbol = $1 AND type = $2"
        ))
        .bind(symbol.to_uppercase())
        .bind(kind.as_str())
        .fetch_optional(pool)
        .await
    }

    /// Most recently updated snapshot of `symbol` across all market types
    pub async fn latest_for_symbol(
        pool: &PgPool,
        symbol: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MarketData>(&format!(
            r#"
            SELECT {MARKET_COLUMNS} FROM market_data
            WHERE symbol = $1
            ORDER BY last_updated DESC
            LIMIT 1
            "#
        ))
        .bind(symbol.to_uppercase())
        .fetch_optional(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_type_parse() {
        assert_eq!(MarketType::parse("stocks"), Some(MarketType::Stocks));
        assert_eq!(MarketType::parse("bonds"), None);
        assert_eq!(MarketType::Forex.as_str(), "forex");
    }
}
