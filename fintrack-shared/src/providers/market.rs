/// Market quotes from public HTTP APIs
///
/// Crypto comes from CoinGecko's `/coins/markets` (top 50 by market cap, USD). Stocks come
/// from Yahoo Finance's chart endpoint, one request per ticker, issued concurrently.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;

use super::{ensure_success, MarketDataProvider, ProviderError};
use crate::models::market_data::MarketQuote;

pub const COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";
pub const YAHOO_API_BASE: &str = "https://query1.finance.yahoo.com";

pub struct HttpMarketProvider {
    http: reqwest::Client,
    coingecko_base: String,
    yahoo_base: String,
}

impl HttpMarketProvider {
    pub fn new(http: reqwest::Client) -> Self {
        HttpMarketProvider {
            http,
            coingecko_base: COINGECKO_API_BASE.to_string(),
            yahoo_base: YAHOO_API_BASE.to_string(),
        }
    }

    pub fn with_base_urls(
        mut self,
        coingecko_base: impl Into<String>,
        yahoo_base: impl Into<String>,
    ) -> Self {
        self.coingecko_base = coingecko_base.into();
        self.yahoo_base = yahoo_base.into();
        self
    }

    async fn fetch_stock(&self, symbol: &str) -> Result<MarketQuote, ProviderError> {
        let response = self
            .http
            .get(format!("{}/v8/finance/chart/{}", self.yahoo_base, symbol))
            .send()
            .await?;

        let chart: ChartResponse = ensure_success(response).await?.json().await?;
        chart_quote(symbol, chart)
    }
}

#[derive(Debug, Deserialize)]
struct CoinGeckoCoin {
    symbol: Option<String>,
    current_price: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    total_volume: Option<f64>,
    market_cap: Option<f64>,
}

impl From<CoinGeckoCoin> for MarketQuote {
    fn from(coin: CoinGeckoCoin) -> Self {
        MarketQuote {
            symbol: coin
                .symbol
                .map(|s| s.to_uppercase())
                .unwrap_or_else(|| "UNKNOWN".to_string()),
            price: coin.current_price.unwrap_or(0.0),
            change_24h: coin.price_change_percentage_24h.unwrap_or(0.0),
            volume_24h: coin.total_volume.unwrap_or(0.0),
            market_cap: coin.market_cap.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
    regular_market_volume: Option<f64>,
    market_cap: Option<f64>,
}

/// Builds a quote from a chart response; the 24h change is derived from the previous close
fn chart_quote(symbol: &str, chart: ChartResponse) -> Result<MarketQuote, ProviderError> {
    let meta = chart
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .map(|result| result.meta)
        .ok_or_else(|| ProviderError::InvalidResponse(format!("no chart data for {symbol}")))?;

    let price = meta.regular_market_price.unwrap_or(0.0);
    let change_24h = match meta.chart_previous_close {
        Some(previous) if previous > 0.0 => (price - previous) / previous * 100.0,
        _ => 0.0,
    };

    Ok(MarketQuote {
        symbol: symbol.to_uppercase(),
        price,
        change_24h,
        volume_24h: meta.regular_market_volume.unwrap_or(0.0),
        market_cap: meta.market_cap.unwrap_or(0.0),
    })
}

#[async_trait]
impl MarketDataProvider for HttpMarketProvider {
    async fn fetch_crypto(&self) -> Result<Vec<MarketQuote>, ProviderError> {
        let response = self
            .http
            .get(format!("{}/coins/markets", self.coingecko_base))
            .query(&[
                ("vs_currency", "usd"),
                ("order", "market_cap_desc"),
                ("per_page", "50"),
                ("page", "1"),
                ("sparkline", "false"),
            ])
            .send()
            .await?;

        let coins: Vec<CoinGeckoCoin> = ensure_success(response).await?.json().await?;
        Ok(coins.into_iter().map(MarketQuote::from).collect())
    }

    async fn fetch_stocks(&self, symbols: &[&str]) -> Result<Vec<MarketQuote>, ProviderError> {
        let results = join_all(symbols.iter().map(|symbol| self.fetch_stock(symbol))).await;

        let mut quotes = Vec::with_capacity(symbols.len());
        for (symbol, result) in symbols.iter().zip(results) {
            match result {
                Ok(quote) => quotes.push(quote),
                Err(e) => tracing::warn!(symbol = %symbol, error = %e, "Skipping stock quote"),
            }
        }

        if quotes.is_empty() && !symbols.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "no stock quotes could be fetched".to_string(),
            ));
        }

        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_defaults_missing_fields() {
        let coin: CoinGeckoCoin = serde_json::from_value(serde_json::json!({
            "symbol": "btc",
            "current_price": 64000.5,
            "price_change_percentage_24h": null,
            "total_volume": 1.0e10
        }))
        .unwrap();

        let quote = MarketQuote::from(coin);
        assert_eq!(quote.symbol, "BTC");
        assert_eq!(quote.price, 64000.5);
        assert_eq!(quote.change_24h, 0.0);
        assert_eq!(quote.market_cap, 0.0);
    }

    #[test]
    fn test_chart_quote_change_from_previous_close() {
        let chart: ChartResponse = serde_json::from_value(serde_json::json!({
            "chart": {"result": [{"meta": {
                "regularMarketPrice": 110.0,
                "chartPreviousClose": 100.0,
                "regularMarketVolume": 5000000.0
            }}]}
        }))
        .unwrap();

        let quote = chart_quote("aapl", chart).unwrap();
        assert_eq!(quote.symbol, "AAPL");
        assert!((quote.change_24h - 10.0).abs() < 1e-9);
        assert_eq!(quote.volume_24h, 5_000_000.0);
    }

    #[test]
    fn test_chart_without_result() {
        let chart: ChartResponse =
            serde_json::from_value(serde_json::json!({"chart": {"result": null}})).unwrap();
        assert!(chart_quote("AAPL", chart).is_err());
    }
}
