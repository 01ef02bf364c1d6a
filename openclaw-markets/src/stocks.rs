use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use smol_str::SmolStr;
use tracing::warn;

use crate::{cache::QuoteCache, error::MarketDataError, normalize_symbol, Quote, QuoteProvider};

/// Yahoo Finance chart url. The final path segment is the bare ticker.
pub const HTTP_CHART_URL_YAHOO: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Stock [`QuoteProvider`] backed by the Yahoo Finance chart endpoint.
///
/// Accepts bare US equity tickers (eg/ `NVDA`).
#[derive(Debug)]
pub struct StockQuotes {
    client: reqwest::Client,
    cache: QuoteCache,
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
}

impl Default for StockQuotes {
    fn default() -> Self {
        Self::new(QuoteCache::default())
    }
}

impl StockQuotes {
    pub fn new(cache: QuoteCache) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache,
        }
    }

    async fn fetch_uncached(&self, symbol: &SmolStr) -> Result<f64, MarketDataError> {
        let url = format!("{}/{}", HTTP_CHART_URL_YAHOO, symbol);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|error| MarketDataError::http(symbol.clone(), &error))?
            .json::<ChartResponse>()
            .await
            .map_err(|error| MarketDataError::http(symbol.clone(), &error))?;

        let price = response
            .chart
            .result
            .and_then(|mut results| results.pop())
            .and_then(|result| result.meta.regular_market_price)
            .ok_or_else(|| MarketDataError::QuoteUnavailable(symbol.clone()))?;

        if price <= 0.0 {
            return Err(MarketDataError::InvalidPrice {
                symbol: symbol.clone(),
                price,
            });
        }

        Ok(price)
    }
}

#[async_trait]
impl QuoteProvider for StockQuotes {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let symbol = normalize_symbol(symbol);

        if let Some(price) = self.cache.get(&symbol) {
            return Ok(Quote::new(symbol, price));
        }

        let price = self.fetch_uncached(&symbol).await?;
        self.cache.insert(symbol.clone(), price);

        Ok(Quote::new(symbol, price))
    }

    async fn fetch_quotes(&self, symbols: &[String]) -> Vec<Quote> {
        let fetches = symbols.iter().map(|symbol| async move {
            match self.fetch_quote(symbol).await {
                Ok(quote) => quote,
                Err(error) => {
                    warn!(symbol = %symbol, %error, "bulk quote fetch degraded to price=0");
                    Quote::new(normalize_symbol(symbol), 0.0)
                }
            }
        });

        join_all(fetches).await
    }

    fn clear_cache(&self) {
        self.cache.clear();
    }
}
