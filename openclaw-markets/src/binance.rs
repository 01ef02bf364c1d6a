use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use smol_str::SmolStr;
use tracing::warn;

use crate::{cache::QuoteCache, error::MarketDataError, normalize_symbol, Quote, QuoteProvider};

/// Binance spot ticker price url.
///
/// See docs: <https://binance-docs.github.io/apidocs/spot/en/#symbol-price-ticker>
pub const HTTP_TICKER_PRICE_URL_BINANCE_SPOT: &str = "https://api.binance.com/api/v3/ticker/price";

/// Crypto [`QuoteProvider`] backed by the Binance spot ticker endpoint.
///
/// Accepts symbols of the form `BASEQUOTE` (eg/ `BTCUSDT`).
#[derive(Debug)]
pub struct BinanceQuotes {
    client: reqwest::Client,
    cache: QuoteCache,
}

/// Deserializable `ticker/price` payload. Binance serialises the price as a
/// decimal string.
#[derive(Debug, Deserialize)]
struct BinanceTickerPrice {
    symbol: String,
    price: String,
}

impl Default for BinanceQuotes {
    fn default() -> Self {
        Self::new(QuoteCache::default())
    }
}

impl BinanceQuotes {
    pub fn new(cache: QuoteCache) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache,
        }
    }

    async fn fetch_uncached(&self, symbol: &SmolStr) -> Result<f64, MarketDataError> {
        let url = format!("{}?symbol={}", HTTP_TICKER_PRICE_URL_BINANCE_SPOT, symbol);

        let ticker = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|error| MarketDataError::http(symbol.clone(), &error))?
            .json::<BinanceTickerPrice>()
            .await
            .map_err(|error| MarketDataError::http(symbol.clone(), &error))?;

        let price =
            ticker
                .price
                .parse::<f64>()
                .map_err(|error| MarketDataError::InvalidPayload {
                    symbol: SmolStr::new(&ticker.symbol),
                    detail: error.to_string(),
                })?;

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
impl QuoteProvider for BinanceQuotes {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_ticker_price_payload() {
        let payload = r#"{"symbol":"BTCUSDT","price":"60000.12000000"}"#;

        let ticker = serde_json::from_str::<BinanceTickerPrice>(payload).unwrap();

        assert_eq!(ticker.symbol, "BTCUSDT");
        assert_eq!(ticker.price.parse::<f64>().unwrap(), 60000.12);
    }
}
