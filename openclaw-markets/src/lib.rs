#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! # Openclaw-Markets
//! Market-data capability consumed by the `openclaw-trading` engine core.
//!
//! The engines only depend on the [`QuoteProvider`] trait. Two concrete
//! providers are shipped:
//! * [`BinanceQuotes`](binance::BinanceQuotes) for crypto pairs quoted as
//!   `BASEQUOTE` symbols (eg/ `BTCUSDT`).
//! * [`StockQuotes`](stocks::StockQuotes) for US equities quoted by bare
//!   ticker (eg/ `NVDA`).
//!
//! Both share the same behaviour contract: symbols are normalized to
//! upper-case, successful fetches are cached for 30 seconds, and bulk fetches
//! degrade per-symbol (a failed symbol yields `price = 0.0`) rather than
//! failing the batch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::MarketDataError;

/// Errors generated by quote providers.
pub mod error;

/// Process-local TTL quote cache.
pub mod cache;

/// Crypto quote provider backed by the Binance spot ticker endpoint.
pub mod binance;

/// Stock quote provider backed by a chart/quote HTTP endpoint.
pub mod stocks;

/// A spot price for a normalized symbol.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Quote {
    pub symbol: SmolStr,
    pub price: f64,
}

impl Quote {
    pub fn new(symbol: impl Into<SmolStr>, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
        }
    }
}

/// Capability for fetching spot prices.
///
/// `fetch_quote` fails loudly on provider errors. `fetch_quotes` never fails
/// the batch: an individually failed symbol is returned with `price = 0.0`
/// so callers can decide how to degrade.
#[async_trait]
pub trait QuoteProvider: Send + Sync + std::fmt::Debug {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError>;

    async fn fetch_quotes(&self, symbols: &[String]) -> Vec<Quote>;

    fn clear_cache(&self);
}

/// Normalize a requested symbol to the upper-case form used for cache keys
/// and provider requests.
pub fn normalize_symbol(symbol: &str) -> SmolStr {
    SmolStr::new(symbol.trim().to_uppercase())
}

/// Deterministic [`QuoteProvider`] implementations for testing.
pub mod test_utils {
    use super::*;
    use parking_lot::RwLock;
    use std::collections::{HashMap, HashSet};

    /// In-memory provider with settable prices and failure injection.
    #[derive(Debug, Default)]
    pub struct MockQuotes {
        prices: RwLock<HashMap<SmolStr, f64>>,
        failing: RwLock<HashSet<SmolStr>>,
    }

    impl MockQuotes {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_prices<I, S>(prices: I) -> Self
        where
            I: IntoIterator<Item = (S, f64)>,
            S: AsRef<str>,
        {
            let mock = Self::new();
            for (symbol, price) in prices {
                mock.set_price(symbol.as_ref(), price);
            }
            mock
        }

        pub fn set_price(&self, symbol: &str, price: f64) {
            let symbol = normalize_symbol(symbol);
            self.failing.write().remove(&symbol);
            self.prices.write().insert(symbol, price);
        }

        /// Make subsequent fetches for this symbol fail.
        pub fn set_failing(&self, symbol: &str) {
            self.failing.write().insert(normalize_symbol(symbol));
        }
    }

    #[async_trait]
    impl QuoteProvider for MockQuotes {
        async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
            let symbol = normalize_symbol(symbol);

            if self.failing.read().contains(&symbol) {
                return Err(MarketDataError::QuoteUnavailable(symbol));
            }

            self.prices
                .read()
                .get(&symbol)
                .map(|price| Quote::new(symbol.clone(), *price))
                .ok_or(MarketDataError::QuoteUnavailable(symbol))
        }

        async fn fetch_quotes(&self, symbols: &[String]) -> Vec<Quote> {
            let mut quotes = Vec::with_capacity(symbols.len());
            for symbol in symbols {
                let quote = match self.fetch_quote(symbol).await {
                    Ok(quote) => quote,
                    Err(_) => Quote::new(normalize_symbol(symbol), 0.0),
                };
                quotes.push(quote);
            }
            quotes
        }

        fn clear_cache(&self) {}
    }
}

#[cfg(test)]
mod tests {
    use super::{test_utils::MockQuotes, *};

    #[test]
    fn test_normalize_symbol() {
        struct TestCase {
            input: &'static str,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: already normalized
                input: "BTCUSDT",
                expected: "BTCUSDT",
            },
            TestCase {
                // TC1: lower-case input
                input: "ethusdt",
                expected: "ETHUSDT",
            },
            TestCase {
                // TC2: surrounding whitespace
                input: "  nvda ",
                expected: "NVDA",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = normalize_symbol(test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[tokio::test]
    async fn mock_bulk_fetch_degrades_per_symbol() {
        let mock = MockQuotes::with_prices([("BTCUSDT", 60_000.0), ("ETHUSDT", 3_500.0)]);
        mock.set_failing("ETHUSDT");

        let quotes = mock
            .fetch_quotes(&["btcusdt".to_string(), "ethusdt".to_string()])
            .await;

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0], Quote::new("BTCUSDT", 60_000.0));
        assert_eq!(quotes[1], Quote::new("ETHUSDT", 0.0));
    }

    #[tokio::test]
    async fn mock_single_fetch_fails_loudly() {
        let mock = MockQuotes::new();

        let result = mock.fetch_quote("SOLUSDT").await;

        assert_eq!(
            result,
            Err(MarketDataError::QuoteUnavailable(SmolStr::new("SOLUSDT")))
        );
    }
}
