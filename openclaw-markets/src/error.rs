use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// All errors generated in `openclaw-markets`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum MarketDataError {
    #[error("http request for {symbol} failed: {detail}")]
    Http { symbol: SmolStr, detail: String },

    #[error("no quote available for symbol: {0}")]
    QuoteUnavailable(SmolStr),

    #[error("provider returned unparseable payload for {symbol}: {detail}")]
    InvalidPayload { symbol: SmolStr, detail: String },

    #[error("provider returned non-positive price {price} for {symbol}")]
    InvalidPrice { symbol: SmolStr, price: f64 },
}

impl MarketDataError {
    pub fn http(symbol: impl Into<SmolStr>, error: &reqwest::Error) -> Self {
        Self::Http {
            symbol: symbol.into(),
            detail: error.to_string(),
        }
    }
}
