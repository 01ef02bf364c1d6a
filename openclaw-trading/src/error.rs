use crate::store::StoreError;
use openclaw_markets::error::MarketDataError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors surfaced by engine operations.
///
/// Every public operation returns `Result<T, TradingError>`; the variants map
/// one-to-one onto the `{success: false, message}` responses an RPC boundary
/// serialises, so none of them is ever raised as a panic across the engine
/// surface.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum TradingError {
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("insufficient funds: required ${required:.2}, available ${available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("insufficient holdings: requested {requested}, held {held}")]
    InsufficientHoldings { requested: f64, held: f64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("market data: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("persistence: {0}")]
    Persistence(#[from] StoreError),
}

impl TradingError {
    pub fn invalid_param(message: impl Into<String>) -> Self {
        Self::InvalidParam(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}
