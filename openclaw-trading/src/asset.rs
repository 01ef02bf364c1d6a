use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::borrow::Borrow;

/// Normalized ticker symbol, upper-cased at ingress.
///
/// Crypto tickers are stored as the base asset only (eg/ `BTC`); the `USDT`
/// quote suffix is appended at the provider request boundary.
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Serialize, Deserialize,
)]
pub struct Ticker(SmolStr);

impl Ticker {
    pub fn new<S>(symbol: S) -> Self
    where
        S: AsRef<str>,
    {
        Self(SmolStr::new(symbol.as_ref().trim().to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Symbol used to quote this ticker against USDT, eg/ `BTC` ->
    /// `BTCUSDT`. Already-suffixed tickers pass through unchanged.
    pub fn usdt_pair(&self) -> String {
        if self.0.ends_with(USDT_QUOTE_SUFFIX) {
            self.0.to_string()
        } else {
            format!("{}{}", self.0, USDT_QUOTE_SUFFIX)
        }
    }
}

/// Quote-asset suffix crypto tickers carry at the provider boundary.
pub const USDT_QUOTE_SUFFIX: &str = "USDT";

impl From<&str> for Ticker {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Ticker {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl Borrow<str> for Ticker {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Asset class tag carried by every holding and position.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    UsStockSpot,
    CryptoSpot,
    CryptoPerp,
    UsStockOption,
}

/// Spot routing hint: which quote source a ticker is served by.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    #[default]
    Crypto,
    Stock,
}

impl AssetKind {
    pub fn spot_asset_class(&self) -> AssetClass {
        match self {
            AssetKind::Crypto => AssetClass::CryptoSpot,
            AssetKind::Stock => AssetClass::UsStockSpot,
        }
    }
}

/// Direction of a futures position.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[display("long")]
    Long,
    #[display("short")]
    Short,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_is_uppercased_and_trimmed() {
        assert_eq!(Ticker::new(" btc "), Ticker::new("BTC"));
        assert_eq!(Ticker::new("nvda").as_str(), "NVDA");
    }

    #[test]
    fn asset_class_serializes_snake_case() {
        let json = serde_json::to_string(&AssetClass::UsStockSpot).unwrap();
        assert_eq!(json, r#""us_stock_spot""#);

        let json = serde_json::to_string(&AssetClass::CryptoPerp).unwrap();
        assert_eq!(json, r#""crypto_perp""#);
    }

    #[test]
    fn asset_kind_defaults_to_crypto() {
        assert_eq!(AssetKind::default(), AssetKind::Crypto);
        assert_eq!(
            AssetKind::Crypto.spot_asset_class(),
            AssetClass::CryptoSpot
        );
        assert_eq!(
            AssetKind::Stock.spot_asset_class(),
            AssetClass::UsStockSpot
        );
    }
}
