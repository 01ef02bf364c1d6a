use crate::asset::{AssetClass, Side, Ticker};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// An open isolated-margin perpetual position.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FuturesPosition {
    /// Stable unique id, assigned at open.
    pub id: String,
    pub ticker: Ticker,
    pub asset_class: AssetClass,
    pub side: Side,
    /// Contracts held, in base-asset units. Positive while open.
    pub quantity: f64,
    pub entry_price: f64,
    /// Last observed mark price.
    pub mark_price: f64,
    pub leverage: u32,
    pub margin_mode: MarginMode,
    /// Margin posted at entry (scaled down on partial close).
    pub initial_margin: f64,
    /// Informational; liquidation decisions use `liquidation_price`.
    pub maintenance_margin: f64,
    /// Margin currently backing the position; the maximum loss.
    pub margin_balance: f64,
    pub liquidation_price: f64,
    pub maintenance_margin_rate: f64,
    pub unrealized_pnl: f64,
    /// Unrealized return on the posted margin, in percent.
    pub roe: f64,
    /// PnL realised by partial closes while the position stays open.
    pub realized_pnl: f64,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Only isolated margin is supported.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginMode {
    #[default]
    Isolated,
}

/// Persisted futures aggregate.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FuturesData {
    #[serde(default)]
    pub positions: Vec<FuturesPosition>,
    /// Per-ticker leverage applied when an open call omits one.
    #[serde(default)]
    pub leverage_settings: IndexMap<Ticker, u32>,
    #[serde(default)]
    pub transactions: Vec<FuturesTransaction>,
}

/// A single executed futures trade or liquidation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FuturesTransaction {
    #[serde(rename = "type")]
    pub kind: FuturesTradeKind,
    pub ticker: Ticker,
    pub quantity: f64,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leverage: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuturesTradeKind {
    OpenLong,
    OpenShort,
    CloseLong,
    CloseShort,
    Liquidation,
}

impl FuturesTradeKind {
    pub fn open(side: Side) -> Self {
        match side {
            Side::Long => Self::OpenLong,
            Side::Short => Self::OpenShort,
        }
    }

    pub fn close(side: Side) -> Self {
        match side {
            Side::Long => Self::CloseLong,
            Side::Short => Self::CloseShort,
        }
    }
}
