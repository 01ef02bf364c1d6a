use super::OptionType;
use crate::asset::{AssetClass, Ticker};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The fixed terms of an option series.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionContract {
    pub underlying: Ticker,
    #[serde(rename = "type")]
    pub option_type: OptionType,
    pub strike_price: f64,
    /// `YYYY-MM-DD`.
    pub expiry_date: String,
    pub multiplier: u32,
    pub implied_vol: f64,
}

impl OptionContract {
    /// Display symbol, eg/ `NVDA-260619-C-750`.
    pub fn symbol(&self) -> String {
        let compact_expiry = NaiveDate::parse_from_str(&self.expiry_date, "%Y-%m-%d")
            .map(|date| date.format("%y%m%d").to_string())
            .unwrap_or_else(|_| self.expiry_date.clone());
        let side = match self.option_type {
            OptionType::Call => 'C',
            OptionType::Put => 'P',
        };
        format!(
            "{}-{}-{}-{}",
            self.underlying, compact_expiry, side, self.strike_price
        )
    }
}

/// An open long option position.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionPosition {
    pub id: String,
    pub contract: OptionContract,
    pub asset_class: AssetClass,
    /// Contracts held. Positive while the position is open.
    pub contracts: f64,
    /// Total premium debited at entry (reduced proportionally on partial
    /// sells).
    pub premium_paid: f64,
    /// Per-share premium paid at entry.
    pub premium_per_share: f64,
    /// Live per-share premium from the last repricing pass.
    pub current_premium: f64,
    pub current_value: f64,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_percent: f64,
    pub days_to_expiry: f64,
    pub opened_at: DateTime<Utc>,
    /// Duplicate of the contract expiry, kept at the top level for
    /// consumers that only read position rows.
    pub expiry_date: String,
}

/// Persisted options aggregate.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsData {
    #[serde(default)]
    pub positions: Vec<OptionPosition>,
    #[serde(default)]
    pub transactions: Vec<OptionTransaction>,
}

/// A single executed options trade or settlement.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionTransaction {
    #[serde(rename = "type")]
    pub kind: OptionTradeKind,
    pub underlying: Ticker,
    pub strike_price: f64,
    pub expiry_date: String,
    pub contracts: f64,
    pub premium_per_share: f64,
    /// Cash moved by this entry: debit for buys, credit for sells and ITM
    /// settlements.
    pub total_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionTradeKind {
    BuyCall,
    BuyPut,
    SellCall,
    SellPut,
    ExpireItm,
    ExpireOtm,
}

impl OptionTradeKind {
    pub fn buy(option_type: OptionType) -> Self {
        match option_type {
            OptionType::Call => Self::BuyCall,
            OptionType::Put => Self::BuyPut,
        }
    }

    pub fn sell(option_type: OptionType) -> Self {
        match option_type {
            OptionType::Call => Self::SellCall,
            OptionType::Put => Self::SellPut,
        }
    }
}
