use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Pure premium, implied-volatility and expiry-time arithmetic.
pub mod pricing;

/// Expiry-date and strike-grid generation.
pub mod chain;

/// Persisted options aggregate: positions and trade history.
pub mod position;

/// Long-only American-style options engine: buy, sell, live repricing and
/// cash settlement at expiry.
pub mod engine;

pub use engine::{OptionQuote, OptionsEngine, SellOutcome};
pub use position::{OptionContract, OptionPosition, OptionTradeKind, OptionTransaction, OptionsData};

/// Call or put.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    #[display("call")]
    Call,
    #[display("put")]
    Put,
}

/// Shares controlled by one contract.
pub const CONTRACT_MULTIPLIER: u32 = 100;
