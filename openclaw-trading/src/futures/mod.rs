/// Persisted futures aggregate: positions, leverage settings and trade
/// history.
pub mod position;

/// Leveraged crypto perpetuals engine: open, close, partial close, leverage
/// configuration, live marks and forced liquidation.
pub mod engine;

pub use engine::{CloseOutcome, FuturesAccount, FuturesEngine};
pub use position::{
    FuturesData, FuturesPosition, FuturesTradeKind, FuturesTransaction, MarginMode,
};
