use crate::{
    asset::{Side, Ticker},
    options::OptionType,
};
use chrono::{DateTime, Utc};
use derive_more::From;
use serde::Serialize;

/// Capability for publishing domain events to external consumers (RPC
/// gateway, UI push, etc.). The engine cores only ever emit
/// `futures.liquidation` and `options.expired`.
pub trait Broadcaster: Send + Sync {
    fn emit(&self, event: DomainEvent);
}

/// Domain events emitted by the engine cores.
#[derive(Debug, Clone, PartialEq, Serialize, From)]
#[serde(untagged)]
pub enum DomainEvent {
    FuturesLiquidation(LiquidationEvent),
    OptionsExpired(OptionExpiryEvent),
}

impl DomainEvent {
    /// Wire event name consumed by the RPC boundary.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FuturesLiquidation(_) => "futures.liquidation",
            Self::OptionsExpired(_) => "options.expired",
        }
    }
}

/// Payload of a `futures.liquidation` event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationEvent {
    pub ticker: Ticker,
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub mark_price: f64,
    pub pnl: f64,
    pub liquidated_at: DateTime<Utc>,
}

/// Payload of an `options.expired` event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionExpiryEvent {
    pub underlying: Ticker,
    #[serde(rename = "type")]
    pub option_type: OptionType,
    pub strike_price: f64,
    pub expiry_date: String,
    pub contracts: f64,
    pub settlement: f64,
    pub pnl: f64,
    pub itm: bool,
    pub settled_at: DateTime<Utc>,
}

/// Test broadcaster that records every emitted event.
pub mod test_utils {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    pub struct RecordingBroadcaster {
        events: Mutex<Vec<DomainEvent>>,
    }

    impl RecordingBroadcaster {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<DomainEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Broadcaster for RecordingBroadcaster {
        fn emit(&self, event: DomainEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}
