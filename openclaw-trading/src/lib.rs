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
#![allow(clippy::too_many_arguments)]

//! # Openclaw-Trading
//! Simulated multi-asset trading engine maintaining a single cash pool
//! across four product lines: long-only spot stocks, long-only spot crypto,
//! leveraged crypto perpetual futures and long-only American-style stock
//! options.
//!
//! ## Overview
//! * Prices come from injected [`QuoteProvider`] capabilities; trades fill
//!   at the live quote against a persisted account.
//! * The [`portfolio::PortfolioLedger`] owns cash; the derivative engines
//!   mutate it only through the narrow [`portfolio::CashAccount`]
//!   capability.
//! * Every aggregate persists to its own JSON file with atomic
//!   temp-then-rename writes.
//! * Background sweeps force-liquidate underwater perpetuals and cash-settle
//!   expired options, emitting `futures.liquidation` and `options.expired`
//!   domain events through an injected [`event::Broadcaster`].
//!
//! Construct everything at the composition root via
//! [`system::TradingSystem`].

use openclaw_markets::QuoteProvider;
use std::sync::Arc;

/// Ticker, asset-class and side tags shared across the engines.
pub mod asset;

/// Configuration: the data directory and per-aggregate file paths.
pub mod config;

/// Defines all possible errors surfaced by engine operations.
pub mod error;

/// Domain events and the broadcaster capability.
pub mod event;

/// Leveraged crypto perpetuals: aggregate, engine and trade history.
pub mod futures;

/// Provides default Openclaw Tracing logging initialisers.
pub mod logging;

/// Pure isolated-margin arithmetic.
pub mod margin;

/// Background liquidation and expiry sweeps.
pub mod monitor;

/// Options: pricing, chain generation, aggregate and engine.
pub mod options;

/// The portfolio ledger: cash, spot holdings and trade history.
pub mod portfolio;

/// Unified snapshot aggregation across all product lines.
pub mod snapshot;

/// Spot execution engine routing tickers to the right quote source.
pub mod spot;

/// Durable JSON-file stores with atomic writes.
pub mod store;

/// Composition root wiring the ledger, engines and monitors together.
pub mod system;

/// Durable watchlist of tracked tickers.
pub mod watchlist;

/// The two quote sources the engines consume: crypto symbols are quoted as
/// `BASE+USDT` pairs, stocks as bare tickers.
#[derive(Clone)]
pub struct QuoteSources {
    pub crypto: Arc<dyn QuoteProvider>,
    pub stocks: Arc<dyn QuoteProvider>,
}

impl std::fmt::Debug for QuoteSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteSources").finish()
    }
}

impl QuoteSources {
    pub fn new(crypto: Arc<dyn QuoteProvider>, stocks: Arc<dyn QuoteProvider>) -> Self {
        Self { crypto, stocks }
    }

    /// Route both asset kinds through one provider. Used with deterministic
    /// providers in tests.
    pub fn shared(provider: Arc<dyn QuoteProvider>) -> Self {
        Self {
            crypto: Arc::clone(&provider),
            stocks: provider,
        }
    }
}

/// Openclaw core test utilities.
pub mod test_utils {
    use crate::{portfolio::PortfolioLedger, store::JsonStore};
    use std::path::PathBuf;
    use uuid::Uuid;

    /// Relative tolerance for monetary comparisons.
    pub const EPSILON: f64 = 1e-6;

    pub fn f64_is_eq(actual: f64, expected: f64, epsilon: f64) -> bool {
        if actual.is_nan() && expected.is_nan() {
            true
        } else if actual.is_infinite() && expected.is_infinite() {
            actual.is_sign_positive() == expected.is_sign_positive()
        } else if actual.is_nan()
            || expected.is_nan()
            || actual.is_infinite()
            || expected.is_infinite()
        {
            false
        } else {
            (actual - expected).abs() < epsilon
        }
    }

    /// A unique directory under the system temp dir for store isolation.
    pub fn temp_data_dir() -> PathBuf {
        std::env::temp_dir().join(format!("openclaw-test-{}", Uuid::new_v4()))
    }

    /// A ledger persisting into an isolated temp directory.
    pub async fn temp_ledger() -> PortfolioLedger {
        let path = temp_data_dir().join(crate::config::PORTFOLIO_FILE);
        PortfolioLedger::init(JsonStore::new(path))
            .await
            .expect("temp ledger init cannot fail")
    }
}
