//! Background sweeps: forced liquidation of perpetuals and cash settlement
//! of expired options.
//!
//! Both run as cooperative tickers that skip missed ticks rather than
//! queueing them, swallow per-tick errors, and exit on a stop signal.

use crate::{
    asset::Side,
    event::Broadcaster,
    futures::FuturesEngine,
    options::OptionsEngine,
};
use itertools::Itertools;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{error, info, warn};

use openclaw_markets::QuoteProvider;

/// How often open futures positions are swept for liquidation.
pub const LIQUIDATION_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// How often option positions are swept for expiry settlement.
pub const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Periodic sweep that force-closes futures positions whose mark has crossed
/// their liquidation price.
pub struct LiquidationMonitor {
    engine: Arc<FuturesEngine>,
    quotes: Arc<dyn QuoteProvider>,
    broadcaster: Option<Arc<dyn Broadcaster>>,
    interval: Duration,
}

impl std::fmt::Debug for LiquidationMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiquidationMonitor")
            .field("interval", &self.interval)
            .finish()
    }
}

impl LiquidationMonitor {
    pub fn new(
        engine: Arc<FuturesEngine>,
        quotes: Arc<dyn QuoteProvider>,
        broadcaster: Option<Arc<dyn Broadcaster>>,
    ) -> Self {
        Self {
            engine,
            quotes,
            broadcaster,
            interval: LIQUIDATION_SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run the sweep loop until the stop signal fires. A crashed tick is
    /// logged and the schedule continues.
    pub fn spawn(self, mut stop: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = self.sweep().await {
                            error!(error = %err, "liquidation sweep crashed; continuing schedule");
                        }
                    }
                    _ = stop.changed() => {
                        if *stop.borrow() {
                            info!("liquidation monitor stopped");
                            break;
                        }
                    }
                }
            }
        })
    }

    /// One pass over all open positions. Tickers whose quote fails are left
    /// untouched so stale data never triggers a liquidation.
    pub async fn sweep(&self) -> Result<usize, crate::error::TradingError> {
        let positions = self.engine.positions_snapshot().await;
        if positions.is_empty() {
            return Ok(0);
        }

        let tickers = positions
            .iter()
            .map(|position| position.ticker.clone())
            .unique()
            .collect::<Vec<_>>();

        let mut marks = std::collections::HashMap::new();
        for ticker in tickers {
            match self.quotes.fetch_quote(&ticker.usdt_pair()).await {
                Ok(quote) => {
                    marks.insert(ticker, quote.price);
                }
                Err(err) => {
                    warn!(%ticker, error = %err, "mark unavailable; positions left untouched");
                }
            }
        }

        let mut liquidated = 0;
        for position in positions {
            let Some(mark) = marks.get(&position.ticker).copied() else {
                continue;
            };

            let triggered = match position.side {
                Side::Long => mark <= position.liquidation_price,
                Side::Short => mark >= position.liquidation_price,
            };
            if !triggered {
                continue;
            }

            match self.engine.liquidate_position(&position.id, mark).await {
                Ok(Some(event)) => {
                    liquidated += 1;
                    if let Some(broadcaster) = &self.broadcaster {
                        broadcaster.emit(event.into());
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(id = %position.id, error = %err, "liquidation failed; retried next sweep");
                }
            }
        }

        Ok(liquidated)
    }
}

/// Periodic sweep that cash-settles expired option positions.
pub struct ExpirySettler {
    engine: Arc<OptionsEngine>,
    broadcaster: Option<Arc<dyn Broadcaster>>,
    interval: Duration,
}

impl std::fmt::Debug for ExpirySettler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpirySettler")
            .field("interval", &self.interval)
            .finish()
    }
}

impl ExpirySettler {
    pub fn new(engine: Arc<OptionsEngine>, broadcaster: Option<Arc<dyn Broadcaster>>) -> Self {
        Self {
            engine,
            broadcaster,
            interval: EXPIRY_SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run the settlement loop until the stop signal fires.
    pub fn spawn(self, mut stop: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.engine.settle_expired(self.broadcaster.as_deref()).await {
                            Ok(settled) if !settled.is_empty() => {
                                info!(count = settled.len(), "expired options settled");
                            }
                            Ok(_) => {}
                            Err(err) => {
                                error!(error = %err, "expiry sweep crashed; continuing schedule");
                            }
                        }
                    }
                    _ = stop.changed() => {
                        if *stop.borrow() {
                            info!("expiry settler stopped");
                            break;
                        }
                    }
                }
            }
        })
    }
}
