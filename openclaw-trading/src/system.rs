use crate::{
    config::Config,
    event::Broadcaster,
    futures::FuturesEngine,
    monitor::{ExpirySettler, LiquidationMonitor},
    options::OptionsEngine,
    portfolio::{CashAccount, PortfolioLedger},
    snapshot::{self, PortfolioSnapshot},
    spot::SpotEngine,
    store::{JsonStore, StoreError},
    watchlist::Watchlist,
    QuoteSources,
};
use std::sync::Arc;
use tokio::{sync::watch, task::JoinHandle};
use tracing::info;

/// Composition root: constructs the ledger, the three engines and the
/// watchlist from one [`Config`] plus injected quote sources and an optional
/// broadcaster.
///
/// Construction is explicit; there is no process-wide singleton. Tests pass
/// a relocated `Config` and deterministic quote sources.
pub struct TradingSystem {
    config: Config,
    pub ledger: Arc<PortfolioLedger>,
    pub spot: SpotEngine,
    pub futures: Arc<FuturesEngine>,
    pub options: Arc<OptionsEngine>,
    pub watchlist: Arc<Watchlist>,
    quotes: QuoteSources,
    broadcaster: Option<Arc<dyn Broadcaster>>,
}

impl std::fmt::Debug for TradingSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradingSystem")
            .field("config", &self.config)
            .finish()
    }
}

/// Handles for the running background sweeps plus their shared stop signal.
#[derive(Debug)]
pub struct Monitors {
    stop: watch::Sender<bool>,
    pub liquidation: JoinHandle<()>,
    pub expiry: JoinHandle<()>,
}

impl Monitors {
    /// Signal both sweeps to exit after their current tick.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }
}

impl TradingSystem {
    pub async fn init(
        config: Config,
        quotes: QuoteSources,
        broadcaster: Option<Arc<dyn Broadcaster>>,
    ) -> Result<Self, StoreError> {
        let ledger = Arc::new(
            PortfolioLedger::init(JsonStore::new(config.portfolio_file())).await?,
        );
        let cash = CashAccount::new(Arc::clone(&ledger));

        let futures = Arc::new(
            FuturesEngine::init(
                JsonStore::new(config.futures_file()),
                Arc::clone(&quotes.crypto),
                cash.clone(),
            )
            .await?,
        );
        let options = Arc::new(
            OptionsEngine::init(
                JsonStore::new(config.options_file()),
                Arc::clone(&quotes.stocks),
                cash,
            )
            .await?,
        );
        let watchlist = Arc::new(Watchlist::init(JsonStore::new(config.watchlist_file())).await?);
        let spot = SpotEngine::new(Arc::clone(&ledger), quotes.clone());

        info!(data_dir = %config.data_dir.display(), "trading system initialised");

        Ok(Self {
            config,
            ledger,
            spot,
            futures,
            options,
            watchlist,
            quotes,
            broadcaster,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start the liquidation monitor and the expiry settler on their default
    /// schedules.
    pub fn spawn_monitors(&self) -> Monitors {
        let (stop, stop_rx) = watch::channel(false);

        let liquidation = LiquidationMonitor::new(
            Arc::clone(&self.futures),
            Arc::clone(&self.quotes.crypto),
            self.broadcaster.clone(),
        )
        .spawn(stop_rx.clone());

        let expiry = ExpirySettler::new(Arc::clone(&self.options), self.broadcaster.clone())
            .spawn(stop_rx);

        Monitors {
            stop,
            liquidation,
            expiry,
        }
    }

    /// Unified snapshot across the ledger and both derivative engines.
    pub async fn snapshot(&self) -> PortfolioSnapshot {
        snapshot::enriched_snapshot(
            &self.ledger,
            &self.quotes,
            Some(&self.futures),
            Some(&self.options),
        )
        .await
    }

    /// Coordinated reset: replaces the spot ledger and every derivative
    /// aggregate with defaults. `PortfolioLedger::reset` alone deliberately
    /// leaves the derivative aggregates untouched.
    pub async fn reset_all(&self, cash: Option<f64>) -> Result<(), StoreError> {
        self.ledger.reset(cash).await?;
        self.futures.reset().await?;
        self.options.reset().await?;
        self.watchlist.reset().await?;
        Ok(())
    }
}
