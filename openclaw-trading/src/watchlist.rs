use crate::{
    asset::{AssetKind, Ticker},
    store::{JsonStore, StoreError},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Persisted watchlist aggregate.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistData {
    #[serde(default)]
    pub tickers: Vec<WatchlistEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A ticker being tracked.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistEntry {
    pub ticker: Ticker,
    pub kind: AssetKind,
    pub added_at: DateTime<Utc>,
}

/// Durable watchlist of tickers the account is tracking.
#[derive(Debug)]
pub struct Watchlist {
    state: Mutex<WatchlistData>,
    store: JsonStore<WatchlistData>,
}

impl Watchlist {
    /// Load the persisted watchlist, initialising defaults on first run.
    pub async fn init(store: JsonStore<WatchlistData>) -> Result<Self, StoreError> {
        let state = store.load_or_init(WatchlistData::default()).await?;
        Ok(Self {
            state: Mutex::new(state),
            store,
        })
    }

    /// Add a ticker; re-adding an existing entry updates its kind.
    pub async fn add(&self, ticker: Ticker, kind: Option<AssetKind>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;

        let kind = kind.unwrap_or_default();
        match state
            .tickers
            .iter()
            .position(|entry| entry.ticker == ticker)
        {
            Some(index) => state.tickers[index].kind = kind,
            None => state.tickers.push(WatchlistEntry {
                ticker,
                kind,
                added_at: Utc::now(),
            }),
        }
        state.updated_at = Some(Utc::now());

        self.store.save(&state).await
    }

    /// Remove a ticker. Returns whether it was present.
    pub async fn remove(&self, ticker: &Ticker) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;

        let before = state.tickers.len();
        state.tickers.retain(|entry| &entry.ticker != ticker);
        let removed = state.tickers.len() != before;

        if removed {
            state.updated_at = Some(Utc::now());
            self.store.save(&state).await?;
        }

        Ok(removed)
    }

    pub async fn list(&self) -> Vec<WatchlistEntry> {
        self.state.lock().await.tickers.clone()
    }

    /// Replace the aggregate with defaults.
    pub async fn reset(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        *state = WatchlistData::default();
        self.store.save(&state).await
    }
}
