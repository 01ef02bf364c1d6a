use crate::{
    asset::{AssetClass, AssetKind, Ticker},
    error::TradingError,
    store::{JsonStore, StoreError},
};
use chrono::{DateTime, Utc};
use indexmap::{map::Entry, IndexMap};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use tracing::info;

/// Cash a freshly initialised (or reset) portfolio starts with.
pub const DEFAULT_STARTING_CASH: f64 = 100_000.0;

/// Number of daily snapshots retained; older entries are dropped.
pub const DAILY_SNAPSHOT_CAP: usize = 90;

/// Persisted portfolio aggregate: the single cash pool plus all spot state.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    /// Available cash. Never negative; debits clamp at zero.
    pub cash: f64,
    /// Open spot holdings keyed by normalized ticker.
    #[serde(default)]
    pub holdings: IndexMap<Ticker, Holding>,
    /// Append-only spot trade history.
    #[serde(default)]
    pub transaction_history: Vec<SpotTransaction>,
    /// Free-form per-ticker research notes.
    #[serde(default)]
    pub holding_meta: IndexMap<Ticker, HoldingMeta>,
    /// Legacy routing hint recorded at buy time; absent tickers default to
    /// crypto.
    #[serde(default)]
    pub ticker_types: IndexMap<Ticker, AssetKind>,
    /// Rolling end-of-day equity marks, capped at [`DAILY_SNAPSHOT_CAP`].
    #[serde(default)]
    pub daily_snapshots: Vec<DailySnapshot>,
}

impl Default for Portfolio {
    fn default() -> Self {
        Self {
            cash: DEFAULT_STARTING_CASH,
            holdings: IndexMap::new(),
            transaction_history: Vec::new(),
            holding_meta: IndexMap::new(),
            ticker_types: IndexMap::new(),
            daily_snapshots: Vec::new(),
        }
    }
}

/// An open spot holding.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub quantity: f64,
    pub average_price: f64,
    pub asset_class: AssetClass,
}

/// A single executed spot trade.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotTransaction {
    #[serde(rename = "type")]
    pub kind: SpotTradeKind,
    pub ticker: Ticker,
    pub quantity: f64,
    pub price: f64,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpotTradeKind {
    Buy,
    Sell,
}

/// Research notes attached to a holding.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thesis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// End-of-day total equity mark.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySnapshot {
    /// `YYYY-MM-DD`, unique within the history.
    pub date: String,
    pub total_value: f64,
}

/// Breakdown returned by [`PortfolioLedger::portfolio_value`].
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioValue {
    pub total_value: f64,
    pub spot_equity: f64,
    pub cash: f64,
}

/// Owns the cash pool and all spot state; the sole writer of
/// `portfolio.json`.
///
/// Every mutation completes its persistence before returning, and the state
/// lock is held across the save, so operations observe serialized ordering.
/// The futures and options engines never touch this ledger directly: they
/// receive a [`CashAccount`] capability limited to cash reads and
/// adjustments.
#[derive(Debug)]
pub struct PortfolioLedger {
    state: Mutex<Portfolio>,
    store: JsonStore<Portfolio>,
}

impl PortfolioLedger {
    /// Load the persisted portfolio, initialising defaults on first run.
    pub async fn init(store: JsonStore<Portfolio>) -> Result<Self, StoreError> {
        let state = store.load_or_init(Portfolio::default()).await?;
        Ok(Self {
            state: Mutex::new(state),
            store,
        })
    }

    /// Buy `quantity` units of `ticker` at `price`, merging into any existing
    /// holding at the weighted average entry price.
    pub async fn buy_spot(
        &self,
        ticker: Ticker,
        quantity: f64,
        price: f64,
        reasoning: Option<String>,
        kind: Option<AssetKind>,
    ) -> Result<SpotTransaction, TradingError> {
        if quantity <= 0.0 {
            return Err(TradingError::invalid_param(format!(
                "buy quantity must be positive, got {quantity}"
            )));
        }
        if price <= 0.0 {
            return Err(TradingError::invalid_param(format!(
                "buy price must be positive, got {price}"
            )));
        }

        let mut state = self.state.lock().await;

        let cost = quantity * price;
        if state.cash < cost {
            return Err(TradingError::InsufficientFunds {
                required: cost,
                available: state.cash,
            });
        }
        state.cash -= cost;

        match state.holdings.entry(ticker.clone()) {
            Entry::Occupied(mut occupied) => {
                let holding = occupied.get_mut();
                let new_quantity = holding.quantity + quantity;
                holding.average_price =
                    (holding.quantity * holding.average_price + quantity * price) / new_quantity;
                holding.quantity = new_quantity;
                if let Some(kind) = kind {
                    holding.asset_class = kind.spot_asset_class();
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Holding {
                    quantity,
                    average_price: price,
                    asset_class: kind.unwrap_or_default().spot_asset_class(),
                });
            }
        }

        if let Some(kind) = kind {
            state.ticker_types.insert(ticker.clone(), kind);
        }

        let transaction = SpotTransaction {
            kind: SpotTradeKind::Buy,
            ticker: ticker.clone(),
            quantity,
            price,
            date: Utc::now(),
            reasoning,
        };
        state.transaction_history.push(transaction.clone());

        self.store.save(&state).await?;
        info!(%ticker, quantity, price, cost, "spot buy executed");

        Ok(transaction)
    }

    /// Sell `quantity` units of `ticker` at `price`. Partial sells keep the
    /// original average entry price; a holding sold to zero is removed.
    pub async fn sell_spot(
        &self,
        ticker: Ticker,
        quantity: f64,
        price: f64,
        reasoning: Option<String>,
    ) -> Result<SpotTransaction, TradingError> {
        if quantity <= 0.0 {
            return Err(TradingError::invalid_param(format!(
                "sell quantity must be positive, got {quantity}"
            )));
        }
        if price <= 0.0 {
            return Err(TradingError::invalid_param(format!(
                "sell price must be positive, got {price}"
            )));
        }

        let mut state = self.state.lock().await;

        let held = state
            .holdings
            .get(&ticker)
            .map(|holding| holding.quantity)
            .unwrap_or(0.0);
        if held < quantity {
            return Err(TradingError::InsufficientHoldings {
                requested: quantity,
                held,
            });
        }

        state.cash += quantity * price;

        let remaining = held - quantity;
        if remaining <= 0.0 {
            state.holdings.shift_remove(&ticker);
        } else if let Some(holding) = state.holdings.get_mut(&ticker) {
            holding.quantity = remaining;
        }

        let transaction = SpotTransaction {
            kind: SpotTradeKind::Sell,
            ticker: ticker.clone(),
            quantity,
            price,
            date: Utc::now(),
            reasoning,
        };
        state.transaction_history.push(transaction.clone());

        self.store.save(&state).await?;
        info!(%ticker, quantity, price, "spot sell executed");

        Ok(transaction)
    }

    /// Apply a signed cash delta, clamping the result at zero. This is the
    /// sole channel by which the derivative engines mutate cash.
    pub async fn adjust_cash(&self, delta: f64) -> Result<f64, StoreError> {
        let mut state = self.state.lock().await;
        state.cash = (state.cash + delta).max(0.0);
        self.store.save(&state).await?;
        Ok(state.cash)
    }

    /// Debit `amount` if and only if the full amount is covered, atomically
    /// with respect to other ledger operations.
    pub async fn try_debit(&self, amount: f64) -> Result<f64, TradingError> {
        let mut state = self.state.lock().await;
        if state.cash < amount {
            return Err(TradingError::InsufficientFunds {
                required: amount,
                available: state.cash,
            });
        }
        state.cash -= amount;
        self.store.save(&state).await?;
        Ok(state.cash)
    }

    pub async fn cash(&self) -> f64 {
        self.state.lock().await.cash
    }

    /// Partial-update the research notes for a ticker; `None` fields keep
    /// their previous value.
    pub async fn set_holding_meta(
        &self,
        ticker: Ticker,
        thesis: Option<String>,
        context: Option<String>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;

        let meta = state.holding_meta.entry(ticker).or_default();
        if thesis.is_some() {
            meta.thesis = thesis;
        }
        if context.is_some() {
            meta.context = context;
        }

        self.store.save(&state).await
    }

    /// Replace the ledger with defaults. Clears holdings and history but not
    /// the derivative aggregates; see `TradingSystem::reset_all` for the
    /// coordinated variant.
    pub async fn reset(&self, cash: Option<f64>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        *state = Portfolio {
            cash: cash.unwrap_or(DEFAULT_STARTING_CASH),
            ..Portfolio::default()
        };
        self.store.save(&state).await?;
        info!(cash = state.cash, "portfolio reset");
        Ok(())
    }

    /// Create-or-update today's equity mark, dropping the oldest entries past
    /// the cap.
    pub async fn record_daily_snapshot(&self, total_value: f64) -> Result<(), StoreError> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let mut state = self.state.lock().await;

        match state
            .daily_snapshots
            .iter()
            .position(|snapshot| snapshot.date == today)
        {
            Some(index) => state.daily_snapshots[index].total_value = total_value,
            None => state.daily_snapshots.push(DailySnapshot {
                date: today,
                total_value,
            }),
        }

        let len = state.daily_snapshots.len();
        if len > DAILY_SNAPSHOT_CAP {
            state.daily_snapshots.drain(..len - DAILY_SNAPSHOT_CAP);
        }

        self.store.save(&state).await
    }

    /// Value the portfolio against the provided prices, falling back to each
    /// holding's average entry price for missing tickers.
    pub async fn portfolio_value(&self, prices: &HashMap<Ticker, f64>) -> PortfolioValue {
        let state = self.state.lock().await;

        let spot_equity = state
            .holdings
            .iter()
            .map(|(ticker, holding)| {
                let price = prices
                    .get(ticker)
                    .copied()
                    .filter(|price| *price > 0.0)
                    .unwrap_or(holding.average_price);
                holding.quantity * price
            })
            .sum::<f64>();

        PortfolioValue {
            total_value: state.cash + spot_equity,
            spot_equity,
            cash: state.cash,
        }
    }

    /// Most recent spot transactions, newest first.
    pub async fn transactions(&self, limit: usize) -> Vec<SpotTransaction> {
        let state = self.state.lock().await;
        state
            .transaction_history
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Routing hint recorded for a ticker, if any.
    pub async fn asset_kind_hint(&self, ticker: &Ticker) -> Option<AssetKind> {
        self.state.lock().await.ticker_types.get(ticker).copied()
    }

    /// Deep copy of the current state, for read-side aggregation.
    pub async fn snapshot_state(&self) -> Portfolio {
        self.state.lock().await.clone()
    }
}

/// Narrow capability handed to the futures and options engines: cash reads
/// and cash adjustments, nothing else. Removes any back-reference from the
/// ledger into the engines.
#[derive(Debug, Clone)]
pub struct CashAccount {
    ledger: Arc<PortfolioLedger>,
}

impl CashAccount {
    pub fn new(ledger: Arc<PortfolioLedger>) -> Self {
        Self { ledger }
    }

    pub async fn balance(&self) -> f64 {
        self.ledger.cash().await
    }

    pub async fn adjust(&self, delta: f64) -> Result<f64, StoreError> {
        self.ledger.adjust_cash(delta).await
    }

    pub async fn try_debit(&self, amount: f64) -> Result<f64, TradingError> {
        self.ledger.try_debit(amount).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{f64_is_eq, temp_ledger, EPSILON};

    #[tokio::test]
    async fn buy_merges_at_weighted_average_price() {
        let ledger = temp_ledger().await;

        ledger
            .buy_spot(Ticker::new("AAPL"), 10.0, 150.0, None, Some(AssetKind::Stock))
            .await
            .unwrap();
        ledger
            .buy_spot(Ticker::new("AAPL"), 10.0, 160.0, None, None)
            .await
            .unwrap();

        let state = ledger.snapshot_state().await;
        let holding = state.holdings.get("AAPL").unwrap();

        assert_eq!(holding.quantity, 20.0);
        assert!(f64_is_eq(holding.average_price, 155.0, EPSILON));
        assert_eq!(holding.asset_class, AssetClass::UsStockSpot);
        assert!(f64_is_eq(state.cash, 100_000.0 - 3_100.0, EPSILON));
    }

    #[tokio::test]
    async fn buy_rejects_non_positive_quantity_and_price() {
        let ledger = temp_ledger().await;

        let zero_qty = ledger
            .buy_spot(Ticker::new("BTC"), 0.0, 100.0, None, None)
            .await;
        let negative_price = ledger
            .buy_spot(Ticker::new("BTC"), 1.0, -5.0, None, None)
            .await;

        assert!(matches!(zero_qty, Err(TradingError::InvalidParam(_))));
        assert!(matches!(
            negative_price,
            Err(TradingError::InvalidParam(_))
        ));
    }

    #[tokio::test]
    async fn buy_beyond_cash_is_rejected_without_mutation() {
        let ledger = temp_ledger().await;

        let result = ledger
            .buy_spot(Ticker::new("BTC"), 10.0, 60_000.0, None, None)
            .await;

        assert!(matches!(
            result,
            Err(TradingError::InsufficientFunds { .. })
        ));
        let state = ledger.snapshot_state().await;
        assert_eq!(state.cash, 100_000.0);
        assert!(state.holdings.is_empty());
        assert!(state.transaction_history.is_empty());
    }

    #[tokio::test]
    async fn partial_sell_keeps_average_price_and_full_sell_removes_holding() {
        let ledger = temp_ledger().await;
        ledger
            .buy_spot(Ticker::new("ETH"), 2.0, 3_500.0, None, None)
            .await
            .unwrap();

        ledger
            .sell_spot(Ticker::new("ETH"), 1.0, 4_000.0, None)
            .await
            .unwrap();
        {
            let state = ledger.snapshot_state().await;
            let holding = state.holdings.get("ETH").unwrap();
            assert_eq!(holding.quantity, 1.0);
            assert_eq!(holding.average_price, 3_500.0);
        }

        ledger
            .sell_spot(Ticker::new("ETH"), 1.0, 4_000.0, None)
            .await
            .unwrap();
        let state = ledger.snapshot_state().await;
        assert!(state.holdings.get("ETH").is_none());
        assert!(f64_is_eq(state.cash, 100_000.0 + 1_000.0, EPSILON));
    }

    #[tokio::test]
    async fn sell_more_than_held_is_rejected() {
        let ledger = temp_ledger().await;
        ledger
            .buy_spot(Ticker::new("ETH"), 1.0, 3_500.0, None, None)
            .await
            .unwrap();

        let result = ledger
            .sell_spot(Ticker::new("ETH"), 2.0, 3_500.0, None)
            .await;

        assert_eq!(
            result,
            Err(TradingError::InsufficientHoldings {
                requested: 2.0,
                held: 1.0
            })
        );
    }

    #[tokio::test]
    async fn adjust_cash_clamps_at_exactly_zero() {
        let ledger = temp_ledger().await;

        let cash = ledger.adjust_cash(-250_000.0).await.unwrap();

        assert_eq!(cash, 0.0);
        assert_eq!(ledger.cash().await, 0.0);
    }

    #[tokio::test]
    async fn try_debit_checks_and_debits_atomically() {
        let ledger = temp_ledger().await;

        assert!(ledger.try_debit(250_000.0).await.is_err());
        assert_eq!(ledger.cash().await, 100_000.0);

        let remaining = ledger.try_debit(40_000.0).await.unwrap();
        assert_eq!(remaining, 60_000.0);
    }

    #[tokio::test]
    async fn daily_snapshot_updates_today_and_caps_history() {
        let ledger = temp_ledger().await;

        // Seed 90 historical days directly through the snapshot API plus two
        // same-day records (the second must update, not append).
        {
            let mut state = ledger.state.lock().await;
            state.daily_snapshots = (0..DAILY_SNAPSHOT_CAP)
                .map(|day| DailySnapshot {
                    date: format!("2000-01-{:02}", (day % 28) + 1),
                    total_value: day as f64,
                })
                .collect();
        }
        ledger.record_daily_snapshot(123_000.0).await.unwrap();
        ledger.record_daily_snapshot(124_000.0).await.unwrap();

        let state = ledger.snapshot_state().await;
        assert_eq!(state.daily_snapshots.len(), DAILY_SNAPSHOT_CAP);
        let today = state.daily_snapshots.last().unwrap();
        assert_eq!(today.total_value, 124_000.0);
    }

    #[tokio::test]
    async fn holding_meta_partial_update_preserves_other_field() {
        let ledger = temp_ledger().await;
        let ticker = Ticker::new("NVDA");

        ledger
            .set_holding_meta(ticker.clone(), Some("ai capex".into()), None)
            .await
            .unwrap();
        ledger
            .set_holding_meta(ticker.clone(), None, Some("earnings next week".into()))
            .await
            .unwrap();

        let state = ledger.snapshot_state().await;
        let meta = state.holding_meta.get("NVDA").unwrap();
        assert_eq!(meta.thesis.as_deref(), Some("ai capex"));
        assert_eq!(meta.context.as_deref(), Some("earnings next week"));
    }

    #[tokio::test]
    async fn reset_restores_defaults_with_requested_cash() {
        let ledger = temp_ledger().await;
        ledger
            .buy_spot(Ticker::new("BTC"), 1.0, 60_000.0, None, None)
            .await
            .unwrap();

        ledger.reset(Some(50_000.0)).await.unwrap();

        let state = ledger.snapshot_state().await;
        assert_eq!(state.cash, 50_000.0);
        assert!(state.holdings.is_empty());
        assert!(state.transaction_history.is_empty());
    }

    #[tokio::test]
    async fn portfolio_value_falls_back_to_average_price() {
        let ledger = temp_ledger().await;
        ledger
            .buy_spot(Ticker::new("BTC"), 1.0, 60_000.0, None, None)
            .await
            .unwrap();
        ledger
            .buy_spot(Ticker::new("ETH"), 2.0, 3_000.0, None, None)
            .await
            .unwrap();

        let mut prices = HashMap::new();
        prices.insert(Ticker::new("BTC"), 65_000.0);

        let value = ledger.portfolio_value(&prices).await;

        assert!(f64_is_eq(value.spot_equity, 65_000.0 + 6_000.0, EPSILON));
        assert!(f64_is_eq(
            value.total_value,
            value.cash + value.spot_equity,
            EPSILON
        ));
    }
}
