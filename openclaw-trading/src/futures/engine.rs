use super::position::{
    FuturesData, FuturesPosition, FuturesTradeKind, FuturesTransaction, MarginMode,
};
use crate::{
    asset::{AssetClass, Side, Ticker},
    error::TradingError,
    event::LiquidationEvent,
    margin,
    portfolio::CashAccount,
    store::{JsonStore, StoreError},
};
use chrono::Utc;
use itertools::Itertools;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use openclaw_markets::QuoteProvider;

/// Result of closing (part of) a futures position.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseOutcome {
    pub quantity_closed: f64,
    pub exit_price: f64,
    pub pnl: f64,
    pub margin_released: f64,
    /// Quantity still open after the close; 0 means the position is gone.
    pub remaining: f64,
}

/// Account-level futures summary.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FuturesAccount {
    pub available_balance: f64,
    pub total_margin_used: f64,
    pub total_unrealized_pnl: f64,
}

/// Leveraged crypto perpetuals engine with isolated margin.
///
/// Positions move `Open -> Closed` or `Open -> Liquidated`; a partial close
/// keeps the position open with quantity and margin scaled down. All cash
/// movement goes through the injected [`CashAccount`]; every successful
/// mutation persists before returning.
#[derive(Debug)]
pub struct FuturesEngine {
    state: Mutex<FuturesData>,
    store: JsonStore<FuturesData>,
    quotes: Arc<dyn QuoteProvider>,
    cash: CashAccount,
}

impl FuturesEngine {
    /// Load the persisted aggregate, initialising defaults on first run.
    pub async fn init(
        store: JsonStore<FuturesData>,
        quotes: Arc<dyn QuoteProvider>,
        cash: CashAccount,
    ) -> Result<Self, StoreError> {
        let state = store.load_or_init(FuturesData::default()).await?;
        Ok(Self {
            state: Mutex::new(state),
            store,
            quotes,
            cash,
        })
    }

    pub async fn open_long(
        &self,
        ticker: Ticker,
        quantity: f64,
        leverage: Option<u32>,
    ) -> Result<FuturesPosition, TradingError> {
        self.open(Side::Long, ticker, quantity, leverage).await
    }

    pub async fn open_short(
        &self,
        ticker: Ticker,
        quantity: f64,
        leverage: Option<u32>,
    ) -> Result<FuturesPosition, TradingError> {
        self.open(Side::Short, ticker, quantity, leverage).await
    }

    async fn open(
        &self,
        side: Side,
        ticker: Ticker,
        quantity: f64,
        leverage: Option<u32>,
    ) -> Result<FuturesPosition, TradingError> {
        if quantity <= 0.0 {
            return Err(TradingError::invalid_param(format!(
                "quantity must be positive, got {quantity}"
            )));
        }

        let mut state = self.state.lock().await;

        let leverage = leverage
            .or_else(|| state.leverage_settings.get(&ticker).copied())
            .unwrap_or(margin::DEFAULT_LEVERAGE);
        if !(margin::LEVERAGE_MIN..=margin::LEVERAGE_MAX).contains(&leverage) {
            return Err(TradingError::invalid_param(format!(
                "leverage {leverage} outside [{}, {}]",
                margin::LEVERAGE_MIN,
                margin::LEVERAGE_MAX
            )));
        }

        let entry_price = self
            .quotes
            .fetch_quote(&ticker.usdt_pair())
            .await?
            .price;
        if entry_price <= 0.0 {
            return Err(TradingError::invalid_param(format!(
                "quote for {ticker} returned non-positive price {entry_price}"
            )));
        }

        let initial_margin = margin::initial_margin(quantity, entry_price, leverage);
        self.cash.try_debit(initial_margin).await?;

        let notional = quantity * entry_price;
        let mm_rate = margin::maintenance_margin_rate(notional);
        let now = Utc::now();

        let position = FuturesPosition {
            id: Uuid::new_v4().to_string(),
            ticker: ticker.clone(),
            asset_class: AssetClass::CryptoPerp,
            side,
            quantity,
            entry_price,
            mark_price: entry_price,
            leverage,
            margin_mode: MarginMode::Isolated,
            initial_margin,
            maintenance_margin: margin::maintenance_margin(quantity, entry_price, mm_rate),
            margin_balance: initial_margin,
            liquidation_price: margin::liquidation_price(side, entry_price, leverage, mm_rate),
            maintenance_margin_rate: mm_rate,
            unrealized_pnl: 0.0,
            roe: 0.0,
            realized_pnl: 0.0,
            opened_at: now,
            updated_at: now,
        };

        state.positions.push(position.clone());
        state.transactions.push(FuturesTransaction {
            kind: FuturesTradeKind::open(side),
            ticker: ticker.clone(),
            quantity,
            price: entry_price,
            leverage: Some(leverage),
            pnl: None,
            date: now,
        });

        self.store.save(&state).await?;
        info!(
            %ticker,
            %side,
            quantity,
            entry_price,
            leverage,
            initial_margin,
            "futures position opened"
        );

        Ok(position)
    }

    /// Close `quantity` units at the live mark; `None` closes the whole
    /// position. Released margin plus pnl is credited, floored at zero by
    /// isolated margin.
    pub async fn close_position(
        &self,
        position_id: &str,
        quantity: Option<f64>,
    ) -> Result<CloseOutcome, TradingError> {
        let mut state = self.state.lock().await;

        let index = state
            .positions
            .iter()
            .position(|position| position.id == position_id)
            .ok_or_else(|| {
                TradingError::not_found(format!("no open futures position with id {position_id}"))
            })?;

        let held = state.positions[index].quantity;
        let close_quantity = quantity.unwrap_or(held);
        if close_quantity <= 0.0 || close_quantity > held {
            return Err(TradingError::invalid_param(format!(
                "cannot close {close_quantity} of a position holding {held}"
            )));
        }

        let ticker = state.positions[index].ticker.clone();
        let mark_price = self
            .quotes
            .fetch_quote(&ticker.usdt_pair())
            .await?
            .price;

        let position = &mut state.positions[index];
        let pnl = margin::unrealized_pnl(
            position.side,
            close_quantity,
            position.entry_price,
            mark_price,
        );
        let margin_released = close_quantity / position.quantity * position.initial_margin;

        // Isolated margin: the account can never lose more than the posted
        // margin on this position.
        self.cash.adjust((margin_released + pnl).max(0.0)).await?;

        let side = position.side;
        let remaining = held - close_quantity;
        if remaining <= 0.0 {
            state.positions.remove(index);
        } else {
            position.quantity = remaining;
            position.initial_margin -= margin_released;
            position.margin_balance = position.initial_margin;
            position.realized_pnl += pnl;
            position.mark_price = mark_price;
            position.updated_at = Utc::now();
        }

        state.transactions.push(FuturesTransaction {
            kind: FuturesTradeKind::close(side),
            ticker: ticker.clone(),
            quantity: close_quantity,
            price: mark_price,
            leverage: None,
            pnl: Some(pnl),
            date: Utc::now(),
        });

        self.store.save(&state).await?;
        info!(
            %ticker,
            %side,
            quantity = close_quantity,
            mark_price,
            pnl,
            margin_released,
            "futures position closed"
        );

        Ok(CloseOutcome {
            quantity_closed: close_quantity,
            exit_price: mark_price,
            pnl,
            margin_released,
            remaining,
        })
    }

    /// Configure the default leverage for a ticker. Rejected while any
    /// position on that ticker is open.
    pub async fn set_leverage(&self, ticker: Ticker, leverage: u32) -> Result<(), TradingError> {
        if !(margin::LEVERAGE_MIN..=margin::LEVERAGE_MAX).contains(&leverage) {
            return Err(TradingError::invalid_param(format!(
                "leverage {leverage} outside [{}, {}]",
                margin::LEVERAGE_MIN,
                margin::LEVERAGE_MAX
            )));
        }

        let mut state = self.state.lock().await;

        if state
            .positions
            .iter()
            .any(|position| position.ticker == ticker)
        {
            return Err(TradingError::Invariant(format!(
                "cannot change leverage while a {ticker} position is open"
            )));
        }

        state.leverage_settings.insert(ticker, leverage);
        self.store.save(&state).await?;

        Ok(())
    }

    /// Live view of all open positions, marked against fresh quotes.
    /// Per-ticker quote failures keep the last known mark.
    pub async fn positions(&self) -> Vec<FuturesPosition> {
        let now = Utc::now();
        let mut state = self.state.lock().await;

        let tickers = state
            .positions
            .iter()
            .map(|position| position.ticker.clone())
            .unique()
            .collect::<Vec<_>>();

        for ticker in tickers {
            let mark_price = match self.quotes.fetch_quote(&ticker.usdt_pair()).await {
                Ok(quote) => quote.price,
                Err(error) => {
                    warn!(%ticker, %error, "mark refresh kept last price");
                    continue;
                }
            };

            for position in state
                .positions
                .iter_mut()
                .filter(|position| position.ticker == ticker)
            {
                position.mark_price = mark_price;
                let notional = position.quantity * mark_price;
                position.maintenance_margin_rate = margin::maintenance_margin_rate(notional);
                position.maintenance_margin = margin::maintenance_margin(
                    position.quantity,
                    mark_price,
                    position.maintenance_margin_rate,
                );
                position.unrealized_pnl = margin::unrealized_pnl(
                    position.side,
                    position.quantity,
                    position.entry_price,
                    mark_price,
                );
                position.roe = margin::roe(position.unrealized_pnl, position.initial_margin);
                position.updated_at = now;
            }
        }

        state.positions.clone()
    }

    /// Positions as last persisted, without touching the quote source. Used
    /// by the liquidation sweep, which fetches its own marks.
    pub async fn positions_snapshot(&self) -> Vec<FuturesPosition> {
        self.state.lock().await.positions.clone()
    }

    /// Account-level margin summary.
    pub async fn account(&self) -> FuturesAccount {
        let available_balance = self.cash.balance().await;
        let state = self.state.lock().await;

        FuturesAccount {
            available_balance,
            total_margin_used: state
                .positions
                .iter()
                .map(|position| position.initial_margin)
                .sum(),
            total_unrealized_pnl: state
                .positions
                .iter()
                .map(|position| position.unrealized_pnl)
                .sum(),
        }
    }

    /// Force-close a position at the given mark. Returns `None` when the id
    /// is no longer open (eg/ closed between sweep and trigger).
    ///
    /// The reported pnl is floored at the lost margin balance; the cash
    /// credit is floored at zero.
    pub async fn liquidate_position(
        &self,
        position_id: &str,
        mark_price: f64,
    ) -> Result<Option<LiquidationEvent>, TradingError> {
        let mut state = self.state.lock().await;

        let Some(index) = state
            .positions
            .iter()
            .position(|position| position.id == position_id)
        else {
            return Ok(None);
        };

        let position = state.positions.remove(index);
        let pnl = margin::unrealized_pnl(
            position.side,
            position.quantity,
            position.entry_price,
            mark_price,
        );
        let reported_pnl = pnl.max(-position.margin_balance);

        self.cash
            .adjust((position.margin_balance + pnl).max(0.0))
            .await?;

        let now = Utc::now();
        state.transactions.push(FuturesTransaction {
            kind: FuturesTradeKind::Liquidation,
            ticker: position.ticker.clone(),
            quantity: position.quantity,
            price: mark_price,
            leverage: Some(position.leverage),
            pnl: Some(reported_pnl),
            date: now,
        });

        self.store.save(&state).await?;
        warn!(
            ticker = %position.ticker,
            side = %position.side,
            quantity = position.quantity,
            mark_price,
            pnl = reported_pnl,
            "futures position liquidated"
        );

        Ok(Some(LiquidationEvent {
            ticker: position.ticker,
            side: position.side,
            quantity: position.quantity,
            entry_price: position.entry_price,
            mark_price,
            pnl: reported_pnl,
            liquidated_at: now,
        }))
    }

    /// Most recent futures transactions, newest first.
    pub async fn transactions(&self, limit: usize) -> Vec<FuturesTransaction> {
        let state = self.state.lock().await;
        state
            .transactions
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Replace the aggregate with defaults.
    pub async fn reset(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        *state = FuturesData::default();
        self.store.save(&state).await
    }
}
