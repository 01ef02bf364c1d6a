use super::{
    chain::{self, OptionChain},
    position::{OptionContract, OptionPosition, OptionTradeKind, OptionTransaction, OptionsData},
    pricing::{self, round_1dp, round_2dp},
    OptionType, CONTRACT_MULTIPLIER,
};
use crate::{
    asset::{AssetClass, Ticker},
    error::TradingError,
    event::{Broadcaster, OptionExpiryEvent},
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

/// Result of selling option contracts back at the live premium.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellOutcome {
    pub contracts_sold: f64,
    pub proceeds: f64,
    pub pnl: f64,
    /// Contracts still held after the sale; 0 means the position is closed.
    pub remaining: f64,
}

/// A live quote for one option series.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionQuote {
    pub premium_per_share: f64,
    pub premium_per_contract: f64,
    pub intrinsic_value: f64,
    pub time_value: f64,
    pub days_to_expiry: f64,
    pub implied_vol: f64,
}

/// Long-only American-style options engine.
///
/// Positions move `Open -> Closed` (sold back) or `Open -> Settled` (cash
/// settlement at expiry). Partial sells shrink `contracts` and
/// `premium_paid` proportionally. All cash movement goes through the
/// injected [`CashAccount`]; every successful mutation persists before
/// returning.
#[derive(Debug)]
pub struct OptionsEngine {
    state: Mutex<OptionsData>,
    store: JsonStore<OptionsData>,
    quotes: Arc<dyn QuoteProvider>,
    cash: CashAccount,
}

impl OptionsEngine {
    /// Load the persisted aggregate, initialising defaults on first run.
    pub async fn init(
        store: JsonStore<OptionsData>,
        quotes: Arc<dyn QuoteProvider>,
        cash: CashAccount,
    ) -> Result<Self, StoreError> {
        let state = store.load_or_init(OptionsData::default()).await?;
        Ok(Self {
            state: Mutex::new(state),
            store,
            quotes,
            cash,
        })
    }

    /// Buy `contracts` contracts of the given series at the live premium.
    pub async fn buy_option(
        &self,
        ticker: Ticker,
        option_type: OptionType,
        strike_price: f64,
        expiry_date: &str,
        contracts: f64,
    ) -> Result<OptionPosition, TradingError> {
        if contracts <= 0.0 {
            return Err(TradingError::invalid_param(format!(
                "contracts must be positive, got {contracts}"
            )));
        }
        if strike_price <= 0.0 {
            return Err(TradingError::invalid_param(format!(
                "strike price must be positive, got {strike_price}"
            )));
        }

        let now = Utc::now();
        let days = pricing::days_to_expiry(expiry_date, now)?;
        if days <= 0.0 {
            return Err(TradingError::invalid_param(format!(
                "expiry {expiry_date} has already passed"
            )));
        }

        let mut state = self.state.lock().await;

        let spot = self.quotes.fetch_quote(ticker.as_str()).await?.price;
        if spot <= 0.0 {
            return Err(TradingError::invalid_param(format!(
                "quote for {ticker} returned non-positive price {spot}"
            )));
        }

        let implied_vol = pricing::implied_vol(ticker.as_str());
        let premium_per_share = pricing::premium(spot, strike_price, days, implied_vol, option_type);
        let total_premium = premium_per_share * CONTRACT_MULTIPLIER as f64 * contracts;

        self.cash.try_debit(total_premium).await?;

        let position = OptionPosition {
            id: Uuid::new_v4().to_string(),
            contract: OptionContract {
                underlying: ticker.clone(),
                option_type,
                strike_price,
                expiry_date: expiry_date.to_string(),
                multiplier: CONTRACT_MULTIPLIER,
                implied_vol,
            },
            asset_class: AssetClass::UsStockOption,
            contracts,
            premium_paid: total_premium,
            premium_per_share,
            current_premium: premium_per_share,
            current_value: total_premium,
            unrealized_pnl: 0.0,
            unrealized_pnl_percent: 0.0,
            days_to_expiry: days,
            opened_at: now,
            expiry_date: expiry_date.to_string(),
        };

        state.positions.push(position.clone());
        state.transactions.push(OptionTransaction {
            kind: OptionTradeKind::buy(option_type),
            underlying: ticker,
            strike_price,
            expiry_date: expiry_date.to_string(),
            contracts,
            premium_per_share,
            total_amount: total_premium,
            pnl: None,
            date: now,
        });

        self.store.save(&state).await?;
        info!(
            symbol = %position.contract.symbol(),
            contracts,
            premium = total_premium,
            "option bought"
        );

        Ok(position)
    }

    /// Sell contracts back at the live premium. `contracts = None` closes the
    /// whole position.
    pub async fn sell_option(
        &self,
        position_id: &str,
        contracts: Option<f64>,
    ) -> Result<SellOutcome, TradingError> {
        let mut state = self.state.lock().await;

        let index = state
            .positions
            .iter()
            .position(|position| position.id == position_id)
            .ok_or_else(|| {
                TradingError::not_found(format!("no open option position with id {position_id}"))
            })?;

        let held = state.positions[index].contracts;
        let delta = contracts.unwrap_or(held);
        if delta <= 0.0 || delta > held {
            return Err(TradingError::invalid_param(format!(
                "cannot sell {delta} contracts of a position holding {held}"
            )));
        }

        let contract = state.positions[index].contract.clone();
        let premium_paid = state.positions[index].premium_paid;

        let now = Utc::now();
        let spot = self
            .quotes
            .fetch_quote(contract.underlying.as_str())
            .await?
            .price;
        let days = pricing::days_to_expiry_clamped(&contract.expiry_date, now)?;
        let premium_per_share = pricing::premium(
            spot,
            contract.strike_price,
            days,
            contract.implied_vol,
            contract.option_type,
        );

        let proceeds = premium_per_share * CONTRACT_MULTIPLIER as f64 * delta;
        let cost_basis = premium_paid / held * delta;
        let pnl = proceeds - cost_basis;

        self.cash.adjust(proceeds).await?;

        let remaining = held - delta;
        if remaining <= 0.0 {
            state.positions.remove(index);
        } else {
            let position = &mut state.positions[index];
            position.contracts = remaining;
            position.premium_paid -= cost_basis;
        }

        state.transactions.push(OptionTransaction {
            kind: OptionTradeKind::sell(contract.option_type),
            underlying: contract.underlying.clone(),
            strike_price: contract.strike_price,
            expiry_date: contract.expiry_date.clone(),
            contracts: delta,
            premium_per_share,
            total_amount: proceeds,
            pnl: Some(pnl),
            date: now,
        });

        self.store.save(&state).await?;
        info!(symbol = %contract.symbol(), sold = delta, proceeds, pnl, "option sold");

        Ok(SellOutcome {
            contracts_sold: delta,
            proceeds,
            pnl,
            remaining,
        })
    }

    /// Cash-settle every position whose expiry instant has passed. Quote
    /// failures skip the position; it is retried on the next sweep.
    pub async fn settle_expired(
        &self,
        broadcast: Option<&dyn Broadcaster>,
    ) -> Result<Vec<OptionExpiryEvent>, TradingError> {
        let now = Utc::now();
        let mut state = self.state.lock().await;

        let expired_ids = state
            .positions
            .iter()
            .filter(|position| {
                match pricing::days_to_expiry(&position.contract.expiry_date, now) {
                    Ok(days) => days <= 0.0,
                    Err(error) => {
                        warn!(id = %position.id, %error, "unparseable expiry; skipping settlement");
                        false
                    }
                }
            })
            .map(|position| position.id.clone())
            .collect::<Vec<_>>();

        let mut settled = Vec::new();
        for id in expired_ids {
            let Some(index) = state.positions.iter().position(|position| position.id == id)
            else {
                continue;
            };
            let contract = state.positions[index].contract.clone();

            let spot = match self.quotes.fetch_quote(contract.underlying.as_str()).await {
                Ok(quote) => quote.price,
                Err(error) => {
                    warn!(
                        symbol = %contract.symbol(),
                        %error,
                        "quote unavailable; settlement retried next sweep"
                    );
                    continue;
                }
            };

            let position = state.positions.remove(index);
            let intrinsic =
                pricing::intrinsic_value(spot, contract.strike_price, contract.option_type);
            let settlement = intrinsic * CONTRACT_MULTIPLIER as f64 * position.contracts;
            let itm = intrinsic > 0.0;

            if itm {
                self.cash.adjust(settlement).await?;
            }

            let pnl = settlement - position.premium_paid;
            state.transactions.push(OptionTransaction {
                kind: if itm {
                    OptionTradeKind::ExpireItm
                } else {
                    OptionTradeKind::ExpireOtm
                },
                underlying: contract.underlying.clone(),
                strike_price: contract.strike_price,
                expiry_date: contract.expiry_date.clone(),
                contracts: position.contracts,
                premium_per_share: intrinsic,
                total_amount: settlement,
                pnl: Some(pnl),
                date: now,
            });

            let event = OptionExpiryEvent {
                underlying: contract.underlying.clone(),
                option_type: contract.option_type,
                strike_price: contract.strike_price,
                expiry_date: contract.expiry_date.clone(),
                contracts: position.contracts,
                settlement,
                pnl,
                itm,
                settled_at: now,
            };
            if let Some(broadcast) = broadcast {
                broadcast.emit(event.clone().into());
            }
            info!(symbol = %contract.symbol(), itm, settlement, pnl, "option settled");
            settled.push(event);
        }

        if !settled.is_empty() {
            self.store.save(&state).await?;
        }

        Ok(settled)
    }

    /// Live view of all open positions, repriced against fresh underlying
    /// quotes. Per-symbol quote failures keep the last known premium.
    pub async fn positions(&self) -> Vec<OptionPosition> {
        let now = Utc::now();
        let mut state = self.state.lock().await;

        let underlyings = state
            .positions
            .iter()
            .map(|position| position.contract.underlying.clone())
            .unique()
            .collect::<Vec<_>>();

        for underlying in underlyings {
            let spot = match self.quotes.fetch_quote(underlying.as_str()).await {
                Ok(quote) => quote.price,
                Err(error) => {
                    warn!(%underlying, %error, "repricing kept last premium");
                    continue;
                }
            };

            for position in state
                .positions
                .iter_mut()
                .filter(|position| position.contract.underlying == underlying)
            {
                let days = pricing::days_to_expiry_clamped(&position.contract.expiry_date, now)
                    .unwrap_or(0.0);
                position.current_premium = pricing::premium(
                    spot,
                    position.contract.strike_price,
                    days,
                    position.contract.implied_vol,
                    position.contract.option_type,
                );
                position.current_value =
                    position.current_premium * CONTRACT_MULTIPLIER as f64 * position.contracts;
                position.unrealized_pnl = position.current_value - position.premium_paid;
                position.unrealized_pnl_percent = if position.premium_paid > 0.0 {
                    position.unrealized_pnl / position.premium_paid * 100.0
                } else {
                    0.0
                };
                position.days_to_expiry = days;
            }
        }

        state.positions.clone()
    }

    /// Quote one option series at the live underlying price.
    pub async fn quote(
        &self,
        ticker: Ticker,
        option_type: OptionType,
        strike_price: f64,
        expiry_date: &str,
    ) -> Result<OptionQuote, TradingError> {
        let now = Utc::now();
        let days = pricing::days_to_expiry_clamped(expiry_date, now)?;

        let spot = self.quotes.fetch_quote(ticker.as_str()).await?.price;
        let implied_vol = pricing::implied_vol(ticker.as_str());

        let intrinsic = pricing::intrinsic_value(spot, strike_price, option_type);
        let time_value = pricing::time_value(spot, implied_vol, days);
        let premium = intrinsic + time_value;

        Ok(OptionQuote {
            premium_per_share: round_2dp(premium),
            premium_per_contract: round_2dp(premium * CONTRACT_MULTIPLIER as f64),
            intrinsic_value: round_2dp(intrinsic),
            time_value: round_2dp(time_value),
            days_to_expiry: round_1dp(days),
            implied_vol,
        })
    }

    /// Quoted chain for an underlying at the given spot price.
    pub fn generate_chain(&self, ticker: Ticker, spot_price: f64) -> OptionChain {
        chain::build_chain(ticker, spot_price, Utc::now())
    }

    /// Most recent options transactions, newest first.
    pub async fn transactions(&self, limit: usize) -> Vec<OptionTransaction> {
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
        *state = OptionsData::default();
        self.store.save(&state).await
    }
}
