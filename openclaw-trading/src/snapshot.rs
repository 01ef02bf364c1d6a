use crate::{
    asset::{AssetClass, Ticker},
    futures::{FuturesAccount, FuturesEngine, FuturesPosition},
    options::{OptionPosition, OptionsEngine},
    portfolio::{HoldingMeta, PortfolioLedger, SpotTransaction},
    QuoteSources,
};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tracing::warn;

/// Spot transactions embedded per holding in the snapshot.
const RECENT_TRANSACTIONS_PER_HOLDING: usize = 10;

/// Unified read model across the ledger and both derivative engines.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSnapshot {
    pub cash: f64,
    pub spot_equity: f64,
    pub futures_margin_used: f64,
    pub futures_unrealized_pnl: f64,
    pub options_value: f64,
    /// `cash + spot equity + futures margin + futures pnl + options value`.
    pub total_equity: f64,
    pub spot_holdings: Vec<SpotHoldingView>,
    pub futures_positions: Vec<FuturesPosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub futures_account: Option<FuturesAccount>,
    pub options_positions: Vec<OptionPosition>,
    /// Every position across product lines, sorted by |pnl| descending.
    pub all_positions: Vec<PositionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_pnl: Option<DayPnl>,
    pub as_of: DateTime<Utc>,
}

/// One spot holding enriched with live pricing and research notes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotHoldingView {
    pub ticker: Ticker,
    pub asset_class: AssetClass,
    pub quantity: f64,
    pub average_price: f64,
    pub current_price: f64,
    pub market_value: f64,
    pub cost_basis: f64,
    pub pnl: f64,
    pub pnl_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thesis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Last trades for this ticker, newest first.
    pub recent_transactions: Vec<SpotTransaction>,
}

/// Product-line-agnostic position row for the unified list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionView {
    pub symbol: String,
    pub asset_class: AssetClass,
    pub quantity: f64,
    pub value: f64,
    pub pnl: f64,
}

/// Equity change against the most recent snapshot from a previous day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPnl {
    pub previous_date: String,
    pub previous_total: f64,
    pub change: f64,
    pub change_percent: f64,
}

/// Build the unified snapshot: live spot pricing with per-source fallback to
/// entry prices, live futures and options views, total equity and day P/L.
///
/// Today's equity mark is recorded fire-and-forget; a failed record never
/// fails the snapshot.
pub async fn enriched_snapshot(
    ledger: &Arc<PortfolioLedger>,
    quotes: &QuoteSources,
    futures: Option<&FuturesEngine>,
    options: Option<&OptionsEngine>,
) -> PortfolioSnapshot {
    let state = ledger.snapshot_state().await;

    // Bulk-fetch each source for its partition of the holdings.
    let crypto_tickers = state
        .holdings
        .iter()
        .filter(|(_, holding)| holding.asset_class == AssetClass::CryptoSpot)
        .map(|(ticker, _)| ticker.clone())
        .collect::<Vec<_>>();
    let stock_tickers = state
        .holdings
        .iter()
        .filter(|(_, holding)| holding.asset_class == AssetClass::UsStockSpot)
        .map(|(ticker, _)| ticker.clone())
        .collect::<Vec<_>>();

    let crypto_symbols = crypto_tickers
        .iter()
        .map(Ticker::usdt_pair)
        .collect::<Vec<_>>();
    let stock_symbols = stock_tickers
        .iter()
        .map(|ticker| ticker.as_str().to_string())
        .collect::<Vec<_>>();

    let (crypto_quotes, stock_quotes) = tokio::join!(
        quotes.crypto.fetch_quotes(&crypto_symbols),
        quotes.stocks.fetch_quotes(&stock_symbols),
    );

    // A symbol that failed inside the bulk call comes back with price 0 and
    // falls through to the holding's average entry price.
    let mut prices: HashMap<Ticker, f64> = HashMap::new();
    for (ticker, quote) in crypto_tickers.iter().zip(&crypto_quotes) {
        if quote.price > 0.0 {
            prices.insert(ticker.clone(), quote.price);
        }
    }
    for (ticker, quote) in stock_tickers.iter().zip(&stock_quotes) {
        if quote.price > 0.0 {
            prices.insert(ticker.clone(), quote.price);
        }
    }

    let mut spot_equity = 0.0;
    let spot_holdings = state
        .holdings
        .iter()
        .map(|(ticker, holding)| {
            let current_price = prices
                .get(ticker)
                .copied()
                .unwrap_or(holding.average_price);
            let market_value = holding.quantity * current_price;
            let cost_basis = holding.quantity * holding.average_price;
            let pnl = market_value - cost_basis;
            spot_equity += market_value;

            let meta = state
                .holding_meta
                .get(ticker)
                .cloned()
                .unwrap_or_else(HoldingMeta::default);
            let recent_transactions = state
                .transaction_history
                .iter()
                .rev()
                .filter(|transaction| &transaction.ticker == ticker)
                .take(RECENT_TRANSACTIONS_PER_HOLDING)
                .cloned()
                .collect();

            SpotHoldingView {
                ticker: ticker.clone(),
                asset_class: holding.asset_class,
                quantity: holding.quantity,
                average_price: holding.average_price,
                current_price,
                market_value,
                cost_basis,
                pnl,
                pnl_percent: if cost_basis > 0.0 {
                    pnl / cost_basis * 100.0
                } else {
                    0.0
                },
                thesis: meta.thesis,
                context: meta.context,
                recent_transactions,
            }
        })
        .collect::<Vec<_>>();

    let (futures_positions, futures_account) = match futures {
        Some(engine) => {
            let positions = engine.positions().await;
            let account = engine.account().await;
            (positions, Some(account))
        }
        None => (Vec::new(), None),
    };
    let options_positions = match options {
        Some(engine) => engine.positions().await,
        None => Vec::new(),
    };

    let futures_margin_used = futures_account
        .as_ref()
        .map(|account| account.total_margin_used)
        .unwrap_or(0.0);
    let futures_unrealized_pnl = futures_account
        .as_ref()
        .map(|account| account.total_unrealized_pnl)
        .unwrap_or(0.0);
    let options_value = options_positions
        .iter()
        .map(|position| position.current_value)
        .sum::<f64>();

    let total_equity =
        state.cash + spot_equity + futures_margin_used + futures_unrealized_pnl + options_value;

    let all_positions = spot_holdings
        .iter()
        .map(|holding| PositionView {
            symbol: holding.ticker.to_string(),
            asset_class: holding.asset_class,
            quantity: holding.quantity,
            value: holding.market_value,
            pnl: holding.pnl,
        })
        .chain(futures_positions.iter().map(|position| PositionView {
            symbol: position.ticker.to_string(),
            asset_class: position.asset_class,
            quantity: position.quantity,
            value: position.initial_margin + position.unrealized_pnl,
            pnl: position.unrealized_pnl,
        }))
        .chain(options_positions.iter().map(|position| PositionView {
            symbol: position.contract.symbol(),
            asset_class: position.asset_class,
            quantity: position.contracts,
            value: position.current_value,
            pnl: position.unrealized_pnl,
        }))
        .sorted_by(|a, b| b.pnl.abs().total_cmp(&a.pnl.abs()))
        .collect::<Vec<_>>();

    // Day P/L against the most recent mark from a previous day.
    let today = Utc::now().format("%Y-%m-%d").to_string();
    let day_pnl = state
        .daily_snapshots
        .iter()
        .rev()
        .find(|snapshot| snapshot.date != today)
        .map(|previous| {
            let change = total_equity - previous.total_value;
            DayPnl {
                previous_date: previous.date.clone(),
                previous_total: previous.total_value,
                change,
                change_percent: if previous.total_value != 0.0 {
                    change / previous.total_value * 100.0
                } else {
                    0.0
                },
            }
        });

    // Fire-and-forget: record today's mark without blocking the read path.
    let record_ledger = Arc::clone(ledger);
    tokio::spawn(async move {
        if let Err(error) = record_ledger.record_daily_snapshot(total_equity).await {
            warn!(%error, "daily snapshot record failed");
        }
    });

    PortfolioSnapshot {
        cash: state.cash,
        spot_equity,
        futures_margin_used,
        futures_unrealized_pnl,
        options_value,
        total_equity,
        spot_holdings,
        futures_positions,
        futures_account,
        options_positions,
        all_positions,
        day_pnl,
        as_of: Utc::now(),
    }
}
