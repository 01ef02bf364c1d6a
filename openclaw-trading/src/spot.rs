use crate::{
    asset::{AssetKind, Ticker},
    error::TradingError,
    portfolio::{PortfolioLedger, SpotTransaction},
    QuoteSources,
};
use openclaw_markets::Quote;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Confirmation returned by a successful spot trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeConfirmation {
    pub message: String,
    pub transaction: SpotTransaction,
}

/// Spot execution engine: routes a ticker to the right quote source and
/// executes the trade against the ledger at the live price.
///
/// Routing precedence: explicit asset type, then the ledger's recorded hint,
/// then crypto.
#[derive(Debug)]
pub struct SpotEngine {
    ledger: Arc<PortfolioLedger>,
    quotes: QuoteSources,
}

impl SpotEngine {
    pub fn new(ledger: Arc<PortfolioLedger>, quotes: QuoteSources) -> Self {
        Self { ledger, quotes }
    }

    /// Request symbol for a ticker under the given routing.
    pub fn request_symbol(ticker: &Ticker, kind: AssetKind) -> String {
        match kind {
            AssetKind::Crypto => ticker.usdt_pair(),
            AssetKind::Stock => ticker.as_str().to_string(),
        }
    }

    async fn resolve_kind(&self, ticker: &Ticker, kind: Option<AssetKind>) -> AssetKind {
        match kind {
            Some(kind) => kind,
            None => self
                .ledger
                .asset_kind_hint(ticker)
                .await
                .unwrap_or_default(),
        }
    }

    async fn fetch_price(&self, ticker: &Ticker, kind: AssetKind) -> Result<f64, TradingError> {
        let symbol = Self::request_symbol(ticker, kind);
        let quote = match kind {
            AssetKind::Crypto => self.quotes.crypto.fetch_quote(&symbol).await?,
            AssetKind::Stock => self.quotes.stocks.fetch_quote(&symbol).await?,
        };

        if quote.price <= 0.0 {
            return Err(TradingError::invalid_param(format!(
                "quote for {symbol} returned non-positive price {}",
                quote.price
            )));
        }

        Ok(quote.price)
    }

    /// Buy `quantity` units of `ticker` at the live quote.
    pub async fn execute_buy(
        &self,
        ticker: Ticker,
        quantity: f64,
        reasoning: Option<String>,
        kind: Option<AssetKind>,
    ) -> Result<TradeConfirmation, TradingError> {
        let resolved = self.resolve_kind(&ticker, kind).await;
        let price = self.fetch_price(&ticker, resolved).await?;

        let transaction = self
            .ledger
            .buy_spot(ticker.clone(), quantity, price, reasoning, Some(resolved))
            .await?;

        info!(%ticker, quantity, price, "spot buy routed and filled");
        Ok(TradeConfirmation {
            message: format!("bought {quantity} {ticker} at ${price}"),
            transaction,
        })
    }

    /// Sell `quantity` units of `ticker` at the live quote.
    pub async fn execute_sell(
        &self,
        ticker: Ticker,
        quantity: f64,
        reasoning: Option<String>,
        kind: Option<AssetKind>,
    ) -> Result<TradeConfirmation, TradingError> {
        let resolved = self.resolve_kind(&ticker, kind).await;
        let price = self.fetch_price(&ticker, resolved).await?;

        let transaction = self
            .ledger
            .sell_spot(ticker.clone(), quantity, price, reasoning)
            .await?;

        info!(%ticker, quantity, price, "spot sell routed and filled");
        Ok(TradeConfirmation {
            message: format!("sold {quantity} {ticker} at ${price}"),
            transaction,
        })
    }

    /// Quote a single symbol under the given routing.
    pub async fn quote(
        &self,
        symbol: &str,
        kind: Option<AssetKind>,
    ) -> Result<Quote, TradingError> {
        let ticker = Ticker::new(symbol);
        let resolved = self.resolve_kind(&ticker, kind).await;
        let price = self.fetch_price(&ticker, resolved).await?;
        Ok(Quote::new(ticker.as_str(), price))
    }

    /// Most recent spot transactions, newest first.
    pub async fn transactions(&self, limit: usize) -> Vec<SpotTransaction> {
        self.ledger.transactions(limit).await
    }

    /// Attach or update research notes on a holding.
    pub async fn set_holding_meta(
        &self,
        ticker: Ticker,
        thesis: Option<String>,
        context: Option<String>,
    ) -> Result<(), TradingError> {
        self.ledger
            .set_holding_meta(ticker, thesis, context)
            .await
            .map_err(TradingError::from)
    }

    /// Reset the spot ledger to defaults. Leaves the derivative aggregates
    /// untouched.
    pub async fn reset(&self, cash: Option<f64>) -> Result<(), TradingError> {
        self.ledger.reset(cash).await.map_err(TradingError::from)
    }
}
