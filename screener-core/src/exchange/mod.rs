//! Exchange integration
//!
//! REST-based market data access. The update loop talks to the exchange
//! through the [`MarketSource`] trait so it can be driven by a stub in
//! tests; [`BinanceClient`] is the production implementation.

pub mod binance;

pub use binance::BinanceClient;

use std::collections::HashMap;
use thiserror::Error;

use crate::data::Candle;

/// Market data retrieval failure.
///
/// Transient failures (timeouts, rate limits, 5xx) have already been
/// retried with backoff by the time the caller sees them; non-transient
/// ones (malformed or empty payloads) are returned immediately.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("exchange request failed after retries: {0}")]
    Transient(String),
    #[error("malformed exchange response: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// A tradable pair as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
}

/// Market data source the update loop runs against.
pub trait MarketSource {
    /// All actively trading pairs.
    fn trading_pairs(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<SymbolInfo>, FetchError>> + Send;

    /// 24h quote volume per symbol, one bulk call.
    fn day_volumes(
        &self,
    ) -> impl std::future::Future<Output = Result<HashMap<String, f64>, FetchError>> + Send;

    /// Candle history for one (symbol, interval), oldest first.
    fn klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<Candle>, FetchError>> + Send;
}
