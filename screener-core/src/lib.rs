//! Screener core: market data access and indicator computation.
//!
//! This crate holds the pure / exchange-facing half of the screener:
//!
//! - **Data**: OHLCV candle types produced by the fetcher
//! - **Exchange**: Binance USD-M Futures REST client with retry/backoff
//! - **Indicators**: Stochastic RSI engine (Wilder RSI + stochastic %K/%D)
//!
//! Storage and HTTP serving live in the `shared` and `api` crates; nothing
//! here knows about SQLite or axum.

pub mod data;
pub mod exchange;
pub mod indicators;

pub use data::Candle;
pub use exchange::{BinanceClient, FetchError, MarketSource, SymbolInfo};
pub use indicators::{IndicatorError, StochRsi, StochRsiParams};

/// Result type alias
pub type Result<T> = anyhow::Result<T>;
