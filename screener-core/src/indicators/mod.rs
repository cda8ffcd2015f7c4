//! Technical indicators module
//!
//! The screener only tracks one indicator, Stochastic RSI, computed from
//! scratch on every update so the result matches the TradingView reference
//! values for the same candle history.

pub mod stoch_rsi;

pub use stoch_rsi::{IndicatorError, StochRsi, StochRsiParams};
