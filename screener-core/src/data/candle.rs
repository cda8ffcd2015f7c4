//! OHLCV candle data structures

use serde::{Deserialize, Serialize};

/// A single OHLCV candle as returned by the exchange.
///
/// Candles are ephemeral: the fetcher produces them, the indicator engine
/// consumes their closes, and nothing persists them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Candle open time, unix milliseconds
    pub open_time: i64,
    /// Opening price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Closing price
    pub close: f64,
    /// Base-asset volume
    pub volume: f64,
}

impl Candle {
    pub fn new(open_time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Check if candle is bullish
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Total range (high - low)
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Extract closing prices from a candle slice, oldest first.
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}
