//! Stochastic RSI indicator
//!
//! A stochastic oscillator applied to Wilder-smoothed RSI values rather than
//! price. %K is the raw oscillator over the trailing RSI window, %D the
//! 3-period simple moving average of %K.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndicatorError {
    /// Candle history is too short for a stable %K/%D pair.
    /// Callers skip the unit; this is not a fault.
    #[error("not enough candle history to compute Stochastic RSI")]
    InsufficientData,
}

/// Stochastic RSI parameters (TradingView defaults).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StochRsiParams {
    /// Wilder RSI period
    pub rsi_period: usize,
    /// Lookback window for the stochastic min/max over RSI
    pub stoch_period: usize,
    /// SMA window applied to raw %K to obtain %D
    pub smoothing: usize,
}

impl Default for StochRsiParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            stoch_period: 14,
            smoothing: 3,
        }
    }
}

impl StochRsiParams {
    /// Minimum number of closes required before a snapshot is produced.
    ///
    /// Anything shorter cannot fill the RSI seed, the stochastic lookback
    /// and the %D smoothing window at the same time.
    pub fn min_candles(&self) -> usize {
        self.rsi_period + self.stoch_period + self.smoothing - 1
    }
}

/// One computed Stochastic RSI value. All fields lie in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StochRsi {
    /// Raw %K
    pub k: f64,
    /// SMA of the last `smoothing` %K values
    pub d: f64,
    /// Latest RSI the oscillator was computed from
    pub rsi: f64,
}

/// Wilder-smoothed RSI series over closing prices.
///
/// `None` until index `period`; the first value is seeded with the simple
/// average of the first `period` gains/losses, every later value blends as
/// `avg = (avg * (period - 1) + current) / period`.
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut rsi = vec![None; closes.len()];
    if closes.len() < period + 1 {
        return rsi;
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let gains: Vec<f64> = deltas.iter().map(|d| d.max(0.0)).collect();
    let losses: Vec<f64> = deltas.iter().map(|d| (-d).max(0.0)).collect();

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
    rsi[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    for i in period + 1..closes.len() {
        avg_gain = (avg_gain * (period as f64 - 1.0) + gains[i - 1]) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + losses[i - 1]) / period as f64;
        rsi[i] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    rsi
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        // All losses zero: pinned at 100, or 0 when no candle moved at all.
        if avg_gain > 0.0 {
            100.0
        } else {
            0.0
        }
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }
}

/// Raw stochastic %K over an RSI window. A flat window pins %K at 50
/// instead of dividing by zero.
fn stoch_k(window: &[f64], latest: f64) -> f64 {
    let min = window.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == min {
        50.0
    } else {
        (latest - min) / (max - min) * 100.0
    }
}

/// Compute the latest Stochastic RSI value from a close-price history,
/// oldest first.
///
/// Returns [`IndicatorError::InsufficientData`] when the history cannot
/// fill every window; a short %D is withheld rather than computed over
/// fewer than `smoothing` %K values.
pub fn compute(closes: &[f64], params: &StochRsiParams) -> Result<StochRsi, IndicatorError> {
    if closes.len() < params.min_candles() {
        return Err(IndicatorError::InsufficientData);
    }

    let rsi = rsi_series(closes, params.rsi_period);

    // Raw %K wherever a full RSI window is available.
    let mut k_values = Vec::new();
    for i in 0..rsi.len() {
        if i + 1 < params.stoch_period {
            continue;
        }
        let window: Vec<f64> = rsi[i + 1 - params.stoch_period..=i]
            .iter()
            .filter_map(|v| *v)
            .collect();
        if window.len() < params.stoch_period {
            continue;
        }
        k_values.push(stoch_k(&window, window[window.len() - 1]));
    }

    if k_values.len() < params.smoothing {
        return Err(IndicatorError::InsufficientData);
    }

    let k = k_values[k_values.len() - 1];
    let tail = &k_values[k_values.len() - params.smoothing..];
    let d = tail.iter().sum::<f64>() / params.smoothing as f64;
    let latest_rsi = rsi.last().copied().flatten().expect("rsi present past min_candles");

    Ok(StochRsi { k, d, rsi: latest_rsi })
}
