//! Binance USD-M Futures REST client

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::data::Candle;
use crate::exchange::{FetchError, MarketSource, SymbolInfo};

/// Binance USD-M Futures REST base URL.
pub const BINANCE_FUTURES_URL: &str = "https://fapi.binance.com";

const EXCHANGE_INFO_ENDPOINT: &str = "/fapi/v1/exchangeInfo";
const KLINES_ENDPOINT: &str = "/fapi/v1/klines";
const TICKER_24H_ENDPOINT: &str = "/fapi/v1/ticker/24hr";

/// Base delay for exponential backoff, doubled per attempt.
const BACKOFF_BASE_MS: u64 = 500;
/// Upper bound of the random jitter added to each backoff sleep.
const BACKOFF_JITTER_MS: u64 = 250;

/// REST client for Binance USD-M Futures market data.
///
/// Every request carries a bounded timeout; transient failures (transport
/// errors, HTTP 429 and 5xx) are retried with exponential backoff plus
/// jitter before surfacing as [`FetchError::Transient`].
#[derive(Debug, Clone)]
pub struct BinanceClient {
    http: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<ExchangeSymbol>,
}

#[derive(Debug, Deserialize)]
struct ExchangeSymbol {
    symbol: String,
    status: String,
    #[serde(rename = "baseAsset")]
    base_asset: String,
    #[serde(rename = "quoteAsset")]
    quote_asset: String,
}

#[derive(Debug, Deserialize)]
struct Ticker24h {
    symbol: String,
    #[serde(rename = "quoteVolume")]
    quote_volume: String,
}

impl BinanceClient {
    /// Create a client against the production Binance Futures API.
    pub fn new(timeout: Duration, max_retries: u32) -> anyhow::Result<Self> {
        Self::with_base_url(BINANCE_FUTURES_URL, timeout, max_retries)
    }

    /// Create a client against an alternate base URL (testnet, proxy).
    pub fn with_base_url(
        base_url: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            max_retries,
        })
    }

    /// GET a JSON payload with the retry/backoff policy applied.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_error = String::new();

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = BACKOFF_BASE_MS * (1 << (attempt - 1));
                let jitter = rand::thread_rng().gen_range(0..BACKOFF_JITTER_MS);
                debug!(%url, attempt, backoff_ms = backoff + jitter, "retrying after backoff");
                tokio::time::sleep(Duration::from_millis(backoff + jitter)).await;
            }

            let response = match self.http.get(&url).query(query).send().await {
                Ok(r) => r,
                Err(e) => {
                    // Timeouts and transport errors are retryable.
                    last_error = e.to_string();
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                return response
                    .json::<T>()
                    .await
                    .map_err(|e| FetchError::Malformed(format!("{url}: {e}")));
            }

            if status.as_u16() == 429 || status.is_server_error() {
                last_error = format!("HTTP {status}");
                warn!(%url, %status, attempt, "rate limited or server error");
                continue;
            }

            // Client errors other than 429 will not improve with retries.
            return Err(FetchError::Malformed(format!("{url}: HTTP {status}")));
        }

        Err(FetchError::Transient(format!("{url}: {last_error}")))
    }
}

impl MarketSource for BinanceClient {
    async fn trading_pairs(&self) -> Result<Vec<SymbolInfo>, FetchError> {
        let info: ExchangeInfo = self.get_json(EXCHANGE_INFO_ENDPOINT, &[]).await?;
        Ok(info
            .symbols
            .into_iter()
            .filter(|s| s.status == "TRADING")
            .map(|s| SymbolInfo {
                symbol: s.symbol,
                base_asset: s.base_asset,
                quote_asset: s.quote_asset,
            })
            .collect())
    }

    async fn day_volumes(&self) -> Result<HashMap<String, f64>, FetchError> {
        // One bulk ticker call covers the whole universe.
        let tickers: Vec<Ticker24h> = self.get_json(TICKER_24H_ENDPOINT, &[]).await?;
        Ok(tickers
            .into_iter()
            .map(|t| (t.symbol, t.quote_volume.parse::<f64>().unwrap_or(0.0)))
            .collect())
    }

    async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, FetchError> {
        let query = [
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
            ("limit", limit.to_string()),
        ];
        let rows: Vec<Vec<serde_json::Value>> = self.get_json(KLINES_ENDPOINT, &query).await?;

        if rows.is_empty() {
            return Err(FetchError::Malformed(format!(
                "empty klines response for {symbol} {interval}"
            )));
        }

        rows.iter().map(|row| parse_kline(symbol, row)).collect()
    }
}

/// Parse one positional kline row:
/// `[openTime, open, high, low, close, volume, ...]`, prices as strings.
fn parse_kline(symbol: &str, row: &[serde_json::Value]) -> Result<Candle, FetchError> {
    let malformed = || FetchError::Malformed(format!("bad kline row for {symbol}"));

    if row.len() < 6 {
        return Err(malformed());
    }
    let open_time = row[0].as_i64().ok_or_else(malformed)?;
    let price = |idx: usize| -> Result<f64, FetchError> {
        row[idx]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(malformed)
    };

    Ok(Candle {
        open_time,
        open: price(1)?,
        high: price(2)?,
        low: price(3)?,
        close: price(4)?,
        volume: price(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_kline_row() {
        let row = vec![
            json!(1_700_000_000_000i64),
            json!("100.5"),
            json!("110.0"),
            json!("99.0"),
            json!("105.25"),
            json!("12345.6"),
            json!(1_700_000_059_999i64),
        ];
        let candle = parse_kline("BTCUSDT", &row).unwrap();
        assert_eq!(candle.open_time, 1_700_000_000_000);
        assert_eq!(candle.close, 105.25);
        assert_eq!(candle.volume, 12345.6);
    }

    #[test]
    fn test_parse_kline_rejects_short_row() {
        let row = vec![json!(1i64), json!("1.0")];
        let err = parse_kline("BTCUSDT", &row).unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_parse_kline_rejects_non_numeric_price() {
        let row = vec![
            json!(1i64),
            json!("1.0"),
            json!("1.0"),
            json!("1.0"),
            json!("not-a-price"),
            json!("0.0"),
        ];
        assert!(parse_kline("BTCUSDT", &row).is_err());
    }
}
