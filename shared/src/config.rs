use std::str::FromStr;
use std::time::Duration;

use dotenv::dotenv;

/// Process configuration, read once at startup from the environment
/// (with `.env` support). Every knob has a default suitable for a small
/// always-on deployment.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file path
    pub database_path: String,
    /// Bind address for the HTTP API
    pub bind_addr: String,
    /// Directory of static dashboard assets
    pub ui_dir: String,
    /// Candle timeframes swept each cycle, in sweep order
    pub timeframes: Vec<String>,
    /// Sleep between full update cycles
    pub cycle_interval: Duration,
    /// Sleep between per-unit exchange requests
    pub request_delay: Duration,
    /// Per-request network timeout
    pub fetch_timeout: Duration,
    /// Retries for transient exchange failures
    pub max_retries: u32,
    /// Candles requested per (symbol, timeframe)
    pub klines_limit: u32,
    /// Wilder RSI period
    pub rsi_period: usize,
    /// Stochastic lookback over RSI values
    pub stoch_period: usize,
    /// %D smoothing window
    pub smoothing: usize,
    /// Universe cap applied in test mode
    pub test_symbol_limit: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenv().ok();

        Ok(Config {
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/stoch_rsi.db".to_string()),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            ui_dir: std::env::var("UI_DIR").unwrap_or_else(|_| "ui".to_string()),
            timeframes: std::env::var("TIMEFRAMES")
                .map(|raw| {
                    raw.split(',')
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| {
                    ["15m", "1h", "4h", "1d"].iter().map(|s| s.to_string()).collect()
                }),
            cycle_interval: Duration::from_secs(env_parse("CYCLE_INTERVAL_SECS", 300u64)),
            request_delay: Duration::from_millis(env_parse("REQUEST_DELAY_MS", 100u64)),
            fetch_timeout: Duration::from_secs(env_parse("FETCH_TIMEOUT_SECS", 10u64)),
            max_retries: env_parse("FETCH_MAX_RETRIES", 3u32),
            klines_limit: env_parse("KLINES_LIMIT", 100u32),
            rsi_period: env_parse("RSI_PERIOD", 14usize),
            stoch_period: env_parse("STOCH_PERIOD", 14usize),
            smoothing: env_parse("STOCH_SMOOTHING", 3usize),
            test_symbol_limit: env_parse("TEST_SYMBOL_LIMIT", 5usize),
        })
    }
}

fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
