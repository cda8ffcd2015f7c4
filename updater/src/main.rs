use anyhow::Result;
use tracing_subscriber::EnvFilter;

use screener_core::exchange::BinanceClient;
use shared::{Config, SnapshotStore};

mod scheduler;

use scheduler::Scheduler;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting Stochastic RSI update loop...");

    let test_mode = std::env::args().any(|a| a == "--test")
        || std::env::var("TEST_MODE").map(|v| v == "1").unwrap_or(false);
    if test_mode {
        tracing::warn!("test mode enabled: universe capped to a small prefix");
    }

    let config = Config::from_env()?;

    // The store is the only fatal dependency; everything downstream is
    // contained at the unit boundary.
    let store = SnapshotStore::open(&config.database_path).await?;
    let client = BinanceClient::new(config.fetch_timeout, config.max_retries)?;

    let scheduler = Scheduler::new(client, store, config, test_mode);
    scheduler.run().await;

    Ok(())
}
