use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use shared::{Config, SnapshotStore};

/// Shared read-path state.
///
/// The store handle is optional: when the database could not be opened at
/// startup (the updater may simply not have run yet) each request retries
/// the open instead of failing the process.
#[derive(Clone)]
pub struct AppState {
    db_path: String,
    store: Arc<RwLock<Option<SnapshotStore>>>,
    /// Configured timeframe list, also the default filter set
    pub timeframes: Vec<String>,
}

impl AppState {
    pub fn new(store: Option<SnapshotStore>, config: &Config) -> Self {
        Self {
            db_path: config.database_path.clone(),
            store: Arc::new(RwLock::new(store)),
            timeframes: config.timeframes.clone(),
        }
    }

    /// Current store handle, re-opening lazily if the first open failed.
    pub async fn store(&self) -> Option<SnapshotStore> {
        if let Some(store) = self.store.read().await.clone() {
            return Some(store);
        }
        match SnapshotStore::open(&self.db_path).await {
            Ok(store) => {
                info!(path = %self.db_path, "store became available");
                *self.store.write().await = Some(store.clone());
                Some(store)
            }
            Err(e) => {
                warn!(error = %e, "store still unavailable");
                None
            }
        }
    }
}
