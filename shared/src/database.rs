//! SQLite-backed snapshot store.
//!
//! One writer (the update loop), many concurrent readers (API requests).
//! WAL journal mode keeps readers off the writer's lock; every upsert is a
//! single self-contained statement, so a reader sees either the old row or
//! the new one, never a mix.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::info;

use crate::models::{IndicatorSnapshot, SymbolRow};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable keyed cache of the latest snapshot per (symbol, timeframe),
/// plus per-symbol 24h volume and cycle metadata.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    pool: SqlitePool,
}

impl SnapshotStore {
    /// Open (creating if missing) the store at the given file path.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(path, "snapshot store opened");
        Ok(store)
    }

    /// In-memory store for tests. Single connection: each in-memory SQLite
    /// connection is its own database.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS symbols (
                symbol      TEXT PRIMARY KEY,
                volume_24h  REAL NOT NULL DEFAULT 0,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                symbol      TEXT NOT NULL,
                timeframe   TEXT NOT NULL,
                k           REAL NOT NULL,
                d           REAL NOT NULL,
                rsi         REAL NOT NULL,
                computed_at TEXT NOT NULL,
                PRIMARY KEY (symbol, timeframe)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cycles (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at   TEXT NOT NULL,
                completed_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Upsert the latest snapshot for its (symbol, timeframe) key.
    /// Last write wins; the statement is atomic.
    pub async fn upsert_snapshot(&self, snap: &IndicatorSnapshot) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO snapshots (symbol, timeframe, k, d, rsi, computed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (symbol, timeframe) DO UPDATE SET
                k = excluded.k,
                d = excluded.d,
                rsi = excluded.rsi,
                computed_at = excluded.computed_at
            "#,
        )
        .bind(&snap.symbol)
        .bind(&snap.timeframe)
        .bind(snap.k)
        .bind(snap.d)
        .bind(snap.rsi)
        .bind(snap.computed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upsert a symbol's 24h quote volume.
    pub async fn upsert_volume(&self, symbol: &str, volume_24h: f64) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO symbols (symbol, volume_24h, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT (symbol) DO UPDATE SET
                volume_24h = excluded.volume_24h,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(symbol)
        .bind(volume_24h)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Everything committed so far: symbol -> timeframe -> snapshot.
    pub async fn all_latest(
        &self,
    ) -> Result<HashMap<String, HashMap<String, IndicatorSnapshot>>, StoreError> {
        let rows: Vec<IndicatorSnapshot> = sqlx::query_as(
            "SELECT symbol, timeframe, k, d, rsi, computed_at FROM snapshots",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut latest: HashMap<String, HashMap<String, IndicatorSnapshot>> = HashMap::new();
        for row in rows {
            latest
                .entry(row.symbol.clone())
                .or_default()
                .insert(row.timeframe.clone(), row);
        }
        Ok(latest)
    }

    /// The latest snapshot for one key, if any.
    pub async fn get_snapshot(
        &self,
        symbol: &str,
        timeframe: &str,
    ) -> Result<Option<IndicatorSnapshot>, StoreError> {
        let row = sqlx::query_as(
            "SELECT symbol, timeframe, k, d, rsi, computed_at
             FROM snapshots WHERE symbol = ? AND timeframe = ?",
        )
        .bind(symbol)
        .bind(timeframe)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Known symbols ranked by 24h volume descending, name as tiebreak so
    /// zero-volume symbols keep a stable order at the tail.
    pub async fn symbols_by_volume(&self) -> Result<Vec<SymbolRow>, StoreError> {
        let rows = sqlx::query_as(
            "SELECT symbol, volume_24h FROM symbols ORDER BY volume_24h DESC, symbol ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Record the start of a sweep; returns the cycle id.
    pub async fn begin_cycle(&self) -> Result<i64, StoreError> {
        let result = sqlx::query("INSERT INTO cycles (started_at) VALUES (?)")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Mark a sweep complete.
    pub async fn complete_cycle(&self, cycle_id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE cycles SET completed_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(cycle_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Completion time of the most recently finished cycle, used as the
    /// table-level "last update" timestamp.
    pub async fn last_completed_cycle(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
            "SELECT completed_at FROM cycles
             WHERE completed_at IS NOT NULL ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(t,)| t))
    }
}
