use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// %K below this reads as oversold.
pub const OVERSOLD_THRESHOLD: f64 = 20.0;
/// %K above this reads as overbought.
pub const OVERBOUGHT_THRESHOLD: f64 = 80.0;

/// Classification of a %K value against the fixed 20/80 thresholds.
///
/// Never persisted: always derived from the stored %K on read, so the two
/// cannot disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Oversold,
    Overbought,
    Neutral,
}

impl Status {
    pub fn from_k(k: f64) -> Self {
        if k < OVERSOLD_THRESHOLD {
            Status::Oversold
        } else if k > OVERBOUGHT_THRESHOLD {
            Status::Overbought
        } else {
            Status::Neutral
        }
    }
}

/// Latest Stochastic RSI value for one (symbol, timeframe) key.
///
/// One logical row per key; every recomputation overwrites the previous
/// row (last-write-wins, no history retained).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct IndicatorSnapshot {
    pub symbol: String,
    pub timeframe: String,
    pub k: f64,
    pub d: f64,
    pub rsi: f64,
    pub computed_at: DateTime<Utc>,
}

impl IndicatorSnapshot {
    pub fn status(&self) -> Status {
        Status::from_k(self.k)
    }
}

/// Known symbol with its 24h quote volume, refreshed every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SymbolRow {
    pub symbol: String,
    pub volume_24h: f64,
}

/// One table cell as served to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotCell {
    pub k: f64,
    pub d: f64,
    pub rsi: f64,
    pub status: Status,
    pub timestamp: DateTime<Utc>,
}

impl From<&IndicatorSnapshot> for SnapshotCell {
    fn from(snap: &IndicatorSnapshot) -> Self {
        Self {
            k: snap.k,
            d: snap.d,
            rsi: snap.rsi,
            status: snap.status(),
            timestamp: snap.computed_at,
        }
    }
}

/// One dashboard row: a symbol and its per-timeframe cells.
/// A missing cell is an explicit `null`, never a zeroed value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRow {
    pub symbol: String,
    pub timeframes: BTreeMap<String, Option<SnapshotCell>>,
}

/// Response shape shared by `/api/table` and `/api/filter`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableResponse {
    pub timestamp: DateTime<Utc>,
    pub timeframes: Vec<String>,
    pub rows: Vec<TableRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_thresholds() {
        assert_eq!(Status::from_k(0.0), Status::Oversold);
        assert_eq!(Status::from_k(19.999), Status::Oversold);
        assert_eq!(Status::from_k(20.0), Status::Neutral);
        assert_eq!(Status::from_k(50.0), Status::Neutral);
        assert_eq!(Status::from_k(80.0), Status::Neutral);
        assert_eq!(Status::from_k(80.001), Status::Overbought);
        assert_eq!(Status::from_k(100.0), Status::Overbought);
    }

    #[test]
    fn test_status_consistent_across_k_range() {
        // Sweep the whole range; the derived status must always agree with
        // the threshold arithmetic.
        for i in 0..=10_000 {
            let k = i as f64 / 100.0;
            let status = Status::from_k(k);
            if k < OVERSOLD_THRESHOLD {
                assert_eq!(status, Status::Oversold);
            } else if k > OVERBOUGHT_THRESHOLD {
                assert_eq!(status, Status::Overbought);
            } else {
                assert_eq!(status, Status::Neutral);
            }
        }
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Status::Oversold).unwrap(),
            "\"oversold\""
        );
        assert_eq!(
            serde_json::to_string(&Status::Overbought).unwrap(),
            "\"overbought\""
        );
    }
}
