//! HTTP query surface over the snapshot store.
//!
//! All data endpoints share one contract: they answer HTTP 200 with a
//! `TableResponse`-shaped body, degrading to `{error, timeframes, rows: []}`
//! on store faults instead of surfacing an internal error status.

use std::collections::{BTreeMap, HashMap};

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use shared::{
    IndicatorSnapshot, SnapshotCell, SnapshotStore, Status, StoreError, SymbolRow, TableResponse,
    TableRow,
};

use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/table", get(table))
        .route("/api/filter", get(filter))
        .route("/api/symbols", get(symbols))
        .route("/api/timeframes", get(timeframes))
}

/// Status predicate requested by the client. `Both` matches either extreme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusFilter {
    Oversold,
    Overbought,
    Both,
}

impl StatusFilter {
    fn parse(raw: Option<&str>) -> Self {
        // Unknown values fall back to the documented default.
        match raw {
            Some("overbought") => Self::Overbought,
            Some("both") => Self::Both,
            _ => Self::Oversold,
        }
    }

    fn matches(self, status: Status) -> bool {
        match self {
            Self::Oversold => status == Status::Oversold,
            Self::Overbought => status == Status::Overbought,
            Self::Both => matches!(status, Status::Oversold | Status::Overbought),
        }
    }
}

/// AND/OR combination of the per-timeframe predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchMode {
    All,
    Any,
}

impl MatchMode {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("any") => Self::Any,
            _ => Self::All,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FilterQuery {
    status: Option<String>,
    timeframes: Option<String>,
    #[serde(rename = "match")]
    match_mode: Option<String>,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "timestamp": Utc::now() }))
}

async fn table(State(state): State<AppState>) -> Json<TableResponse> {
    let Some(store) = state.store().await else {
        return Json(degraded(&state.timeframes, "store unavailable"));
    };
    match table_response(&store, &state.timeframes).await {
        Ok(response) => Json(response),
        Err(e) => {
            error!(error = %e, "table query failed");
            Json(degraded(&state.timeframes, &e.to_string()))
        }
    }
}

async fn filter(
    State(state): State<AppState>,
    Query(query): Query<FilterQuery>,
) -> Json<TableResponse> {
    let Some(store) = state.store().await else {
        return Json(degraded(&state.timeframes, "store unavailable"));
    };
    match filter_response(&store, &state.timeframes, &query).await {
        Ok(response) => Json(response),
        Err(e) => {
            error!(error = %e, "filter query failed");
            Json(degraded(&state.timeframes, &e.to_string()))
        }
    }
}

async fn symbols(State(state): State<AppState>) -> Json<Value> {
    let Some(store) = state.store().await else {
        return Json(json!({ "error": "store unavailable", "symbols": [], "count": 0 }));
    };
    match store.symbols_by_volume().await {
        Ok(rows) => {
            let names: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
            Json(json!({ "symbols": names, "count": names.len() }))
        }
        Err(e) => {
            error!(error = %e, "symbols query failed");
            Json(json!({ "error": e.to_string(), "symbols": [], "count": 0 }))
        }
    }
}

async fn timeframes(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "timeframes": state.timeframes }))
}

/// Best-effort payload when the store cannot be read.
fn degraded(timeframes: &[String], message: &str) -> TableResponse {
    TableResponse {
        timestamp: Utc::now(),
        timeframes: timeframes.to_vec(),
        rows: Vec::new(),
        error: Some(message.to_string()),
    }
}

/// Full table: every known symbol in volume order, one cell per configured
/// timeframe, missing cells explicit `null`.
async fn table_response(
    store: &SnapshotStore,
    timeframes: &[String],
) -> Result<TableResponse, StoreError> {
    let symbols = store.symbols_by_volume().await?;
    let latest = store.all_latest().await?;

    let rows = symbols
        .iter()
        .map(|sym| make_row(&sym.symbol, latest.get(&sym.symbol), timeframes))
        .collect();

    Ok(TableResponse {
        timestamp: last_update(store).await,
        timeframes: timeframes.to_vec(),
        rows,
        error: None,
    })
}

async fn filter_response(
    store: &SnapshotStore,
    defaults: &[String],
    query: &FilterQuery,
) -> Result<TableResponse, StoreError> {
    let status = StatusFilter::parse(query.status.as_deref());
    let mode = MatchMode::parse(query.match_mode.as_deref());
    let requested = parse_timeframes(query.timeframes.as_deref(), defaults);

    let symbols = store.symbols_by_volume().await?;
    let latest = store.all_latest().await?;
    let rows = filter_rows(&symbols, &latest, status, &requested, mode);

    Ok(TableResponse {
        timestamp: last_update(store).await,
        timeframes: requested,
        rows,
        error: None,
    })
}

/// Displayed "last update" is the completion time of the most recent full
/// cycle; before any cycle has completed it falls back to the request time.
async fn last_update(store: &SnapshotStore) -> chrono::DateTime<Utc> {
    match store.last_completed_cycle().await {
        Ok(Some(t)) => t,
        _ => Utc::now(),
    }
}

fn parse_timeframes(raw: Option<&str>, defaults: &[String]) -> Vec<String> {
    let requested: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if requested.is_empty() {
        defaults.to_vec()
    } else {
        requested
    }
}

fn make_row(
    symbol: &str,
    per_timeframe: Option<&HashMap<String, IndicatorSnapshot>>,
    timeframes: &[String],
) -> TableRow {
    let cells: BTreeMap<String, Option<SnapshotCell>> = timeframes
        .iter()
        .map(|tf| {
            let cell = per_timeframe
                .and_then(|m| m.get(tf))
                .map(SnapshotCell::from);
            (tf.clone(), cell)
        })
        .collect();
    TableRow {
        symbol: symbol.to_string(),
        timeframes: cells,
    }
}

/// Apply the status predicate across the requested timeframes.
///
/// `All` requires a matching snapshot in every requested timeframe (a
/// missing cell fails the predicate); `Any` requires at least one. Input
/// symbols are already volume-ranked, so output order is too.
fn filter_rows(
    symbols: &[SymbolRow],
    latest: &HashMap<String, HashMap<String, IndicatorSnapshot>>,
    status: StatusFilter,
    timeframes: &[String],
    mode: MatchMode,
) -> Vec<TableRow> {
    symbols
        .iter()
        .filter_map(|sym| {
            let per_timeframe = latest.get(&sym.symbol);
            let cell_matches = |tf: &String| {
                per_timeframe
                    .and_then(|m| m.get(tf))
                    .map(|snap| status.matches(snap.status()))
                    .unwrap_or(false)
            };
            let selected = match mode {
                MatchMode::All => timeframes.iter().all(cell_matches),
                MatchMode::Any => timeframes.iter().any(cell_matches),
            };
            selected.then(|| make_row(&sym.symbol, per_timeframe, timeframes))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot(symbol: &str, timeframe: &str, k: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            k,
            d: k,
            rsi: 50.0,
            computed_at: Utc::now(),
        }
    }

    /// BTCUSDT (volume 1000) and ETHUSDT (volume 500), both oversold on 1h
    /// (k=15) and neutral on 4h (k=25).
    fn scenario() -> (Vec<SymbolRow>, HashMap<String, HashMap<String, IndicatorSnapshot>>) {
        let symbols = vec![
            SymbolRow { symbol: "BTCUSDT".to_string(), volume_24h: 1000.0 },
            SymbolRow { symbol: "ETHUSDT".to_string(), volume_24h: 500.0 },
        ];
        let mut latest: HashMap<String, HashMap<String, IndicatorSnapshot>> = HashMap::new();
        for sym in ["BTCUSDT", "ETHUSDT"] {
            let per_tf = latest.entry(sym.to_string()).or_default();
            per_tf.insert("1h".to_string(), snapshot(sym, "1h", 15.0));
            per_tf.insert("4h".to_string(), snapshot(sym, "4h", 25.0));
        }
        (symbols, latest)
    }

    fn tfs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_match_all_fails_on_neutral_timeframe() {
        let (symbols, latest) = scenario();
        let rows = filter_rows(
            &symbols,
            &latest,
            StatusFilter::Oversold,
            &tfs(&["1h", "4h"]),
            MatchMode::All,
        );
        assert!(rows.is_empty());
    }

    #[test]
    fn test_match_any_returns_rows_in_volume_order() {
        let (symbols, latest) = scenario();
        let rows = filter_rows(
            &symbols,
            &latest,
            StatusFilter::Oversold,
            &tfs(&["1h", "4h"]),
            MatchMode::Any,
        );
        let names: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(names, ["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    fn test_rows_carry_only_requested_timeframes() {
        let (symbols, latest) = scenario();
        let rows = filter_rows(
            &symbols,
            &latest,
            StatusFilter::Oversold,
            &tfs(&["1h"]),
            MatchMode::All,
        );
        assert_eq!(rows.len(), 2);
        for row in &rows {
            let keys: Vec<&str> = row.timeframes.keys().map(|k| k.as_str()).collect();
            assert_eq!(keys, ["1h"]);
        }
    }

    #[test]
    fn test_missing_cell_fails_all_but_not_any() {
        let (symbols, mut latest) = scenario();
        // ETHUSDT loses its 4h snapshot entirely.
        latest.get_mut("ETHUSDT").unwrap().remove("4h");

        let all = filter_rows(
            &symbols,
            &latest,
            StatusFilter::Both,
            &tfs(&["1h", "4h"]),
            MatchMode::All,
        );
        assert!(all.iter().all(|r| r.symbol != "ETHUSDT"));

        let any = filter_rows(
            &symbols,
            &latest,
            StatusFilter::Both,
            &tfs(&["1h", "4h"]),
            MatchMode::Any,
        );
        assert!(any.iter().any(|r| r.symbol == "ETHUSDT"));
    }

    #[test]
    fn test_all_is_subset_of_any() {
        // Over a spread of k values across two timeframes, every symbol
        // matched under `all` must also match under `any`.
        let ks = [5.0, 15.0, 25.0, 50.0, 79.0, 85.0, 95.0];
        let mut symbols = Vec::new();
        let mut latest: HashMap<String, HashMap<String, IndicatorSnapshot>> = HashMap::new();
        for (i, k1) in ks.iter().enumerate() {
            for (j, k2) in ks.iter().enumerate() {
                let name = format!("S{i}{j}USDT");
                symbols.push(SymbolRow { symbol: name.clone(), volume_24h: 1.0 });
                let per_tf = latest.entry(name.clone()).or_default();
                per_tf.insert("1h".to_string(), snapshot(&name, "1h", *k1));
                per_tf.insert("4h".to_string(), snapshot(&name, "4h", *k2));
            }
        }

        for status in [StatusFilter::Oversold, StatusFilter::Overbought, StatusFilter::Both] {
            let request = tfs(&["1h", "4h"]);
            let all = filter_rows(&symbols, &latest, status, &request, MatchMode::All);
            let any = filter_rows(&symbols, &latest, status, &request, MatchMode::Any);
            for row in &all {
                assert!(
                    any.iter().any(|r| r.symbol == row.symbol),
                    "{} matched all but not any",
                    row.symbol
                );
            }
        }
    }

    #[test]
    fn test_query_parsing_defaults() {
        assert_eq!(StatusFilter::parse(None), StatusFilter::Oversold);
        assert_eq!(StatusFilter::parse(Some("bogus")), StatusFilter::Oversold);
        assert_eq!(StatusFilter::parse(Some("both")), StatusFilter::Both);
        assert_eq!(MatchMode::parse(None), MatchMode::All);
        assert_eq!(MatchMode::parse(Some("any")), MatchMode::Any);

        let defaults = tfs(&["15m", "1h"]);
        assert_eq!(parse_timeframes(None, &defaults), defaults);
        assert_eq!(parse_timeframes(Some(" , "), &defaults), defaults);
        assert_eq!(parse_timeframes(Some("1h, 4h"), &defaults), tfs(&["1h", "4h"]));
    }

    #[tokio::test]
    async fn test_empty_store_yields_defaults_not_error() {
        let store = SnapshotStore::open_in_memory().await.unwrap();
        let defaults = tfs(&["15m", "1h", "4h", "1d"]);

        let response = table_response(&store, &defaults).await.unwrap();
        assert!(response.rows.is_empty());
        assert_eq!(response.timeframes, defaults);
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_table_includes_pending_symbols_with_null_cells() {
        let store = SnapshotStore::open_in_memory().await.unwrap();
        store.upsert_volume("BTCUSDT", 1000.0).await.unwrap();
        store
            .upsert_snapshot(&snapshot("BTCUSDT", "1h", 15.0))
            .await
            .unwrap();
        store.upsert_volume("NEWUSDT", 10.0).await.unwrap();

        let defaults = tfs(&["1h", "4h"]);
        let response = table_response(&store, &defaults).await.unwrap();
        assert_eq!(response.rows.len(), 2);

        let btc = &response.rows[0];
        assert_eq!(btc.symbol, "BTCUSDT");
        assert!(btc.timeframes["1h"].is_some());
        assert!(btc.timeframes["4h"].is_none());

        // Pending symbol: known, volume-ranked, all cells null.
        let pending = &response.rows[1];
        assert_eq!(pending.symbol, "NEWUSDT");
        assert!(pending.timeframes.values().all(Option::is_none));
    }

    #[tokio::test]
    async fn test_filter_response_end_to_end() {
        let store = SnapshotStore::open_in_memory().await.unwrap();
        store.upsert_volume("BTCUSDT", 1000.0).await.unwrap();
        store.upsert_volume("ETHUSDT", 500.0).await.unwrap();
        for sym in ["BTCUSDT", "ETHUSDT"] {
            store.upsert_snapshot(&snapshot(sym, "1h", 15.0)).await.unwrap();
            store.upsert_snapshot(&snapshot(sym, "4h", 25.0)).await.unwrap();
        }

        let defaults = tfs(&["15m", "1h", "4h", "1d"]);
        let query = FilterQuery {
            status: Some("oversold".to_string()),
            timeframes: Some("1h,4h".to_string()),
            match_mode: Some("all".to_string()),
        };
        let all = filter_response(&store, &defaults, &query).await.unwrap();
        assert!(all.rows.is_empty());
        assert_eq!(all.timeframes, tfs(&["1h", "4h"]));

        let query_any = FilterQuery {
            match_mode: Some("any".to_string()),
            ..query
        };
        let any = filter_response(&store, &defaults, &query_any).await.unwrap();
        let names: Vec<&str> = any.rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(names, ["BTCUSDT", "ETHUSDT"]);
    }
}
