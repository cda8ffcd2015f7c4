//! Sequential update loop.
//!
//! One unit of work (symbol x timeframe) is in flight at a time --
//! deliberately non-parallel to bound memory, CPU and request bursts on
//! constrained hardware. The loop is the sole writer of the snapshot
//! store; every per-unit failure is contained here and never aborts the
//! sweep.

use chrono::Utc;
use tracing::{debug, error, info, warn};

use screener_core::data::candle;
use screener_core::exchange::MarketSource;
use screener_core::indicators::{stoch_rsi, IndicatorError, StochRsiParams};
use shared::{Config, IndicatorSnapshot, SnapshotStore};

/// Outcome of one (symbol, timeframe) unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitOutcome {
    /// Snapshot computed and written through
    Updated,
    /// Not enough history; not a fault
    Skipped,
    /// Fetch or store failure; prior snapshot left untouched
    Failed,
}

/// Per-cycle counters for the summary log line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct Scheduler<M> {
    source: M,
    store: SnapshotStore,
    config: Config,
    params: StochRsiParams,
    test_mode: bool,
}

impl<M: MarketSource> Scheduler<M> {
    pub fn new(source: M, store: SnapshotStore, config: Config, test_mode: bool) -> Self {
        let params = StochRsiParams {
            rsi_period: config.rsi_period,
            stoch_period: config.stoch_period,
            smoothing: config.smoothing,
        };
        Self {
            source,
            store,
            config,
            params,
            test_mode,
        }
    }

    /// Run update cycles until the process is terminated.
    pub async fn run(&self) {
        let mut cycle = 0u64;
        loop {
            cycle += 1;
            info!(cycle, "starting update cycle");
            match self.run_cycle().await {
                Ok(summary) => info!(
                    cycle,
                    updated = summary.updated,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    "cycle complete"
                ),
                Err(e) => error!(cycle, error = %e, "cycle aborted, will retry next interval"),
            }
            tokio::time::sleep(self.config.cycle_interval).await;
        }
    }

    /// One full sweep over timeframes x ranked symbols.
    ///
    /// Only a failed universe refresh aborts the cycle (there is nothing to
    /// sweep); every later failure is contained at its unit.
    pub async fn run_cycle(&self) -> anyhow::Result<CycleSummary> {
        let symbols = self.refresh_universe().await?;
        info!(symbols = symbols.len(), "universe refreshed");

        // Cycle bookkeeping is metadata only; losing it must not stop the
        // sweep.
        let cycle_id = match self.store.begin_cycle().await {
            Ok(id) => Some(id),
            Err(e) => {
                error!(error = %e, "failed to record cycle start");
                None
            }
        };

        let mut summary = CycleSummary::default();
        for timeframe in &self.config.timeframes {
            for symbol in &symbols {
                match self.process_unit(symbol, timeframe).await {
                    UnitOutcome::Updated => summary.updated += 1,
                    UnitOutcome::Skipped => summary.skipped += 1,
                    UnitOutcome::Failed => summary.failed += 1,
                }
                tokio::time::sleep(self.config.request_delay).await;
            }
        }

        if let Some(id) = cycle_id {
            if let Err(e) = self.store.complete_cycle(id).await {
                error!(error = %e, "failed to record cycle completion");
            }
        }

        Ok(summary)
    }

    /// Refresh the tradable universe and its 24h volumes, ranked by volume
    /// descending. In test mode only the highest-volume prefix survives.
    async fn refresh_universe(&self) -> anyhow::Result<Vec<String>> {
        let pairs = self.source.trading_pairs().await?;
        let volumes = self.source.day_volumes().await?;

        let mut ranked: Vec<(String, f64)> = pairs
            .into_iter()
            .map(|p| {
                let volume = volumes.get(&p.symbol).copied().unwrap_or(0.0);
                (p.symbol, volume)
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        if self.test_mode {
            ranked.truncate(self.config.test_symbol_limit);
        }

        for (symbol, volume) in &ranked {
            if let Err(e) = self.store.upsert_volume(symbol, *volume).await {
                error!(symbol, error = %e, "failed to store volume");
            }
        }

        Ok(ranked.into_iter().map(|(s, _)| s).collect())
    }

    /// Fetch, compute and write through one (symbol, timeframe) unit.
    async fn process_unit(&self, symbol: &str, timeframe: &str) -> UnitOutcome {
        let candles = match self
            .source
            .klines(symbol, timeframe, self.config.klines_limit)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                warn!(symbol, timeframe, error = %e, "fetch failed, unit skipped");
                return UnitOutcome::Failed;
            }
        };

        let closes = candle::closes(&candles);
        let value = match stoch_rsi::compute(&closes, &self.params) {
            Ok(v) => v,
            Err(IndicatorError::InsufficientData) => {
                debug!(symbol, timeframe, candles = closes.len(), "insufficient history");
                return UnitOutcome::Skipped;
            }
        };

        let snapshot = IndicatorSnapshot {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            k: value.k,
            d: value.d,
            rsi: value.rsi,
            computed_at: Utc::now(),
        };

        if let Err(e) = self.store.upsert_snapshot(&snapshot).await {
            error!(symbol, timeframe, error = %e, "store write failed, unit skipped");
            return UnitOutcome::Failed;
        }

        debug!(symbol, timeframe, k = value.k, d = value.d, "snapshot updated");
        UnitOutcome::Updated
    }
}
