//! Daily batch: load, compute per symbol in parallel, then the universe-wide
//! barrier stages, then one atomic commit.

use chrono::{Days, NaiveDate};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

use crate::domain::breadth::{self, McClellanState, UniverseSnapshot};
use crate::domain::config_validation::EngineConfig;
use crate::domain::error::{BarrierStage, StagescanError};
use crate::domain::metric_row::{compute_symbol_row, DailyMetricRow, SymbolIdentity};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::relative_strength::apply_relative_strength;
use crate::domain::rrg::{compute_tail, RrgPoint, Timeframe};
use crate::domain::run_report::{RunReport, SymbolStage};
use crate::domain::series::{build_unified_timeline, SymbolHistory};
use crate::domain::universe::{load_histories, resolve_universe};
use crate::ports::data_port::{SectorInfo, SeriesStorePort};
use crate::ports::metric_port::{DateCommit, MetricStorePort};

/// Runs the whole batch for `date` and commits it.
///
/// Per-symbol problems are recorded in the returned report and skipped.
/// A barrier failure aborts the date: nothing is committed, a failed report
/// is recorded and a [`StagescanError::BarrierStage`] is returned.
pub fn run_date(
    series: &dyn SeriesStorePort,
    metrics: &dyn MetricStorePort,
    config: &EngineConfig,
    date: NaiveDate,
) -> Result<RunReport, StagescanError> {
    let symbols = resolve_universe(series, config.symbols.as_deref())?;
    let start = lookback_start(date, config.lookback_days)?;
    info!(%date, symbols = symbols.len(), %start, "starting daily run");

    let mut report = RunReport::new(date, symbols.len());
    let loaded = load_histories(series, &symbols, start, date);
    report.rejected_bars = loaded.rejected_bars;
    report.failures.extend(loaded.failures);
    let histories = loaded.histories;

    let sectors = series.sector_map()?;
    let caps = series.market_caps(date)?;
    let pool = build_pool(config.workers)?;

    let results: Vec<(String, Result<DailyMetricRow, StagescanError>)> = pool.install(|| {
        histories
            .par_iter()
            .map(|h| {
                let identity = identity_for(&h.symbol, &sectors, &caps);
                let row = compute_symbol_row(h, date, identity, config.bb_squeeze_threshold);
                (h.symbol.clone(), row)
            })
            .collect()
    });

    let mut rows = Vec::with_capacity(results.len());
    for (symbol, result) in results {
        match result {
            Ok(row) => rows.push(row),
            Err(StagescanError::NoData { .. }) => {
                debug!(symbol = %symbol, %date, "no bar on run date");
            }
            Err(e @ StagescanError::DataIntegrity { .. }) => {
                warn!(symbol = %symbol, error = %e, "skipping symbol, malformed bar on run date");
                report.record_failure(&symbol, SymbolStage::Integrity, e.to_string());
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "skipping symbol, compute failed");
                report.record_failure(&symbol, SymbolStage::Compute, e.to_string());
            }
        }
    }

    if rows.is_empty() {
        return Err(abort(
            metrics,
            &mut report,
            BarrierStage::Breadth,
            "no symbol has a bar on this date",
        ));
    }

    apply_relative_strength(&mut rows);
    if let Some(reason) = relative_strength_violation(&rows) {
        return Err(abort(metrics, &mut report, BarrierStage::RelativeStrength, &reason));
    }

    let (mcclellan, snapshot) = match compute_breadth(metrics, date, &rows, &histories) {
        Ok(result) => result,
        Err(reason) => return Err(abort(metrics, &mut report, BarrierStage::Breadth, &reason)),
    };

    let rrg_points = match compute_rrg(series, config, date, &pool) {
        Ok(points) => points,
        Err(reason) => return Err(abort(metrics, &mut report, BarrierStage::Rrg, &reason)),
    };

    report.mark_committed(rows.len());
    let commit = DateCommit {
        date,
        rows,
        snapshot,
        mcclellan,
        rrg_points,
        report: report.clone(),
    };
    if let Err(e) = metrics.commit_date(&commit) {
        return Err(abort(metrics, &mut report, BarrierStage::Commit, &e.to_string()));
    }

    info!(
        %date,
        committed = report.committed,
        failures = report.failures.len(),
        rrg_points = commit.rrg_points.len(),
        "date committed"
    );
    Ok(report)
}

fn lookback_start(date: NaiveDate, lookback_days: i64) -> Result<NaiveDate, StagescanError> {
    date.checked_sub_days(Days::new(lookback_days.max(0) as u64))
        .ok_or_else(|| StagescanError::ConfigInvalid {
            section: "engine".into(),
            key: "lookback_days".into(),
            reason: format!("lookback of {} days from {} is out of range", lookback_days, date),
        })
}

fn build_pool(workers: usize) -> Result<rayon::ThreadPool, StagescanError> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if workers > 0 {
        builder = builder.num_threads(workers);
    }
    builder.build().map_err(|e| StagescanError::ConfigInvalid {
        section: "engine".into(),
        key: "workers".into(),
        reason: e.to_string(),
    })
}

fn identity_for(
    symbol: &str,
    sectors: &HashMap<String, SectorInfo>,
    caps: &HashMap<String, f64>,
) -> SymbolIdentity {
    let info = sectors.get(symbol).cloned().unwrap_or_default();
    SymbolIdentity {
        sector: info.sector,
        industry: info.industry,
        market_cap: caps.get(symbol).copied(),
    }
}

fn relative_strength_violation(rows: &[DailyMetricRow]) -> Option<String> {
    rows.iter().find_map(|r| match r.rs_percentile {
        Some(p) if !(0.0..=100.0).contains(&p) => {
            Some(format!("{} has percentile {} outside [0, 100]", r.symbol, p))
        }
        _ => None,
    })
}

fn compute_breadth(
    metrics: &dyn MetricStorePort,
    date: NaiveDate,
    rows: &[DailyMetricRow],
    histories: &[SymbolHistory],
) -> Result<(McClellanState, UniverseSnapshot), String> {
    let (up, down, _) = breadth::advance_decline(rows);
    let prior = metrics
        .mcclellan_state_before(date)
        .map_err(|e| format!("loading prior McClellan state: {}", e))?;
    if prior.is_none() {
        debug!(%date, "no prior McClellan state, replaying loaded history");
    }
    let timeline = build_unified_timeline(histories);
    let mcclellan = breadth::mcclellan_for_date(
        date,
        breadth::rana(up, down),
        prior.as_ref(),
        histories,
        &timeline,
    )?;

    let snapshot = breadth::compute_snapshot(date, rows, &mcclellan);
    let counted = snapshot.up_count + snapshot.down_count + snapshot.unchanged_count;
    if counted != snapshot.total {
        return Err(format!(
            "advance/decline counts {} do not cover {} rows",
            counted, snapshot.total
        ));
    }
    if !snapshot.mcclellan_oscillator.is_finite() || !snapshot.mcclellan_summation.is_finite() {
        return Err("McClellan accumulator is not finite".to_string());
    }
    Ok((mcclellan, snapshot))
}

/// Every configured index against the benchmark, all timeframes.
///
/// Returns `Err` only when indices exist but the benchmark cannot be loaded.
fn compute_rrg(
    series: &dyn SeriesStorePort,
    config: &EngineConfig,
    date: NaiveDate,
    pool: &rayon::ThreadPool,
) -> Result<Vec<RrgPoint>, String> {
    let rrg = &config.rrg;
    if !rrg.enabled {
        debug!("RRG disabled");
        return Ok(Vec::new());
    }
    let indices: Vec<String> = match &rrg.indices {
        Some(list) => list.clone(),
        None => series
            .list_indices()
            .map_err(|e| format!("listing indices: {}", e))?,
    };
    let indices: Vec<String> = indices.into_iter().filter(|i| *i != rrg.benchmark).collect();
    if indices.is_empty() {
        debug!("no indices configured, skipping RRG");
        return Ok(Vec::new());
    }

    let start = lookback_start(date, rrg.lookback_days).map_err(|e| e.to_string())?;
    let benchmark = match series.fetch_index_ohlcv(&rrg.benchmark, start, date) {
        Ok(bars) if !bars.is_empty() => sorted(bars),
        Ok(_) => return Err(format!("benchmark {} has no bars", rrg.benchmark)),
        Err(e) => return Err(format!("benchmark {} missing: {}", rrg.benchmark, e)),
    };

    let mut loaded: Vec<(String, Vec<OhlcvBar>)> = Vec::with_capacity(indices.len());
    for index in indices {
        match series.fetch_index_ohlcv(&index, start, date) {
            Ok(bars) => loaded.push((index, sorted(bars))),
            Err(e) => warn!(index = %index, error = %e, "skipping index, fetch failed"),
        }
    }

    let (benchmark, params) = (&benchmark, &rrg.params);
    let tails: Vec<Vec<RrgPoint>> = pool.install(|| {
        loaded
            .par_iter()
            .flat_map_iter(|(index, bars)| {
                Timeframe::ALL
                    .into_iter()
                    .map(move |tf| compute_tail(index, bars, benchmark, tf, params))
            })
            .collect()
    });

    let mut points = Vec::new();
    for tail in tails {
        points.extend(tail);
    }
    for (index, _) in &loaded {
        for tf in Timeframe::ALL {
            if !points.iter().any(|p| p.index == *index && p.timeframe == tf) {
                warn!(index = %index, timeframe = %tf, "not enough history for an RRG tail");
            }
        }
    }
    Ok(points)
}

fn sorted(mut bars: Vec<OhlcvBar>) -> Vec<OhlcvBar> {
    bars.sort_by_key(|b| b.date);
    bars
}

/// Marks the report failed, records it and builds the error for the caller.
fn abort(
    metrics: &dyn MetricStorePort,
    report: &mut RunReport,
    stage: BarrierStage,
    reason: &str,
) -> StagescanError {
    error!(date = %report.date, %stage, reason, "barrier failed, date not committed");
    report.mark_barrier_failed(stage, reason);
    if let Err(e) = metrics.record_run_report(report) {
        warn!(error = %e, "could not record failed run report");
    }
    StagescanError::BarrierStage {
        stage,
        date: report.date,
        reason: reason.to_string(),
    }
}
