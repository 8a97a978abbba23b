//! Universe-wide breadth for one date.
//!
//! The snapshot is recomputed in full on every run. The only carried state is
//! the McClellan accumulator, which advances from the latest persisted state
//! before the date or is rebuilt by replaying the loaded history.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::indicator::ema_step;
use crate::domain::metric_row::DailyMetricRow;
use crate::domain::series::SymbolHistory;
use crate::domain::stage::Stage;

pub const MCCLELLAN_FAST: usize = 19;
pub const MCCLELLAN_SLOW: usize = 39;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct McClellanState {
    pub date: NaiveDate,
    pub ema_19: f64,
    pub ema_39: f64,
    pub summation: f64,
}

impl McClellanState {
    pub fn oscillator(&self) -> f64 {
        self.ema_19 - self.ema_39
    }

    /// Advances the accumulator by one date. With no prior state both EMAs
    /// start at `rana` and the summation at zero.
    pub fn advance(prev: Option<&McClellanState>, date: NaiveDate, rana: f64) -> McClellanState {
        match prev {
            Some(p) => {
                let ema_19 = ema_step(p.ema_19, rana, MCCLELLAN_FAST);
                let ema_39 = ema_step(p.ema_39, rana, MCCLELLAN_SLOW);
                McClellanState {
                    date,
                    ema_19,
                    ema_39,
                    summation: p.summation + (ema_19 - ema_39),
                }
            }
            None => McClellanState {
                date,
                ema_19: rana,
                ema_39: rana,
                summation: 0.0,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageBucket {
    pub stage: Stage,
    pub count: usize,
    pub percent: f64,
    pub avg_range_atr_percent: Option<f64>,
    pub tight_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseSnapshot {
    pub date: NaiveDate,
    pub total: usize,
    pub up_count: usize,
    pub down_count: usize,
    pub unchanged_count: usize,
    pub up_down_ratio: Option<f64>,
    pub above_sma20_count: usize,
    pub above_sma50_count: usize,
    pub above_sma200_count: usize,
    pub above_sma20_percent: Option<f64>,
    pub above_sma50_percent: Option<f64>,
    pub above_sma200_percent: Option<f64>,
    pub new_20d_highs: usize,
    pub new_20d_lows: usize,
    pub high_low_ratio: Option<f64>,
    pub rana: f64,
    pub mcclellan_oscillator: f64,
    pub mcclellan_summation: f64,
    pub stage_distribution: Vec<StageBucket>,
}

/// (advances - declines) / (advances + declines), 0 when both are 0.
pub fn rana(advances: usize, declines: usize) -> f64 {
    let total = advances + declines;
    if total == 0 {
        0.0
    } else {
        (advances as f64 - declines as f64) / total as f64
    }
}

fn ratio(num: usize, den: usize) -> Option<f64> {
    if den == 0 {
        None
    } else {
        Some(num as f64 / den as f64)
    }
}

fn percent(num: usize, total: usize) -> Option<f64> {
    ratio(num, total).map(|r| r * 100.0)
}

/// Advance/decline counts for a set of rows. A missing 1-day change counts as
/// unchanged.
pub fn advance_decline(rows: &[DailyMetricRow]) -> (usize, usize, usize) {
    rows.iter().fold((0, 0, 0), |(up, down, flat), r| match r.change_1d_percent {
        Some(c) if c > 0.0 => (up + 1, down, flat),
        Some(c) if c < 0.0 => (up, down + 1, flat),
        _ => (up, down, flat + 1),
    })
}

pub fn compute_snapshot(
    date: NaiveDate,
    rows: &[DailyMetricRow],
    mcclellan: &McClellanState,
) -> UniverseSnapshot {
    let total = rows.len();
    let (up, down, unchanged) = advance_decline(rows);

    let above = |pick: fn(&DailyMetricRow) -> Option<f64>| {
        rows.iter()
            .filter(|r| pick(r).is_some_and(|ma| r.close > ma))
            .count()
    };
    let above_20 = above(|r| r.sma_20);
    let above_50 = above(|r| r.sma_50);
    let above_200 = above(|r| r.sma_200);

    let highs = rows.iter().filter(|r| r.is_new_20d_high == Some(true)).count();
    let lows = rows.iter().filter(|r| r.is_new_20d_low == Some(true)).count();

    UniverseSnapshot {
        date,
        total,
        up_count: up,
        down_count: down,
        unchanged_count: unchanged,
        up_down_ratio: ratio(up, down),
        above_sma20_count: above_20,
        above_sma50_count: above_50,
        above_sma200_count: above_200,
        above_sma20_percent: percent(above_20, total),
        above_sma50_percent: percent(above_50, total),
        above_sma200_percent: percent(above_200, total),
        new_20d_highs: highs,
        new_20d_lows: lows,
        high_low_ratio: ratio(highs, lows),
        rana: rana(up, down),
        mcclellan_oscillator: mcclellan.oscillator(),
        mcclellan_summation: mcclellan.summation,
        stage_distribution: stage_distribution(rows),
    }
}

pub fn stage_distribution(rows: &[DailyMetricRow]) -> Vec<StageBucket> {
    let total = rows.len();
    Stage::ALL
        .iter()
        .map(|&stage| {
            let members: Vec<&DailyMetricRow> = rows.iter().filter(|r| r.stage == stage).collect();
            let ranges: Vec<f64> = members.iter().filter_map(|r| r.range_atr_percent).collect();
            StageBucket {
                stage,
                count: members.len(),
                percent: percent(members.len(), total).unwrap_or(0.0),
                avg_range_atr_percent: if ranges.is_empty() {
                    None
                } else {
                    Some(ranges.iter().sum::<f64>() / ranges.len() as f64)
                },
                tight_count: members.iter().filter(|r| r.is_tight == Some(true)).count(),
            }
        })
        .collect()
}

/// RANA for every date in `timeline`, from close-to-close moves in `histories`.
///
/// A symbol contributes to a date only when it has a bar on that date and one
/// before it.
pub fn rana_series(histories: &[SymbolHistory], timeline: &[NaiveDate]) -> Vec<(NaiveDate, f64)> {
    timeline
        .iter()
        .map(|&date| {
            let (mut adv, mut decl) = (0usize, 0usize);
            for h in histories {
                let Some(i) = h.get_bar_index(date) else {
                    continue;
                };
                if i == 0 {
                    continue;
                }
                let change = h.bars[i].close - h.bars[i - 1].close;
                if change > 0.0 {
                    adv += 1;
                } else if change < 0.0 {
                    decl += 1;
                }
            }
            (date, rana(adv, decl))
        })
        .collect()
}

/// Accumulator for `date`.
///
/// With a `prior` state every loaded date strictly between `prior.date` and
/// `date` is replayed first, so a skipped run does not drop its RANA. Without
/// one, every loaded date before `date` is replayed. Fails when the loaded
/// history does not reach back to `prior.date`.
pub fn mcclellan_for_date(
    date: NaiveDate,
    today_rana: f64,
    prior: Option<&McClellanState>,
    histories: &[SymbolHistory],
    timeline: &[NaiveDate],
) -> Result<McClellanState, String> {
    let after = match prior {
        Some(p) => {
            let covered = timeline.first().is_some_and(|first| *first <= p.date);
            let gap = timeline.iter().any(|d| *d > p.date && *d < date);
            if gap && !covered {
                return Err(format!(
                    "loaded history does not reach the last McClellan state on {}",
                    p.date
                ));
            }
            Some(p.date)
        }
        None => None,
    };
    let missing: Vec<NaiveDate> = timeline
        .iter()
        .copied()
        .filter(|d| *d < date && after.is_none_or(|a| *d > a))
        .collect();
    let replayed = rana_series(histories, &missing)
        .into_iter()
        .fold(prior.copied(), |state, (d, r)| {
            Some(McClellanState::advance(state.as_ref(), d, r))
        });
    Ok(McClellanState::advance(replayed.as_ref(), date, today_rana))
}
