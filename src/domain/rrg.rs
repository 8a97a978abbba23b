//! Relative Rotation Graph points for indices against a benchmark.
//!
//! Per timeframe:
//! - ratio = index / benchmark * 100, smoothed with EMA(smoothing)
//! - RS-Ratio = 100 + z(smoothed ratio) over the trailing window
//! - RS-Momentum = 101 + z(1-period % change of RS-Ratio) over the trailing window
//!
//! z uses the population standard deviation and is 0 on a flat window.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::indicator::ema_values;
use crate::domain::indicator::stddev::mean_and_stddev;
use crate::domain::ohlcv::OhlcvBar;

pub const RATIO_CENTER: f64 = 100.0;
pub const MOMENTUM_CENTER: f64 = 101.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    Daily,
    Weekly,
    Monthly,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::Daily, Timeframe::Weekly, Timeframe::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Daily => "daily",
            Timeframe::Weekly => "weekly",
            Timeframe::Monthly => "monthly",
        }
    }

    /// Bucket key: a bar is kept only when it is the last one of its bucket.
    fn bucket(&self, date: NaiveDate) -> (i32, u32) {
        match self {
            Timeframe::Daily => (date.year(), date.ordinal()),
            Timeframe::Weekly => {
                let week = date.iso_week();
                (week.year(), week.week())
            }
            Timeframe::Monthly => (date.year(), date.month()),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "d" => Ok(Timeframe::Daily),
            "weekly" | "w" => Ok(Timeframe::Weekly),
            "monthly" | "m" => Ok(Timeframe::Monthly),
            other => Err(format!("unknown timeframe '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quadrant {
    Leading,
    Weakening,
    Lagging,
    Improving,
}

impl Quadrant {
    pub fn classify(rs_ratio: f64, rs_momentum: f64) -> Quadrant {
        match (rs_ratio > RATIO_CENTER, rs_momentum > MOMENTUM_CENTER) {
            (true, true) => Quadrant::Leading,
            (true, false) => Quadrant::Weakening,
            (false, false) => Quadrant::Lagging,
            (false, true) => Quadrant::Improving,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quadrant::Leading => "leading",
            Quadrant::Weakening => "weakening",
            Quadrant::Lagging => "lagging",
            Quadrant::Improving => "improving",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RrgPoint {
    pub index: String,
    pub timeframe: Timeframe,
    pub date: NaiveDate,
    pub rs_ratio: f64,
    pub rs_momentum: f64,
    pub quadrant: Quadrant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RrgParams {
    pub window: usize,
    pub smoothing: usize,
    pub tail_daily: usize,
    pub tail_weekly: usize,
    pub tail_monthly: usize,
}

impl Default for RrgParams {
    fn default() -> Self {
        Self {
            window: 14,
            smoothing: 10,
            tail_daily: 15,
            tail_weekly: 12,
            tail_monthly: 6,
        }
    }
}

impl RrgParams {
    pub fn tail_length(&self, timeframe: Timeframe) -> usize {
        match timeframe {
            Timeframe::Daily => self.tail_daily,
            Timeframe::Weekly => self.tail_weekly,
            Timeframe::Monthly => self.tail_monthly,
        }
    }
}

/// (date, index close, benchmark close) on dates both series share.
pub fn align(index: &[OhlcvBar], benchmark: &[OhlcvBar]) -> Vec<(NaiveDate, f64, f64)> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < index.len() && j < benchmark.len() {
        match index[i].date.cmp(&benchmark[j].date) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push((index[i].date, index[i].close, benchmark[j].close));
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Keeps the last observation of each timeframe bucket.
pub fn resample<T: Copy>(points: &[(NaiveDate, T)], timeframe: Timeframe) -> Vec<(NaiveDate, T)> {
    let mut out: Vec<(NaiveDate, T)> = Vec::new();
    for &(date, v) in points {
        match out.last_mut() {
            Some(last) if timeframe.bucket(last.0) == timeframe.bucket(date) => *last = (date, v),
            _ => out.push((date, v)),
        }
    }
    out
}

/// z-score of each value against the trailing `window` values ending at it.
/// None unless the whole window is present.
pub fn zscore_values(inputs: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..inputs.len())
        .map(|i| {
            if window == 0 || i + 1 < window {
                return None;
            }
            let slice: Option<Vec<f64>> = inputs[i + 1 - window..=i].iter().copied().collect();
            let slice = slice?;
            let (mean, sd) = mean_and_stddev(&slice);
            let x = inputs[i]?;
            Some(if sd == 0.0 { 0.0 } else { (x - mean) / sd })
        })
        .collect()
}

/// The full RS-Ratio / RS-Momentum series for pre-aligned (date, ratio) points.
pub fn rrg_series(ratios: &[(NaiveDate, f64)], params: &RrgParams) -> Vec<(NaiveDate, f64, f64)> {
    let values: Vec<f64> = ratios.iter().map(|p| p.1).collect();
    let smoothed = ema_values(&values, params.smoothing);
    let rs_ratio: Vec<Option<f64>> = zscore_values(&smoothed, params.window)
        .into_iter()
        .map(|z| z.map(|z| RATIO_CENTER + z))
        .collect();

    let roc: Vec<Option<f64>> = (0..rs_ratio.len())
        .map(|i| {
            if i == 0 {
                return None;
            }
            let (prev, now) = (rs_ratio[i - 1]?, rs_ratio[i]?);
            if prev == 0.0 {
                None
            } else {
                Some((now - prev) / prev * 100.0)
            }
        })
        .collect();
    let rs_momentum = zscore_values(&roc, params.window);

    ratios
        .iter()
        .zip(rs_ratio.iter().zip(&rs_momentum))
        .filter_map(|((date, _), (r, m))| Some((*date, (*r)?, MOMENTUM_CENTER + (*m)?)))
        .collect()
}

/// Tail of RRG points for one index and timeframe, ending at the last shared date.
pub fn compute_tail(
    index_name: &str,
    index: &[OhlcvBar],
    benchmark: &[OhlcvBar],
    timeframe: Timeframe,
    params: &RrgParams,
) -> Vec<RrgPoint> {
    let ratios: Vec<(NaiveDate, f64)> = align(index, benchmark)
        .into_iter()
        .filter(|(_, _, b)| *b != 0.0)
        .map(|(d, i, b)| (d, i / b * 100.0))
        .collect();
    let ratios = resample(&ratios, timeframe);
    let series = rrg_series(&ratios, params);

    let tail = params.tail_length(timeframe);
    let start = series.len().saturating_sub(tail);
    series[start..]
        .iter()
        .map(|&(date, rs_ratio, rs_momentum)| RrgPoint {
            index: index_name.to_string(),
            timeframe,
            date,
            rs_ratio,
            rs_momentum,
            quadrant: Quadrant::classify(rs_ratio, rs_momentum),
        })
        .collect()
}
