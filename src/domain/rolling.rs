//! Rolling metric calculator.
//!
//! Everything here is a function of one symbol's history window ending at the
//! target date (the last bar). A metric whose window is not covered is `None`.

use crate::domain::indicator::atr::{self, atr_values};
use crate::domain::indicator::ema_values;
use crate::domain::indicator::roc::trailing_change_percent;
use crate::domain::indicator::sma::trailing_mean;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::stage::atr_extension;

pub const ADR_PERIOD: usize = 20;
pub const VOLUME_AVG_PERIOD: usize = 50;
pub const DARVAS_PERIOD: usize = 20;
pub const NEW_EXTREME_PERIOD: usize = 20;
pub const VOLUME_SURGE_RVOL: f64 = 1.5;

/// Bars back for the 1d / 1w / 1m / 3m / 6m changes.
pub const CHANGE_PERIODS: [usize; 5] = [1, 5, 21, 63, 126];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceChanges {
    pub change_1d_percent: Option<f64>,
    pub change_1d_value: Option<f64>,
    pub change_1w_percent: Option<f64>,
    pub change_1m_percent: Option<f64>,
    pub change_3m_percent: Option<f64>,
    pub change_6m_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DarvasBox {
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub position_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollingMetrics {
    pub changes: PriceChanges,
    pub ema_10: Option<f64>,
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_100: Option<f64>,
    pub sma_200: Option<f64>,
    pub distance_from_ema10_percent: Option<f64>,
    pub distance_from_sma50_percent: Option<f64>,
    pub distance_from_sma200_percent: Option<f64>,
    pub atr_14: Option<f64>,
    pub atr_percent: Option<f64>,
    pub adr_percent: Option<f64>,
    pub today_range_percent: Option<f64>,
    pub volume_50d_avg: Option<f64>,
    pub rvol: Option<f64>,
    pub is_volume_surge: Option<bool>,
    pub darvas: DarvasBox,
    pub is_new_20d_high: Option<bool>,
    pub is_new_20d_low: Option<bool>,
    pub atr_extension_from_sma50: Option<f64>,
}

pub fn compute_rolling(bars: &[OhlcvBar]) -> RollingMetrics {
    let Some(today) = bars.last() else {
        return RollingMetrics::default();
    };
    let close = today.close;
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    let ema_10 = ema_values(&closes, 10).last().copied().flatten();
    let sma_20 = trailing_mean(&closes, 20);
    let sma_50 = trailing_mean(&closes, 50);
    let sma_100 = trailing_mean(&closes, 100);
    let sma_200 = trailing_mean(&closes, 200);
    let atr_14 = atr_values(bars, atr::DEFAULT_PERIOD).last().copied().flatten();

    let volume_50d_avg = preceding_volume_mean(bars, VOLUME_AVG_PERIOD);
    let rvol = volume_50d_avg.and_then(|avg| {
        if avg == 0.0 {
            None
        } else {
            Some(today.volume as f64 / avg)
        }
    });
    let (is_new_20d_high, is_new_20d_low) = new_extremes(bars, NEW_EXTREME_PERIOD);

    RollingMetrics {
        changes: price_changes(&closes),
        ema_10,
        sma_20,
        sma_50,
        sma_100,
        sma_200,
        distance_from_ema10_percent: distance_percent(close, ema_10),
        distance_from_sma50_percent: distance_percent(close, sma_50),
        distance_from_sma200_percent: distance_percent(close, sma_200),
        atr_14,
        atr_percent: atr_14.map(|atr| atr / close * 100.0),
        adr_percent: adr_percent(bars, ADR_PERIOD),
        today_range_percent: Some(today.range() / close * 100.0),
        volume_50d_avg,
        rvol,
        is_volume_surge: rvol.map(|r| r >= VOLUME_SURGE_RVOL),
        darvas: darvas_box(bars, DARVAS_PERIOD),
        is_new_20d_high,
        is_new_20d_low,
        atr_extension_from_sma50: atr_extension(close, sma_50, atr_14),
    }
}

pub fn price_changes(closes: &[f64]) -> PriceChanges {
    let [d1, w1, m1, m3, m6] = CHANGE_PERIODS.map(|p| trailing_change_percent(closes, p));
    let change_1d_value = match closes {
        [.., prev, last] => Some(last - prev),
        _ => None,
    };
    PriceChanges {
        change_1d_percent: d1,
        change_1d_value,
        change_1w_percent: w1,
        change_1m_percent: m1,
        change_3m_percent: m3,
        change_6m_percent: m6,
    }
}

fn distance_percent(close: f64, ma: Option<f64>) -> Option<f64> {
    let ma = ma?;
    if ma == 0.0 {
        None
    } else {
        Some((close - ma) / ma * 100.0)
    }
}

/// Mean of (high - low) / close * 100 over the last `period` bars.
pub fn adr_percent(bars: &[OhlcvBar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period {
        return None;
    }
    let window = &bars[bars.len() - period..];
    let sum: f64 = window.iter().map(|b| b.range() / b.close * 100.0).sum();
    Some(sum / period as f64)
}

/// Mean volume of the `period` bars before the last one.
pub fn preceding_volume_mean(bars: &[OhlcvBar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period + 1 {
        return None;
    }
    let end = bars.len() - 1;
    let total: i64 = bars[end - period..end].iter().map(|b| b.volume).sum();
    Some(total as f64 / period as f64)
}

/// Highest high and lowest low of the trailing `period` bars, including today.
pub fn darvas_box(bars: &[OhlcvBar], period: usize) -> DarvasBox {
    if period == 0 || bars.len() < period {
        return DarvasBox::default();
    }
    let window = &bars[bars.len() - period..];
    let high = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let low = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
    let height = high - low;
    let close = bars[bars.len() - 1].close;
    DarvasBox {
        high: Some(high),
        low: Some(low),
        position_percent: if height > 0.0 {
            Some((close - low) / height * 100.0)
        } else {
            None
        },
    }
}

/// Whether today's high/low reaches the extreme of the `period` bars before it.
pub fn new_extremes(bars: &[OhlcvBar], period: usize) -> (Option<bool>, Option<bool>) {
    if period == 0 || bars.len() < period + 1 {
        return (None, None);
    }
    let end = bars.len() - 1;
    let prior = &bars[end - period..end];
    let prior_high = prior.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let prior_low = prior.iter().map(|b| b.low).fold(f64::MAX, f64::min);
    let today = &bars[end];
    (Some(today.high >= prior_high), Some(today.low <= prior_low))
}
