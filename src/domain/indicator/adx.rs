//! ADX (Average Directional Index) with +DI / -DI.
//!
//! From bar 1 onwards:
//! - up = high - prev_high, down = prev_low - low
//! - +DM = up if up > down and up > 0, else 0 (mirror for -DM)
//! - TR as for ATR
//!
//! TR, +DM and -DM are each Wilder-smoothed over n.
//! +DI = 100 * S(+DM) / S(TR), -DI likewise, DX = 100 * |+DI - -DI| / (+DI + -DI).
//! ADX is the Wilder smoothing of DX, so the first valid value lands at bar 2n - 1.

use serde::{Deserialize, Serialize};

use crate::domain::indicator::wilder::wilder_values;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_PERIOD: usize = 14;
pub const STRONG_TREND: f64 = 25.0;
pub const VERY_STRONG_TREND: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Bullish,
    Bearish,
    Neutral,
}

impl TrendDirection {
    pub fn from_di(plus_di: f64, minus_di: f64) -> Self {
        if plus_di > minus_di {
            TrendDirection::Bullish
        } else if plus_di < minus_di {
            TrendDirection::Bearish
        } else {
            TrendDirection::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Bullish => "bullish",
            TrendDirection::Bearish => "bearish",
            TrendDirection::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdxReading {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
}

pub fn adx_values(bars: &[OhlcvBar], period: usize) -> Vec<Option<AdxReading>> {
    let mut out = vec![None; bars.len()];
    if period == 0 || bars.len() < 2 {
        return out;
    }

    let mut trs = Vec::with_capacity(bars.len() - 1);
    let mut plus_dm = Vec::with_capacity(bars.len() - 1);
    let mut minus_dm = Vec::with_capacity(bars.len() - 1);
    for w in bars.windows(2) {
        let (prev, bar) = (&w[0], &w[1]);
        let up = bar.high - prev.high;
        let down = prev.low - bar.low;
        trs.push(bar.true_range(prev.close));
        plus_dm.push(if up > down && up > 0.0 { up } else { 0.0 });
        minus_dm.push(if down > up && down > 0.0 { down } else { 0.0 });
    }

    let s_tr = wilder_values(&trs, period);
    let s_plus = wilder_values(&plus_dm, period);
    let s_minus = wilder_values(&minus_dm, period);

    // DI pairs for every index where the smoothed inputs exist; j maps to bar j + 1.
    let di: Vec<Option<(f64, f64)>> = (0..trs.len())
        .map(|j| {
            let (tr, p, m) = (s_tr[j]?, s_plus[j]?, s_minus[j]?);
            if tr == 0.0 {
                Some((0.0, 0.0))
            } else {
                Some((100.0 * p / tr, 100.0 * m / tr))
            }
        })
        .collect();

    let first_di = period - 1;
    if first_di >= di.len() {
        return out;
    }
    let dx: Vec<f64> = di[first_di..]
        .iter()
        .flatten()
        .map(|&(p, m)| {
            let sum = p + m;
            if sum == 0.0 {
                0.0
            } else {
                100.0 * (p - m).abs() / sum
            }
        })
        .collect();

    for (k, adx) in wilder_values(&dx, period).into_iter().enumerate() {
        let j = first_di + k;
        if let (Some(adx), Some((plus_di, minus_di))) = (adx, di[j]) {
            out[j + 1] = Some(AdxReading {
                adx,
                plus_di,
                minus_di,
            });
        }
    }
    out
}

pub fn calculate_adx(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let values = bars
        .iter()
        .zip(adx_values(bars, period))
        .map(|(bar, reading)| IndicatorPoint {
            date: bar.date,
            valid: reading.is_some(),
            value: match reading {
                Some(r) => IndicatorValue::Adx {
                    adx: r.adx,
                    plus_di: r.plus_di,
                    minus_di: r.minus_di,
                },
                None => IndicatorValue::Adx {
                    adx: 0.0,
                    plus_di: 0.0,
                    minus_di: 0.0,
                },
            },
        })
        .collect();
    IndicatorSeries {
        indicator_type: IndicatorType::Adx(period),
        values,
    }
}
