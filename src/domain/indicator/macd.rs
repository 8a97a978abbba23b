//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line, seeded from the first valid line values
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: max(fast, slow) - 1 + signal - 1 bars

use serde::{Deserialize, Serialize};

use crate::domain::indicator::ema::ema_values;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

/// Histogram sign change between two consecutive bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacdCross {
    Bullish,
    Bearish,
    None,
}

impl MacdCross {
    pub fn as_str(&self) -> &'static str {
        match self {
            MacdCross::Bullish => "bullish",
            MacdCross::Bearish => "bearish",
            MacdCross::None => "none",
        }
    }
}

pub fn calculate_macd(
    bars: &[OhlcvBar],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
    };
    if bars.is_empty() || fast == 0 || slow == 0 || signal_period == 0 {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ema_fast = ema_values(&closes, fast);
    let ema_slow = ema_values(&closes, slow);

    let line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    let line_start = fast.max(slow) - 1;
    let mut signal: Vec<Option<f64>> = vec![None; bars.len()];
    if line_start < bars.len() {
        let valid_line: Vec<f64> = line[line_start..].iter().flatten().copied().collect();
        for (offset, v) in ema_values(&valid_line, signal_period).into_iter().enumerate() {
            signal[line_start + offset] = v;
        }
    }

    let values = bars
        .iter()
        .zip(line.iter().zip(&signal))
        .map(|(bar, (l, s))| match (l, s) {
            (Some(l), Some(s)) => IndicatorPoint {
                date: bar.date,
                valid: true,
                value: IndicatorValue::Macd {
                    line: *l,
                    signal: *s,
                    histogram: l - s,
                },
            },
            _ => IndicatorPoint {
                date: bar.date,
                valid: false,
                value: IndicatorValue::Macd {
                    line: 0.0,
                    signal: 0.0,
                    histogram: 0.0,
                },
            },
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

pub fn calculate_macd_default(bars: &[OhlcvBar]) -> IndicatorSeries {
    calculate_macd(bars, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}

/// Bullish when the histogram goes from <= 0 to > 0, Bearish from >= 0 to < 0.
pub fn detect_crossover(prev_histogram: f64, histogram: f64) -> MacdCross {
    if prev_histogram <= 0.0 && histogram > 0.0 {
        MacdCross::Bullish
    } else if prev_histogram >= 0.0 && histogram < 0.0 {
        MacdCross::Bearish
    } else {
        MacdCross::None
    }
}

/// Crossover at the final bar, None without two valid histogram values.
pub fn crossover_at_last(series: &IndicatorSeries) -> Option<MacdCross> {
    let n = series.len();
    if n < 2 {
        return None;
    }
    match (series.value_at(n - 2), series.value_at(n - 1)) {
        (
            Some(IndicatorValue::Macd { histogram: prev, .. }),
            Some(IndicatorValue::Macd { histogram: now, .. }),
        ) => Some(detect_crossover(*prev, *now)),
        _ => None,
    }
}
