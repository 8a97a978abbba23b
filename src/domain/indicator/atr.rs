//! ATR (Average True Range).
//!
//! TR[0] = high - low, TR[t] = max(h - l, |h - prev_close|, |l - prev_close|).
//! ATR is the Wilder smoothing of TR. Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::wilder::wilder_values;
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_PERIOD: usize = 14;

pub fn true_ranges(bars: &[OhlcvBar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.range()
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect()
}

pub fn atr_values(bars: &[OhlcvBar], period: usize) -> Vec<Option<f64>> {
    wilder_values(&true_ranges(bars), period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::{Days, NaiveDate};

    fn make_bars(hlc: &[(f64, f64, f64)]) -> Vec<OhlcvBar> {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        hlc.iter()
            .enumerate()
            .map(|(i, &(high, low, close))| OhlcvBar {
                symbol: "TEST".into(),
                date: start + Days::new(i as u64),
                open: close,
                high,
                low,
                close,
                volume: 1000,
            })
            .collect()
    }

    fn reference_bars() -> Vec<OhlcvBar> {
        let highs = [
            48.70, 48.72, 48.90, 48.87, 48.82, 49.05, 49.20, 49.35, 49.92, 50.19, 50.12, 49.66,
            49.88, 50.19, 50.36, 50.57, 50.65, 50.43,
        ];
        let lows = [
            47.79, 48.14, 48.39, 48.37, 48.24, 48.64, 48.94, 48.86, 49.50, 49.87, 49.20, 48.90,
            49.43, 49.73, 49.26, 50.09, 50.30, 49.21,
        ];
        let closes = [
            48.16, 48.61, 48.75, 48.63, 48.74, 49.03, 49.07, 49.32, 49.91, 50.13, 49.53, 49.50,
            49.75, 50.03, 50.31, 50.52, 50.41, 49.34,
        ];
        let hlc: Vec<(f64, f64, f64)> = (0..highs.len())
            .map(|i| (highs[i], lows[i], closes[i]))
            .collect();
        make_bars(&hlc)
    }

    #[test]
    fn first_true_range_is_high_minus_low() {
        let bars = make_bars(&[(110.0, 100.0, 105.0), (120.0, 112.0, 118.0)]);
        let tr = true_ranges(&bars);
        assert_abs_diff_eq!(tr[0], 10.0, epsilon = 1e-12);
        // gap up: |120 - 105| = 15 beats 8
        assert_abs_diff_eq!(tr[1], 15.0, epsilon = 1e-12);
    }

    #[test]
    fn atr_wilder_reference_values() {
        let out = atr_values(&reference_bars(), 14);
        assert!(out[12].is_none());
        assert_abs_diff_eq!(out[13].unwrap(), 0.554286, epsilon = 1e-5);
        assert_abs_diff_eq!(out[14].unwrap(), 0.593265, epsilon = 1e-5);
        assert_abs_diff_eq!(out[17].unwrap(), 0.614921, epsilon = 1e-5);
    }

    #[test]
    fn atr_too_few_bars() {
        let bars = make_bars(&[(11.0, 9.0, 10.0); 5]);
        assert!(atr_values(&bars, 14).iter().all(Option::is_none));
    }
}
