//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) bars are invalid.

use crate::domain::indicator::stddev::mean_and_stddev;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_STDDEV_MULT_X100: u32 = 200;

pub fn calculate_bollinger(
    bars: &[OhlcvBar],
    period: usize,
    stddev_mult_x100: u32,
) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());
    let mult = stddev_mult_x100 as f64 / 100.0;

    for i in 0..bars.len() {
        let date = bars[i].date;
        let valid = period > 0 && i + 1 >= period;

        let (upper, middle, lower) = if valid {
            let window: Vec<f64> = bars[i + 1 - period..=i].iter().map(|b| b.close).collect();
            let (middle, stddev) = mean_and_stddev(&window);
            (middle + mult * stddev, middle, middle - mult * stddev)
        } else {
            (0.0, 0.0, 0.0)
        };

        values.push(IndicatorPoint {
            date,
            valid,
            value: IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            },
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        },
        values,
    }
}

/// Band width relative to the middle band, in percent. None when middle is 0.
pub fn bandwidth_percent(upper: f64, middle: f64, lower: f64) -> Option<f64> {
    if middle == 0.0 {
        None
    } else {
        Some((upper - lower) / middle * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bars(prices: &[f64]) -> Vec<OhlcvBar> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                symbol: "TEST".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, (i + 1) as u32).unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000,
            })
            .collect()
    }

    #[test]
    fn bollinger_warmup() {
        let bars = make_bars(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let series = calculate_bollinger(&bars, 3, 200);

        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
        assert!(series.values[3].valid);
        assert!(series.values[4].valid);
    }

    #[test]
    fn bollinger_constant_values() {
        let bars = make_bars(&[100.0, 100.0, 100.0, 100.0, 100.0]);
        let series = calculate_bollinger(&bars, 3, 200);

        if let Some(IndicatorValue::Bollinger {
            upper,
            middle,
            lower,
        }) = series.value_at(2)
        {
            assert!((middle - 100.0).abs() < f64::EPSILON);
            assert!((upper - 100.0).abs() < f64::EPSILON);
            assert!((lower - 100.0).abs() < f64::EPSILON);
            assert_eq!(bandwidth_percent(*upper, *middle, *lower), Some(0.0));
        } else {
            panic!("Expected Bollinger value");
        }
    }

    #[test]
    fn bollinger_basic_calculation() {
        let bars = make_bars(&[10.0, 20.0, 30.0]);
        let series = calculate_bollinger(&bars, 3, 200);

        if let Some(IndicatorValue::Bollinger {
            upper,
            middle,
            lower,
        }) = series.value_at(2)
        {
            let expected_middle: f64 = 20.0;
            let stddev = (200.0_f64 / 3.0).sqrt();

            assert!((middle - expected_middle).abs() < 1e-10);
            assert!((upper - (expected_middle + 2.0 * stddev)).abs() < 1e-10);
            assert!((lower - (expected_middle - 2.0 * stddev)).abs() < 1e-10);
        } else {
            panic!("Expected Bollinger value");
        }
    }

    #[test]
    fn bollinger_multiplier_variations() {
        let bars = make_bars(&[10.0, 20.0, 30.0]);
        let series = calculate_bollinger(&bars, 3, 100);

        if let Some(IndicatorValue::Bollinger { upper, lower, .. }) = series.value_at(2) {
            let stddev = (200.0_f64 / 3.0).sqrt();
            assert!((upper - (20.0 + stddev)).abs() < 1e-10);
            assert!((lower - (20.0 - stddev)).abs() < 1e-10);
        } else {
            panic!("Expected Bollinger value");
        }
    }

    #[test]
    fn bollinger_indicator_type() {
        let bars = make_bars(&[10.0, 20.0, 30.0]);
        let series = calculate_bollinger(&bars, 20, 200);

        assert_eq!(
            series.indicator_type,
            IndicatorType::Bollinger {
                period: 20,
                stddev_mult_x100: 200
            }
        );
        assert!(series.last().is_none());
    }

    #[test]
    fn bandwidth_of_known_bands() {
        assert_eq!(bandwidth_percent(110.0, 100.0, 90.0), Some(20.0));
        assert_eq!(bandwidth_percent(1.0, 0.0, -1.0), None);
    }
}
