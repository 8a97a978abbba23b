//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters
//! - `IndicatorSeries`: A time series of indicator values, aligned 1:1 with its bars
//!
//! The slice-level primitives (`ema_values`, `wilder_values`) return
//! `Vec<Option<f64>>` so callers outside bar series (RRG ratios, rolling
//! metrics) can reuse the same arithmetic.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod roc;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod wilder;

pub use ema::{ema_step, ema_values};
pub use wilder::wilder_values;

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
    Adx {
        adx: f64,
        plus_di: f64,
        minus_di: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Rsi(usize),
    Adx(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Builds a `Simple` series from per-bar optional values.
    pub fn from_options(
        indicator_type: IndicatorType,
        dates: impl Iterator<Item = NaiveDate>,
        values: &[Option<f64>],
    ) -> Self {
        let values = dates
            .zip(values.iter())
            .map(|(date, v)| IndicatorPoint {
                date,
                valid: v.is_some(),
                value: IndicatorValue::Simple(v.unwrap_or(0.0)),
            })
            .collect();
        Self {
            indicator_type,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The value at `index` if that point is past warmup.
    pub fn value_at(&self, index: usize) -> Option<&IndicatorValue> {
        self.values
            .get(index)
            .filter(|p| p.valid)
            .map(|p| &p.value)
    }

    pub fn simple_at(&self, index: usize) -> Option<f64> {
        match self.value_at(index) {
            Some(IndicatorValue::Simple(v)) => Some(*v),
            _ => None,
        }
    }

    /// The final point's value if valid.
    pub fn last(&self) -> Option<&IndicatorValue> {
        self.values.len().checked_sub(1).and_then(|i| self.value_at(i))
    }

    pub fn last_simple(&self) -> Option<f64> {
        self.values.len().checked_sub(1).and_then(|i| self.simple_at(i))
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Adx(period) => write!(f, "ADX({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn indicator_type_display_rsi() {
        assert_eq!(IndicatorType::Rsi(14).to_string(), "RSI(14)");
    }

    #[test]
    fn indicator_type_display_macd() {
        let macd = IndicatorType::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        };
        assert_eq!(macd.to_string(), "MACD(12,26,9)");
    }

    #[test]
    fn indicator_type_display_bollinger() {
        let boll = IndicatorType::Bollinger {
            period: 20,
            stddev_mult_x100: 200,
        };
        assert_eq!(boll.to_string(), "BOLLINGER(20,2)");
    }

    #[test]
    fn from_options_marks_none_invalid() {
        let series = IndicatorSeries::from_options(
            IndicatorType::Rsi(2),
            (1..=3).map(day),
            &[None, Some(1.5), Some(2.5)],
        );
        assert_eq!(series.len(), 3);
        assert_eq!(series.simple_at(0), None);
        assert_eq!(series.simple_at(1), Some(1.5));
        assert_eq!(series.last_simple(), Some(2.5));
    }

    #[test]
    fn last_on_empty_series_is_none() {
        let series = IndicatorSeries {
            indicator_type: IndicatorType::Adx(10),
            values: Vec::new(),
        };
        assert!(series.is_empty());
        assert!(series.last().is_none());
        assert!(series.last_simple().is_none());
    }
}
