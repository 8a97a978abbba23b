//! Oscillator library: RSI, MACD, Bollinger Bands and ADX evaluated at the
//! last bar of a history window, plus the flags derived from them.

use crate::domain::indicator::adx::{self, TrendDirection, calculate_adx};
use crate::domain::indicator::bollinger::{self, bandwidth_percent, calculate_bollinger};
use crate::domain::indicator::macd::{MacdCross, calculate_macd_default, crossover_at_last};
use crate::domain::indicator::rsi::{self, calculate_rsi};
use crate::domain::indicator::IndicatorValue;
use crate::domain::ohlcv::OhlcvBar;

pub const RSI_PERIOD: usize = 14;
pub const DEFAULT_SQUEEZE_THRESHOLD: f64 = 10.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OscillatorMetrics {
    pub rsi_14: Option<f64>,
    pub is_rsi_oversold: Option<bool>,
    pub is_rsi_overbought: Option<bool>,
    pub macd_line: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub macd_cross: Option<MacdCross>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_bandwidth_percent: Option<f64>,
    pub is_bb_squeeze: Option<bool>,
    pub adx_14: Option<f64>,
    pub plus_di: Option<f64>,
    pub minus_di: Option<f64>,
    pub is_strong_trend: Option<bool>,
    pub is_very_strong_trend: Option<bool>,
    pub trend_direction: Option<TrendDirection>,
}

pub fn compute_oscillators(bars: &[OhlcvBar], squeeze_threshold: f64) -> OscillatorMetrics {
    let mut m = OscillatorMetrics::default();
    if bars.is_empty() {
        return m;
    }

    m.rsi_14 = calculate_rsi(bars, RSI_PERIOD).last_simple();
    m.is_rsi_oversold = m.rsi_14.map(|r| r < rsi::OVERSOLD);
    m.is_rsi_overbought = m.rsi_14.map(|r| r > rsi::OVERBOUGHT);

    let macd = calculate_macd_default(bars);
    if let Some(IndicatorValue::Macd {
        line,
        signal,
        histogram,
    }) = macd.last()
    {
        m.macd_line = Some(*line);
        m.macd_signal = Some(*signal);
        m.macd_histogram = Some(*histogram);
    }
    m.macd_cross = crossover_at_last(&macd);

    let bands = calculate_bollinger(
        bars,
        bollinger::DEFAULT_PERIOD,
        bollinger::DEFAULT_STDDEV_MULT_X100,
    );
    if let Some(IndicatorValue::Bollinger {
        upper,
        middle,
        lower,
    }) = bands.last()
    {
        m.bb_upper = Some(*upper);
        m.bb_middle = Some(*middle);
        m.bb_lower = Some(*lower);
        m.bb_bandwidth_percent = bandwidth_percent(*upper, *middle, *lower);
    }
    m.is_bb_squeeze = m.bb_bandwidth_percent.map(|bw| bw < squeeze_threshold);

    if let Some(IndicatorValue::Adx {
        adx: strength,
        plus_di,
        minus_di,
    }) = calculate_adx(bars, adx::DEFAULT_PERIOD).last()
    {
        m.adx_14 = Some(*strength);
        m.plus_di = Some(*plus_di);
        m.minus_di = Some(*minus_di);
        m.is_strong_trend = Some(*strength > adx::STRONG_TREND);
        m.is_very_strong_trend = Some(*strength > adx::VERY_STRONG_TREND);
        m.trend_direction = Some(TrendDirection::from_di(*plus_di, *minus_di));
    }

    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveDate};

    fn bars_from_closes(closes: &[f64]) -> Vec<OhlcvBar> {
        let start = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                symbol: "OSC".into(),
                date: start + Days::new(i as u64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 500,
            })
            .collect()
    }

    #[test]
    fn short_history_has_no_oscillators() {
        let m = compute_oscillators(&bars_from_closes(&[100.0; 10]), 10.0);
        assert_eq!(m, OscillatorMetrics::default());
    }

    #[test]
    fn steady_rally_sets_trend_flags() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let m = compute_oscillators(&bars_from_closes(&closes), 10.0);

        assert_eq!(m.rsi_14, Some(100.0));
        assert_eq!(m.is_rsi_overbought, Some(true));
        assert_eq!(m.is_rsi_oversold, Some(false));
        assert_eq!(m.trend_direction, Some(TrendDirection::Bullish));
        assert_eq!(m.is_strong_trend, Some(true));
        assert!(m.macd_line.unwrap() > 0.0);
        assert!(m.macd_cross.is_some());
    }

    #[test]
    fn flat_prices_squeeze_the_bands() {
        let m = compute_oscillators(&bars_from_closes(&[50.0; 40]), 10.0);
        assert_eq!(m.bb_bandwidth_percent, Some(0.0));
        assert_eq!(m.is_bb_squeeze, Some(true));
    }

    #[test]
    fn squeeze_respects_threshold() {
        let closes: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 95.0 } else { 105.0 }).collect();
        let bars = bars_from_closes(&closes);
        // bandwidth = 4 * 5 / 100 * 100 = 20%
        assert_eq!(compute_oscillators(&bars, 10.0).is_bb_squeeze, Some(false));
        assert_eq!(compute_oscillators(&bars, 25.0).is_bb_squeeze, Some(true));
    }

    #[test]
    fn readings_match_the_slice_primitives() {
        use crate::domain::indicator::adx::adx_values;
        use crate::domain::indicator::rsi::rsi_values;

        let closes: Vec<f64> = (0..50)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 4.0 + i as f64 * 0.2)
            .collect();
        let bars = bars_from_closes(&closes);
        let m = compute_oscillators(&bars, 10.0);

        assert_eq!(m.rsi_14, rsi_values(&closes, RSI_PERIOD)[49]);
        let reading = adx_values(&bars, adx::DEFAULT_PERIOD)[49].unwrap();
        assert_eq!(m.adx_14, Some(reading.adx));
        assert_eq!(m.plus_di, Some(reading.plus_di));
        assert_eq!(m.minus_di, Some(reading.minus_di));
    }
}
