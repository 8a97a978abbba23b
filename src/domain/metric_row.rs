//! The per-(symbol, date) metric row and its per-symbol assembly.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::error::StagescanError;
use crate::domain::indicator::adx::TrendDirection;
use crate::domain::indicator::macd::MacdCross;
use crate::domain::oscillator::compute_oscillators;
use crate::domain::pattern::compute_patterns;
use crate::domain::rolling::compute_rolling;
use crate::domain::series::SymbolHistory;
use crate::domain::stage::{self, Stage, StageInputs};

/// Sector/industry/market-cap attached to a row. All optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolIdentity {
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyMetricRow {
    pub symbol: String,
    pub date: NaiveDate,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,

    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub is_green_candle: bool,

    pub change_1d_percent: Option<f64>,
    pub change_1d_value: Option<f64>,
    pub change_1w_percent: Option<f64>,
    pub change_1m_percent: Option<f64>,
    pub change_3m_percent: Option<f64>,
    pub change_6m_percent: Option<f64>,

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
    pub darvas_high: Option<f64>,
    pub darvas_low: Option<f64>,
    pub darvas_position_percent: Option<f64>,
    pub is_new_20d_high: Option<bool>,
    pub is_new_20d_low: Option<bool>,
    pub atr_extension_from_sma50: Option<f64>,

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

    pub sma_8: Option<f64>,
    pub sma_21: Option<f64>,
    pub is_ma_stacked: bool,
    pub vcp_score: Option<u8>,

    pub stage: Stage,
    pub range_atr_percent: Option<f64>,
    pub is_tight: Option<bool>,

    pub rs_percentile: Option<f64>,
    pub vars_score: Option<f64>,
    pub varw_score: Option<f64>,
}

/// Computes every per-symbol field of the row for `date`.
///
/// Relative-strength fields are left `None`; they are filled after the barrier
/// once the whole universe is known.
pub fn compute_symbol_row(
    history: &SymbolHistory,
    date: NaiveDate,
    identity: SymbolIdentity,
    squeeze_threshold: f64,
) -> Result<DailyMetricRow, StagescanError> {
    if let Some(reason) = history.rejection_on(date) {
        return Err(StagescanError::DataIntegrity {
            symbol: history.symbol.clone(),
            date,
            reason: reason.to_string(),
        });
    }
    let bars = history
        .window_ending(date)
        .ok_or_else(|| StagescanError::NoData {
            symbol: history.symbol.clone(),
        })?;
    let today = bars.last().ok_or_else(|| StagescanError::NoData {
        symbol: history.symbol.clone(),
    })?;

    let rolling = compute_rolling(bars);
    let osc = compute_oscillators(bars, squeeze_threshold);
    let pattern = compute_patterns(bars, rolling.sma_50, rolling.sma_200);

    let stage = stage::classify(&StageInputs {
        close: today.close,
        ema_10: rolling.ema_10,
        sma_20: rolling.sma_20,
        sma_50: rolling.sma_50,
        sma_200: rolling.sma_200,
        atr_14: rolling.atr_14,
        darvas_position_percent: rolling.darvas.position_percent,
    });
    let range_atr_percent = stage::range_atr_percent(today.high, today.low, rolling.atr_14);

    let row = DailyMetricRow {
        symbol: history.symbol.clone(),
        date,
        sector: identity.sector,
        industry: identity.industry,
        market_cap: identity.market_cap,

        open: today.open,
        high: today.high,
        low: today.low,
        close: today.close,
        volume: today.volume,
        is_green_candle: today.is_green(),

        change_1d_percent: rolling.changes.change_1d_percent,
        change_1d_value: rolling.changes.change_1d_value,
        change_1w_percent: rolling.changes.change_1w_percent,
        change_1m_percent: rolling.changes.change_1m_percent,
        change_3m_percent: rolling.changes.change_3m_percent,
        change_6m_percent: rolling.changes.change_6m_percent,

        ema_10: rolling.ema_10,
        sma_20: rolling.sma_20,
        sma_50: rolling.sma_50,
        sma_100: rolling.sma_100,
        sma_200: rolling.sma_200,
        distance_from_ema10_percent: rolling.distance_from_ema10_percent,
        distance_from_sma50_percent: rolling.distance_from_sma50_percent,
        distance_from_sma200_percent: rolling.distance_from_sma200_percent,
        atr_14: rolling.atr_14,
        atr_percent: rolling.atr_percent,
        adr_percent: rolling.adr_percent,
        today_range_percent: rolling.today_range_percent,
        volume_50d_avg: rolling.volume_50d_avg,
        rvol: rolling.rvol,
        is_volume_surge: rolling.is_volume_surge,
        darvas_high: rolling.darvas.high,
        darvas_low: rolling.darvas.low,
        darvas_position_percent: rolling.darvas.position_percent,
        is_new_20d_high: rolling.is_new_20d_high,
        is_new_20d_low: rolling.is_new_20d_low,
        atr_extension_from_sma50: rolling.atr_extension_from_sma50,

        rsi_14: osc.rsi_14,
        is_rsi_oversold: osc.is_rsi_oversold,
        is_rsi_overbought: osc.is_rsi_overbought,
        macd_line: osc.macd_line,
        macd_signal: osc.macd_signal,
        macd_histogram: osc.macd_histogram,
        macd_cross: osc.macd_cross,
        bb_upper: osc.bb_upper,
        bb_middle: osc.bb_middle,
        bb_lower: osc.bb_lower,
        bb_bandwidth_percent: osc.bb_bandwidth_percent,
        is_bb_squeeze: osc.is_bb_squeeze,
        adx_14: osc.adx_14,
        plus_di: osc.plus_di,
        minus_di: osc.minus_di,
        is_strong_trend: osc.is_strong_trend,
        is_very_strong_trend: osc.is_very_strong_trend,
        trend_direction: osc.trend_direction,

        sma_8: pattern.sma_8,
        sma_21: pattern.sma_21,
        is_ma_stacked: pattern.is_ma_stacked,
        vcp_score: pattern.vcp_score,

        stage,
        range_atr_percent,
        is_tight: stage::is_tight(range_atr_percent),

        rs_percentile: None,
        vars_score: None,
        varw_score: None,
    };

    check_finite(&row)?;
    Ok(row)
}

/// Rejects rows carrying NaN or infinite values in their computed fields.
fn check_finite(row: &DailyMetricRow) -> Result<(), StagescanError> {
    let fields = [
        ("change_1d_percent", row.change_1d_percent),
        ("change_1m_percent", row.change_1m_percent),
        ("ema_10", row.ema_10),
        ("sma_200", row.sma_200),
        ("atr_14", row.atr_14),
        ("rvol", row.rvol),
        ("rsi_14", row.rsi_14),
        ("macd_line", row.macd_line),
        ("bb_bandwidth_percent", row.bb_bandwidth_percent),
        ("adx_14", row.adx_14),
    ];
    for (name, value) in fields {
        if let Some(v) = value {
            if !v.is_finite() {
                return Err(StagescanError::SymbolCompute {
                    symbol: row.symbol.clone(),
                    reason: format!("{} is not finite", name),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use chrono::Days;

    fn history(n: usize) -> SymbolHistory {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let bars = (0..n)
            .map(|i| {
                let c = 100.0 + i as f64 * 0.5;
                OhlcvBar {
                    symbol: "ROW".into(),
                    date: start + Days::new(i as u64),
                    open: c - 0.25,
                    high: c + 1.0,
                    low: c - 1.0,
                    close: c,
                    volume: 10_000,
                }
            })
            .collect();
        SymbolHistory::new("ROW".into(), bars)
    }

    #[test]
    fn full_history_row_has_every_rolling_field() {
        let h = history(260);
        let date = h.bars[259].date;
        let row = compute_symbol_row(&h, date, SymbolIdentity::default(), 10.0).unwrap();

        assert_eq!(row.symbol, "ROW");
        assert!(row.is_green_candle);
        assert!(row.sma_200.is_some());
        assert!(row.change_6m_percent.is_some());
        assert!(row.adx_14.is_some());
        assert!(row.rs_percentile.is_none());
        assert_eq!(row.stage.major(), 2);
    }

    #[test]
    fn row_for_earlier_date_ignores_later_bars() {
        let h = history(260);
        let date = h.bars[100].date;
        let row = compute_symbol_row(&h, date, SymbolIdentity::default(), 10.0).unwrap();
        assert_eq!(row.close, h.bars[100].close);
        assert!(row.sma_200.is_none());
        assert_eq!(row.stage, Stage::Basing);
    }

    #[test]
    fn missing_date_is_no_data() {
        let h = history(30);
        let date = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let err = compute_symbol_row(&h, date, SymbolIdentity::default(), 10.0).unwrap_err();
        assert!(matches!(err, StagescanError::NoData { .. }));
    }

    #[test]
    fn malformed_bar_on_date_is_integrity_error() {
        let h = history(30);
        let mut bars = h.bars.clone();
        bars[29].high = bars[29].low - 1.0;
        let date = bars[29].date;
        let h = SymbolHistory::new("ROW".into(), bars);

        let err = compute_symbol_row(&h, date, SymbolIdentity::default(), 10.0).unwrap_err();
        match err {
            StagescanError::DataIntegrity { symbol, reason, .. } => {
                assert_eq!(symbol, "ROW");
                assert_eq!(reason, "high below low");
            }
            other => panic!("expected DataIntegrity, got {other:?}"),
        }
    }

    #[test]
    fn identity_is_carried_through() {
        let h = history(5);
        let identity = SymbolIdentity {
            sector: Some("Energy".into()),
            industry: Some("Refineries".into()),
            market_cap: Some(1.5e12),
        };
        let row = compute_symbol_row(&h, h.bars[4].date, identity, 10.0).unwrap();
        assert_eq!(row.sector.as_deref(), Some("Energy"));
        assert_eq!(row.market_cap, Some(1.5e12));
    }
}
