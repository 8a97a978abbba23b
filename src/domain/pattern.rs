//! Pattern scorer: moving-average stacking and volatility contraction.

use crate::domain::indicator::sma::trailing_mean;
use crate::domain::ohlcv::OhlcvBar;

pub const VCP_LOOKBACK: usize = 5;
pub const VCP_MIN_BARS: usize = 3;
pub const VCP_MAX_SCORE: u8 = 5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternMetrics {
    pub sma_8: Option<f64>,
    pub sma_21: Option<f64>,
    pub is_ma_stacked: bool,
    pub vcp_score: Option<u8>,
}

pub fn compute_patterns(
    bars: &[OhlcvBar],
    sma_50: Option<f64>,
    sma_200: Option<f64>,
) -> PatternMetrics {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let sma_8 = trailing_mean(&closes, 8);
    let sma_21 = trailing_mean(&closes, 21);
    PatternMetrics {
        sma_8,
        sma_21,
        is_ma_stacked: is_ma_stacked(sma_8, sma_21, sma_50, sma_200),
        vcp_score: vcp_score(bars),
    }
}

/// SMA8 > SMA21 > SMA50 > SMA200, strictly, with all four present.
pub fn is_ma_stacked(
    sma_8: Option<f64>,
    sma_21: Option<f64>,
    sma_50: Option<f64>,
    sma_200: Option<f64>,
) -> bool {
    match (sma_8, sma_21, sma_50, sma_200) {
        (Some(a), Some(b), Some(c), Some(d)) => a > b && b > c && c > d,
        _ => false,
    }
}

/// Count of contracting daily ranges over the last few bars.
pub fn vcp_score(bars: &[OhlcvBar]) -> Option<u8> {
    if bars.len() < VCP_MIN_BARS {
        return None;
    }
    let start = bars.len().saturating_sub(VCP_LOOKBACK);
    let contractions = bars[start..]
        .windows(2)
        .filter(|w| w[1].range() < w[0].range())
        .count();
    Some((contractions as u8).min(VCP_MAX_SCORE))
}
