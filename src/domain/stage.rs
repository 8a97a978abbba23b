//! Weinstein-style stage classification.
//!
//! A pure function of one row's inputs. Guards are evaluated in order and the
//! first match wins, so every row lands in exactly one stage.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// (close - SMA50) / ATR at or above this is an extended stage 2.
pub const EXTENSION_ATR_MULTIPLE: f64 = 7.0;
/// Darvas price-to-range percentage at which stage 2 is breaking out.
pub const BREAKOUT_POSITION_PERCENT: f64 = 100.0;
/// Bars whose range is below this share of ATR are tight.
pub const TIGHT_RANGE_ATR_PERCENT: f64 = 60.0;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Stage {
    #[default]
    #[serde(rename = "1")]
    Basing,
    #[serde(rename = "2A")]
    EarlyAdvance,
    #[serde(rename = "2B")]
    Breakout,
    #[serde(rename = "2C")]
    Extended,
    #[serde(rename = "3")]
    Topping,
    #[serde(rename = "4")]
    Declining,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Basing,
        Stage::EarlyAdvance,
        Stage::Breakout,
        Stage::Extended,
        Stage::Topping,
        Stage::Declining,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Basing => "1",
            Stage::EarlyAdvance => "2A",
            Stage::Breakout => "2B",
            Stage::Extended => "2C",
            Stage::Topping => "3",
            Stage::Declining => "4",
        }
    }

    /// Stage number without the 2A/2B/2C detail.
    pub fn major(&self) -> u8 {
        match self {
            Stage::Basing => 1,
            Stage::EarlyAdvance | Stage::Breakout | Stage::Extended => 2,
            Stage::Topping => 3,
            Stage::Declining => 4,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown stage '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StageInputs {
    pub close: f64,
    pub ema_10: Option<f64>,
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_200: Option<f64>,
    pub atr_14: Option<f64>,
    pub darvas_position_percent: Option<f64>,
}

impl StageInputs {
    fn moving_averages(&self) -> Option<[f64; 4]> {
        Some([self.ema_10?, self.sma_20?, self.sma_50?, self.sma_200?])
    }
}

pub fn classify(inputs: &StageInputs) -> Stage {
    let close = inputs.close;
    let mas = inputs.moving_averages();

    if let (Some(mas), Some(sma_50), Some(sma_200)) = (mas, inputs.sma_50, inputs.sma_200) {
        let below = mas.iter().filter(|&&ma| close < ma).count();
        if below == 4 && sma_50 < sma_200 {
            return Stage::Declining;
        }
        if below >= 3 && sma_50 >= sma_200 {
            return Stage::Topping;
        }
    }

    if let Some(extension) = atr_extension(close, inputs.sma_50, inputs.atr_14) {
        if extension >= EXTENSION_ATR_MULTIPLE {
            return Stage::Extended;
        }
    }

    if let Some(position) = inputs.darvas_position_percent {
        if position >= BREAKOUT_POSITION_PERCENT {
            return Stage::Breakout;
        }
    }

    if let Some(mas) = mas {
        if mas.iter().all(|&ma| close > ma) {
            return Stage::EarlyAdvance;
        }
    }

    Stage::Basing
}

/// (close - SMA50) / ATR. None when either input is missing or ATR is zero.
pub fn atr_extension(close: f64, sma_50: Option<f64>, atr: Option<f64>) -> Option<f64> {
    let (sma_50, atr) = (sma_50?, atr?);
    if atr == 0.0 {
        None
    } else {
        Some((close - sma_50) / atr)
    }
}

/// Today's range as a percentage of ATR.
pub fn range_atr_percent(high: f64, low: f64, atr: Option<f64>) -> Option<f64> {
    let atr = atr?;
    if atr == 0.0 {
        None
    } else {
        Some((high - low) / atr * 100.0)
    }
}

pub fn is_tight(range_atr_percent: Option<f64>) -> Option<bool> {
    range_atr_percent.map(|pct| pct < TIGHT_RANGE_ATR_PERCENT)
}
