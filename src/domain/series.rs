//! Validated per-symbol price history and the unified universe timeline.

use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct SymbolHistory {
    pub symbol: String,
    pub bars: Vec<OhlcvBar>,
    pub date_index: HashMap<NaiveDate, usize>,
    /// Bars dropped for integrity or ordering problems.
    pub rejected_bars: usize,
    /// Dates whose bar was dropped as malformed, with the reason.
    pub malformed: HashMap<NaiveDate, &'static str>,
}

impl SymbolHistory {
    /// Builds a history from raw bars, dropping malformed bars and any bar whose
    /// date does not strictly follow the previous accepted bar.
    pub fn new(symbol: String, raw: Vec<OhlcvBar>) -> Self {
        let mut bars: Vec<OhlcvBar> = Vec::with_capacity(raw.len());
        let mut rejected_bars = 0;
        let mut malformed = HashMap::new();

        for bar in raw {
            if let Some(reason) = bar.integrity_violation() {
                warn!(symbol = %symbol, date = %bar.date, reason, "rejecting malformed bar");
                rejected_bars += 1;
                malformed.insert(bar.date, reason);
                continue;
            }
            if let Some(last) = bars.last() {
                if bar.date <= last.date {
                    warn!(symbol = %symbol, date = %bar.date, "rejecting out-of-order bar");
                    rejected_bars += 1;
                    continue;
                }
            }
            bars.push(bar);
        }

        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();

        Self {
            symbol,
            bars,
            date_index,
            rejected_bars,
            malformed,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn get_bar(&self, date: NaiveDate) -> Option<&OhlcvBar> {
        self.date_index.get(&date).map(|&i| &self.bars[i])
    }

    pub fn get_bar_index(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }

    /// Bars up to and including `date`, or `None` if there is no bar on `date`.
    pub fn window_ending(&self, date: NaiveDate) -> Option<&[OhlcvBar]> {
        self.get_bar_index(date).map(|i| &self.bars[..=i])
    }

    /// Why the bar on `date` was rejected, when there is no accepted bar that day.
    pub fn rejection_on(&self, date: NaiveDate) -> Option<&'static str> {
        if self.date_index.contains_key(&date) {
            return None;
        }
        self.malformed.get(&date).copied()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

pub fn build_unified_timeline(histories: &[SymbolHistory]) -> Vec<NaiveDate> {
    let unique_dates: BTreeSet<NaiveDate> = histories
        .iter()
        .flat_map(|h| h.bars.iter().map(|bar| bar.date))
        .collect();
    unique_dates.into_iter().collect()
}
