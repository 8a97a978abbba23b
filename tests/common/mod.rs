#![allow(dead_code)]

use chrono::{Days, NaiveDate};
use stagescan::domain::config_validation::EngineConfig;
use stagescan::domain::error::StagescanError;
pub use stagescan::domain::ohlcv::OhlcvBar;
use stagescan::ports::data_port::{SectorInfo, SeriesStorePort};
use std::collections::HashMap;

pub struct MockSeriesStore {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub indices: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
    pub sectors: HashMap<String, SectorInfo>,
    pub caps: HashMap<String, f64>,
}

impl MockSeriesStore {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            indices: HashMap::new(),
            errors: HashMap::new(),
            sectors: HashMap::new(),
            caps: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_index(mut self, name: &str, bars: Vec<OhlcvBar>) -> Self {
        self.indices.insert(name.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    pub fn with_industry(mut self, symbol: &str, sector: &str, industry: &str) -> Self {
        self.sectors.insert(
            symbol.to_string(),
            SectorInfo {
                sector: Some(sector.to_string()),
                industry: Some(industry.to_string()),
            },
        );
        self
    }

    pub fn with_market_cap(mut self, symbol: &str, cap: f64) -> Self {
        self.caps.insert(symbol.to_string(), cap);
        self
    }
}

fn in_range(bars: &[OhlcvBar], start: NaiveDate, end: NaiveDate) -> Vec<OhlcvBar> {
    bars.iter()
        .filter(|b| b.date >= start && b.date <= end)
        .cloned()
        .collect()
}

impl SeriesStorePort for MockSeriesStore {
    fn list_symbols(&self) -> Result<Vec<String>, StagescanError> {
        let mut symbols: Vec<String> = self
            .data
            .keys()
            .chain(self.errors.keys())
            .cloned()
            .collect();
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }

    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, StagescanError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(StagescanError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|bars| in_range(bars, start_date, end_date))
            .unwrap_or_default())
    }

    fn list_indices(&self) -> Result<Vec<String>, StagescanError> {
        let mut names: Vec<String> = self.indices.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn fetch_index_ohlcv(
        &self,
        index: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, StagescanError> {
        self.indices
            .get(index)
            .map(|bars| in_range(bars, start_date, end_date))
            .ok_or_else(|| StagescanError::NoData {
                symbol: index.to_string(),
            })
    }

    fn market_caps(&self, _date: NaiveDate) -> Result<HashMap<String, f64>, StagescanError> {
        Ok(self.caps.clone())
    }

    fn sector_map(&self) -> Result<HashMap<String, SectorInfo>, StagescanError> {
        Ok(self.sectors.clone())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn start_date() -> NaiveDate {
    date(2023, 1, 2)
}

/// One bar per calendar day from `start`, with a one-point range around each close.
pub fn bars_from_closes(symbol: &str, start: NaiveDate, closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| OhlcvBar {
            symbol: symbol.to_string(),
            date: start + Days::new(i as u64),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10_000 + (i as i64 % 7) * 500,
        })
        .collect()
}

/// Linear trend of `count` bars starting at `start_price`.
pub fn generate_bars(symbol: &str, count: usize, start_price: f64, step: f64) -> Vec<OhlcvBar> {
    let closes: Vec<f64> = (0..count).map(|i| start_price + step * i as f64).collect();
    bars_from_closes(symbol, start_date(), &closes)
}

/// 30 bars: flat at 100 until the bar 21 sessions before the last, then a
/// straight line to `100 + change_percent`, so the 1-month change is exactly
/// `change_percent`.
pub fn month_change_bars(symbol: &str, change_percent: f64) -> Vec<OhlcvBar> {
    let closes: Vec<f64> = (0..30)
        .map(|i| {
            if i <= 8 {
                100.0
            } else {
                100.0 + change_percent * (i - 8) as f64 / 21.0
            }
        })
        .collect();
    bars_from_closes(symbol, start_date(), &closes)
}

pub fn last_date(bars: &[OhlcvBar]) -> NaiveDate {
    bars.last().unwrap().date
}

/// Engine config for tests: RRG against "NIFTY 50", default thresholds.
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.workers = 2;
    config
}
