//! Series store port: read-only access to raw daily bars and reference data.

use crate::domain::error::StagescanError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectorInfo {
    pub sector: Option<String>,
    pub industry: Option<String>,
}

pub trait SeriesStorePort {
    fn list_symbols(&self) -> Result<Vec<String>, StagescanError>;

    /// Bars for `symbol` with `start <= date <= end`, in any order.
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, StagescanError>;

    fn list_indices(&self) -> Result<Vec<String>, StagescanError>;

    fn fetch_index_ohlcv(
        &self,
        index: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, StagescanError>;

    /// First date, last date and bar count stored for `symbol`.
    fn data_range(
        &self,
        _symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, StagescanError> {
        Ok(None)
    }

    /// Latest known market capitalisation per symbol as of `date`.
    fn market_caps(&self, _date: NaiveDate) -> Result<HashMap<String, f64>, StagescanError> {
        Ok(HashMap::new())
    }

    fn sector_map(&self) -> Result<HashMap<String, SectorInfo>, StagescanError> {
        Ok(HashMap::new())
    }
}
