//! Trailing index returns over calendar periods.
//!
//! The start bar is the first bar on or after the period's calendar start; the
//! end bar is the last bar on or before the as-of date. A period whose start is
//! older than the loaded history is reported as insufficient rather than
//! silently measured from the first bar.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::StagescanError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::SeriesStorePort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReturnPeriod {
    OneWeek,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    ThreeYears,
    FiveYears,
    YearToDate,
    Inception,
}

impl ReturnPeriod {
    pub const ALL: [ReturnPeriod; 9] = [
        ReturnPeriod::OneWeek,
        ReturnPeriod::OneMonth,
        ReturnPeriod::ThreeMonths,
        ReturnPeriod::SixMonths,
        ReturnPeriod::OneYear,
        ReturnPeriod::ThreeYears,
        ReturnPeriod::FiveYears,
        ReturnPeriod::YearToDate,
        ReturnPeriod::Inception,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnPeriod::OneWeek => "1w",
            ReturnPeriod::OneMonth => "1m",
            ReturnPeriod::ThreeMonths => "3m",
            ReturnPeriod::SixMonths => "6m",
            ReturnPeriod::OneYear => "1y",
            ReturnPeriod::ThreeYears => "3y",
            ReturnPeriod::FiveYears => "5y",
            ReturnPeriod::YearToDate => "ytd",
            ReturnPeriod::Inception => "inception",
        }
    }

    /// Calendar start of the period ending at `end`. `None` for inception.
    pub fn start_target(&self, end: NaiveDate) -> Option<NaiveDate> {
        let months = |n: u32| end.checked_sub_months(Months::new(n));
        match self {
            ReturnPeriod::OneWeek => end.checked_sub_days(Days::new(7)),
            ReturnPeriod::OneMonth => months(1),
            ReturnPeriod::ThreeMonths => months(3),
            ReturnPeriod::SixMonths => months(6),
            ReturnPeriod::OneYear => months(12),
            ReturnPeriod::ThreeYears => months(36),
            ReturnPeriod::FiveYears => months(60),
            ReturnPeriod::YearToDate => NaiveDate::from_ymd_opt(end.year(), 1, 1),
            ReturnPeriod::Inception => None,
        }
    }
}

impl fmt::Display for ReturnPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReturnPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        ReturnPeriod::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown return period '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReturnStatus {
    Ok,
    InsufficientData,
    ZeroStartPrice,
}

impl ReturnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnStatus::Ok => "ok",
            ReturnStatus::InsufficientData => "insufficient data",
            ReturnStatus::ZeroStartPrice => "start price is zero",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexReturn {
    pub index: String,
    pub period: ReturnPeriod,
    pub start_date: Option<NaiveDate>,
    pub end_date: NaiveDate,
    pub return_percent: Option<f64>,
    pub status: ReturnStatus,
}

/// Return of one period over date-ascending `bars` whose last bar is the end.
/// `None` when `bars` is empty.
pub fn period_return(index: &str, bars: &[OhlcvBar], period: ReturnPeriod) -> Option<IndexReturn> {
    let (first, end) = (bars.first()?, bars.last()?);
    let result = |start: Option<&OhlcvBar>, status: ReturnStatus, value: Option<f64>| IndexReturn {
        index: index.to_string(),
        period,
        start_date: start.map(|b| b.date),
        end_date: end.date,
        return_percent: value,
        status,
    };

    let start = match period.start_target(end.date) {
        None => Some(first),
        Some(target) if first.date > target => None,
        Some(target) => bars.iter().find(|b| b.date >= target),
    };
    let Some(start) = start else {
        return Some(result(None, ReturnStatus::InsufficientData, None));
    };
    if start.close == 0.0 {
        return Some(result(Some(start), ReturnStatus::ZeroStartPrice, None));
    }
    let value = (end.close / start.close - 1.0) * 100.0;
    Some(result(Some(start), ReturnStatus::Ok, Some(value)))
}

fn history_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn history_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// Returns of `index` for each period, ending at the last bar on or before
/// `as_of`, or at the latest bar when `as_of` is `None`.
pub fn index_returns(
    store: &dyn SeriesStorePort,
    index: &str,
    as_of: Option<NaiveDate>,
    periods: &[ReturnPeriod],
) -> Result<Vec<IndexReturn>, StagescanError> {
    let end = as_of.unwrap_or_else(history_end);
    let mut bars = store.fetch_index_ohlcv(index, history_start(), end)?;
    bars.sort_by_key(|b| b.date);
    bars.retain(|b| b.close.is_finite());
    if bars.is_empty() {
        return Err(StagescanError::NoData {
            symbol: index.to_string(),
        });
    }
    Ok(periods
        .iter()
        .filter_map(|&p| period_return(index, &bars, p))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::collections::HashMap;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn bar(date: NaiveDate, close: f64) -> OhlcvBar {
        OhlcvBar {
            symbol: "NIFTY BANK".into(),
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0,
        }
    }

    /// One bar per weekday from `start` to `end`, close rising by 1 each day.
    fn weekdays(start: NaiveDate, end: NaiveDate) -> Vec<OhlcvBar> {
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| d.weekday().number_from_monday() <= 5)
            .enumerate()
            .map(|(i, d)| bar(d, 100.0 + i as f64))
            .collect()
    }

    #[test]
    fn period_names_round_trip() {
        for p in ReturnPeriod::ALL {
            assert_eq!(p.as_str().parse::<ReturnPeriod>().unwrap(), p);
        }
        assert_eq!(" YTD ".parse::<ReturnPeriod>().unwrap(), ReturnPeriod::YearToDate);
        assert!("2w".parse::<ReturnPeriod>().is_err());
    }

    #[test]
    fn month_targets_clamp_to_month_end() {
        assert_eq!(
            ReturnPeriod::OneMonth.start_target(d(2024, 3, 31)),
            Some(d(2024, 2, 29))
        );
        assert_eq!(
            ReturnPeriod::OneWeek.start_target(d(2024, 3, 6)),
            Some(d(2024, 2, 28))
        );
        assert_eq!(ReturnPeriod::Inception.start_target(d(2024, 3, 6)), None);
    }

    #[test]
    fn start_is_first_bar_on_or_after_target() {
        // 2024-03-09 is a Saturday; the target a week back from the 16th falls on it
        let bars = vec![
            bar(d(2024, 3, 8), 100.0),
            bar(d(2024, 3, 11), 110.0),
            bar(d(2024, 3, 15), 121.0),
            bar(d(2024, 3, 16), 132.0),
        ];
        let r = period_return("NIFTY BANK", &bars, ReturnPeriod::OneWeek).unwrap();
        assert_eq!(r.status, ReturnStatus::Ok);
        assert_eq!(r.start_date, Some(d(2024, 3, 11)));
        assert_eq!(r.end_date, d(2024, 3, 16));
        assert_abs_diff_eq!(r.return_percent.unwrap(), 20.0, epsilon = 1e-9);
    }

    #[test]
    fn short_history_is_insufficient() {
        let bars = weekdays(d(2023, 6, 1), d(2024, 3, 15));
        let r = period_return("NIFTY BANK", &bars, ReturnPeriod::OneYear).unwrap();
        assert_eq!(r.status, ReturnStatus::InsufficientData);
        assert!(r.return_percent.is_none());
        assert!(r.start_date.is_none());

        let six = period_return("NIFTY BANK", &bars, ReturnPeriod::SixMonths).unwrap();
        assert_eq!(six.status, ReturnStatus::Ok);
    }

    #[test]
    fn ytd_and_inception_anchor_on_calendar() {
        let bars = weekdays(d(2023, 12, 27), d(2024, 1, 10));
        let ytd = period_return("NIFTY BANK", &bars, ReturnPeriod::YearToDate).unwrap();
        assert_eq!(ytd.start_date, Some(d(2024, 1, 1)));

        let inception = period_return("NIFTY BANK", &bars, ReturnPeriod::Inception).unwrap();
        assert_eq!(inception.start_date, Some(d(2023, 12, 27)));
        let first = bars[0].close;
        let last = bars[bars.len() - 1].close;
        assert_abs_diff_eq!(
            inception.return_percent.unwrap(),
            (last / first - 1.0) * 100.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn zero_start_price_is_reported() {
        let bars = vec![bar(d(2024, 1, 1), 0.0), bar(d(2024, 1, 2), 5.0)];
        let r = period_return("NIFTY BANK", &bars, ReturnPeriod::Inception).unwrap();
        assert_eq!(r.status, ReturnStatus::ZeroStartPrice);
        assert!(r.return_percent.is_none());
    }

    #[test]
    fn empty_bars_give_nothing() {
        assert!(period_return("NIFTY BANK", &[], ReturnPeriod::OneWeek).is_none());
    }

    struct IndexOnly(HashMap<String, Vec<OhlcvBar>>);

    impl SeriesStorePort for IndexOnly {
        fn list_symbols(&self) -> Result<Vec<String>, StagescanError> {
            Ok(Vec::new())
        }

        fn fetch_ohlcv(
            &self,
            symbol: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<OhlcvBar>, StagescanError> {
            Err(StagescanError::NoData {
                symbol: symbol.to_string(),
            })
        }

        fn list_indices(&self) -> Result<Vec<String>, StagescanError> {
            Ok(self.0.keys().cloned().collect())
        }

        fn fetch_index_ohlcv(
            &self,
            index: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<OhlcvBar>, StagescanError> {
            Ok(self
                .0
                .get(index)
                .map(|bars| {
                    bars.iter()
                        .filter(|b| b.date >= start && b.date <= end)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default())
        }

        fn market_caps(&self, _date: NaiveDate) -> Result<HashMap<String, f64>, StagescanError> {
            Ok(HashMap::new())
        }

        fn sector_map(
            &self,
        ) -> Result<HashMap<String, crate::ports::data_port::SectorInfo>, StagescanError> {
            Ok(HashMap::new())
        }
    }

    #[test]
    fn index_returns_end_at_as_of_date() {
        let mut bars = weekdays(d(2023, 1, 2), d(2024, 3, 15));
        bars.reverse();
        let store = IndexOnly(HashMap::from([("NIFTY BANK".to_string(), bars)]));

        let returns = index_returns(
            &store,
            "NIFTY BANK",
            Some(d(2024, 3, 10)),
            &[ReturnPeriod::OneWeek, ReturnPeriod::OneYear, ReturnPeriod::FiveYears],
        )
        .unwrap();
        assert_eq!(returns.len(), 3);
        assert!(returns.iter().all(|r| r.end_date == d(2024, 3, 8)));
        assert_eq!(returns[0].start_date, Some(d(2024, 3, 1)));
        assert_eq!(returns[1].start_date, Some(d(2023, 3, 8)));
        assert_eq!(returns[2].status, ReturnStatus::InsufficientData);

        let latest = index_returns(&store, "NIFTY BANK", None, &[ReturnPeriod::YearToDate]).unwrap();
        assert_eq!(latest[0].end_date, d(2024, 3, 15));
        assert_eq!(latest[0].start_date, Some(d(2024, 1, 1)));
    }

    #[test]
    fn unknown_index_is_no_data() {
        let store = IndexOnly(HashMap::new());
        let err = index_returns(&store, "NIFTY IT", None, &ReturnPeriod::ALL).unwrap_err();
        assert!(matches!(err, StagescanError::NoData { .. }));
    }
}
