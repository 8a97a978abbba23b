//! CSV directory series store.
//!
//! Layout under the base directory:
//! `{SYMBOL}.csv` per security, `indices/{NAME}.csv` per index, and the
//! optional reference files `sectors.csv` (symbol,sector,industry) and
//! `market_caps.csv` (symbol,date,market_cap).

use crate::domain::error::StagescanError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::{SectorInfo, SeriesStorePort};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const INDEX_DIR: &str = "indices";
const SECTORS_FILE: &str = "sectors.csv";
const MARKET_CAPS_FILE: &str = "market_caps.csv";

pub struct CsvAdapter {
    base_path: PathBuf,
}

fn read_err(path: &Path, e: impl std::fmt::Display) -> StagescanError {
    StagescanError::Database {
        reason: format!("failed to read {}: {}", path.display(), e),
    }
}

fn field<'a>(record: &'a csv::StringRecord, idx: usize, name: &str) -> Result<&'a str, StagescanError> {
    record.get(idx).map(str::trim).ok_or_else(|| StagescanError::Database {
        reason: format!("missing {} column", name),
    })
}

fn number<T: std::str::FromStr>(
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
) -> Result<T, StagescanError>
where
    T::Err: std::fmt::Display,
{
    field(record, idx, name)?
        .parse()
        .map_err(|e: T::Err| StagescanError::Database {
            reason: format!("invalid {} value: {}", name, e),
        })
}

fn date_field(record: &csv::StringRecord, idx: usize) -> Result<NaiveDate, StagescanError> {
    let value = field(record, idx, "date")?;
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| StagescanError::Database {
        reason: format!("invalid date format: {}", e),
    })
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    fn index_path(&self, index: &str) -> PathBuf {
        self.base_path.join(INDEX_DIR).join(format!("{}.csv", index))
    }

    fn read_bars(
        &self,
        path: &Path,
        name: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, StagescanError> {
        let mut rdr = csv::Reader::from_path(path).map_err(|e| read_err(path, e))?;
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| StagescanError::Database {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;

            let date = date_field(&record, 0)?;
            if date < start_date || date > end_date {
                continue;
            }

            bars.push(OhlcvBar {
                symbol: name.to_string(),
                date,
                open: number(&record, 1, "open")?,
                high: number(&record, 2, "high")?,
                low: number(&record, 3, "low")?,
                close: number(&record, 4, "close")?,
                volume: number(&record, 5, "volume")?,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    /// File stems of `*.csv` files in `dir`, sorted. Reference files are skipped.
    fn stems(dir: &Path) -> Result<Vec<String>, StagescanError> {
        let entries = fs::read_dir(dir).map_err(|e| read_err(dir, e))?;
        let mut names = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| StagescanError::Database {
                reason: format!("directory entry error: {}", e),
            })?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name == SECTORS_FILE || name == MARKET_CAPS_FILE {
                continue;
            }
            if let Some(stem) = name.strip_suffix(".csv") {
                names.push(stem.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    fn reference_reader(&self, file: &str) -> Result<Option<csv::Reader<fs::File>>, StagescanError> {
        let path = self.base_path.join(file);
        if !path.exists() {
            return Ok(None);
        }
        csv::Reader::from_path(&path)
            .map(Some)
            .map_err(|e| read_err(&path, e))
    }
}

impl SeriesStorePort for CsvAdapter {
    fn list_symbols(&self) -> Result<Vec<String>, StagescanError> {
        Self::stems(&self.base_path)
    }

    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, StagescanError> {
        self.read_bars(&self.csv_path(symbol), symbol, start_date, end_date)
    }

    fn list_indices(&self) -> Result<Vec<String>, StagescanError> {
        let dir = self.base_path.join(INDEX_DIR);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        Self::stems(&dir)
    }

    fn fetch_index_ohlcv(
        &self,
        index: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, StagescanError> {
        self.read_bars(&self.index_path(index), index, start_date, end_date)
    }

    fn data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, StagescanError> {
        let bars = self.fetch_ohlcv(symbol, NaiveDate::MIN, NaiveDate::MAX)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }

    fn market_caps(&self, date: NaiveDate) -> Result<HashMap<String, f64>, StagescanError> {
        let Some(mut rdr) = self.reference_reader(MARKET_CAPS_FILE)? else {
            return Ok(HashMap::new());
        };

        let mut latest: HashMap<String, (NaiveDate, f64)> = HashMap::new();
        for result in rdr.records() {
            let record = result.map_err(|e| StagescanError::Database {
                reason: format!("CSV parse error in {}: {}", MARKET_CAPS_FILE, e),
            })?;
            let symbol = field(&record, 0, "symbol")?.to_string();
            let as_of = date_field(&record, 1)?;
            let cap: f64 = number(&record, 2, "market_cap")?;
            if as_of > date {
                continue;
            }
            match latest.get(&symbol) {
                Some((seen, _)) if *seen >= as_of => {}
                _ => {
                    latest.insert(symbol, (as_of, cap));
                }
            }
        }

        Ok(latest.into_iter().map(|(s, (_, cap))| (s, cap)).collect())
    }

    fn sector_map(&self) -> Result<HashMap<String, SectorInfo>, StagescanError> {
        let Some(mut rdr) = self.reference_reader(SECTORS_FILE)? else {
            return Ok(HashMap::new());
        };

        let optional = |s: &str| (!s.is_empty()).then(|| s.to_string());
        let mut map = HashMap::new();
        for result in rdr.records() {
            let record = result.map_err(|e| StagescanError::Database {
                reason: format!("CSV parse error in {}: {}", SECTORS_FILE, e),
            })?;
            map.insert(
                field(&record, 0, "symbol")?.to_string(),
                SectorInfo {
                    sector: record.get(1).map(str::trim).and_then(optional),
                    industry: record.get(2).map(str::trim).and_then(optional),
                },
            );
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str = "date,open,high,low,close,volume\n";

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = format!(
            "{HEADER}\
            2024-01-16,105.0,115.0,100.0,110.0,60000\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000\n\
            2024-01-17,110.0,120.0,105.0,115.0,55000\n"
        );
        fs::write(path.join("RELIANCE.csv"), csv_content).unwrap();
        fs::write(path.join("TCS.csv"), HEADER).unwrap();
        fs::write(
            path.join(SECTORS_FILE),
            "symbol,sector,industry\nRELIANCE,Energy,Refineries\nTCS,IT,\n",
        )
        .unwrap();
        fs::write(
            path.join(MARKET_CAPS_FILE),
            "symbol,date,market_cap\nRELIANCE,2024-01-01,1.0e12\nRELIANCE,2024-01-16,1.2e12\nTCS,2024-02-01,9.0e11\n",
        )
        .unwrap();

        fs::create_dir(path.join(INDEX_DIR)).unwrap();
        fs::write(
            path.join(INDEX_DIR).join("NIFTY 50.csv"),
            format!("{HEADER}2024-01-15,21000,21100,20900,21050,0\n"),
        )
        .unwrap();

        (dir, path)
    }

    #[test]
    fn fetch_ohlcv_returns_sorted_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let start = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 17).unwrap();
        let bars = adapter.fetch_ohlcv("RELIANCE", start, end).unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].symbol, "RELIANCE");
        assert_eq!(bars[0].date, start);
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].low, 90.0);
        assert_eq!(bars[0].volume, 50000);
    }

    #[test]
    fn fetch_ohlcv_filters_by_date() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let day = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();
        let bars = adapter.fetch_ohlcv("RELIANCE", day, day).unwrap();

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, day);
    }

    #[test]
    fn fetch_ohlcv_errors_for_missing_file() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert!(adapter.fetch_ohlcv("XYZ", start, end).is_err());
    }

    #[test]
    fn list_symbols_skips_reference_files() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert_eq!(adapter.list_symbols().unwrap(), vec!["RELIANCE", "TCS"]);
    }

    #[test]
    fn indices_live_in_their_own_directory() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        assert_eq!(adapter.list_indices().unwrap(), vec!["NIFTY 50"]);
        let bars = adapter
            .fetch_index_ohlcv("NIFTY 50", NaiveDate::MIN, NaiveDate::MAX)
            .unwrap();
        assert_eq!(bars[0].close, 21050.0);
    }

    #[test]
    fn data_range_covers_file() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let (first, last, count) = adapter.data_range("RELIANCE").unwrap().unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 1, 17).unwrap());
        assert_eq!(count, 3);
        assert!(adapter.data_range("TCS").unwrap().is_none());
    }

    #[test]
    fn reference_files_are_read() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let sectors = adapter.sector_map().unwrap();
        assert_eq!(sectors["RELIANCE"].industry.as_deref(), Some("Refineries"));
        assert!(sectors["TCS"].industry.is_none());

        let caps = adapter
            .market_caps(NaiveDate::from_ymd_opt(2024, 1, 20).unwrap())
            .unwrap();
        assert_eq!(caps.get("RELIANCE"), Some(&1.2e12));
        assert!(!caps.contains_key("TCS"));
    }

    #[test]
    fn missing_reference_files_are_empty() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        assert!(adapter.sector_map().unwrap().is_empty());
        assert!(adapter.list_indices().unwrap().is_empty());
    }
}
