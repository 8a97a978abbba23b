//! SQLite adapter: raw series store and committed metric store in one file.

use crate::domain::breadth::{McClellanState, UniverseSnapshot};
use crate::domain::config_validation::EngineConfig;
use crate::domain::error::StagescanError;
use crate::domain::metric_row::DailyMetricRow;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::rrg::{Quadrant, RrgPoint, Timeframe};
use crate::domain::run_report::{RunReport, RunStatus};
use crate::ports::data_port::{SectorInfo, SeriesStorePort};
use crate::ports::metric_port::{DateCommit, MetricStorePort};
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn db_err(e: r2d2::Error) -> StagescanError {
    StagescanError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> StagescanError {
    StagescanError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn json_err(e: serde_json::Error) -> StagescanError {
    StagescanError::DatabaseQuery {
        reason: format!("payload encoding: {}", e),
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(value: &str) -> Result<NaiveDate, StagescanError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| StagescanError::DatabaseQuery {
        reason: format!("invalid stored date '{}': {}", value, e),
    })
}

/// Date column reader usable inside `query_map` closures.
fn date_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let value: String = row.get(idx)?;
    NaiveDate::parse_from_str(&value, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

impl SqliteAdapter {
    pub fn open(path: &Path, pool_size: u32) -> Result<Self, StagescanError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(db_err)?;
        debug!(path = %path.display(), pool_size, "opened sqlite store");
        Ok(Self { pool })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, StagescanError> {
        Self::open(&config.sqlite_path, config.sqlite_pool_size)
    }

    pub fn in_memory() -> Result<Self, StagescanError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(db_err)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StagescanError> {
        self.pool.get().map_err(db_err)
    }

    pub fn initialize_schema(&self) -> Result<(), StagescanError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS ohlcv (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume INTEGER NOT NULL,
                PRIMARY KEY (symbol, date)
            );
            CREATE INDEX IF NOT EXISTS idx_ohlcv_date ON ohlcv(date);
            CREATE TABLE IF NOT EXISTS index_ohlcv (
                index_name TEXT NOT NULL,
                date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume INTEGER NOT NULL,
                PRIMARY KEY (index_name, date)
            );
            CREATE TABLE IF NOT EXISTS sectors (
                symbol TEXT PRIMARY KEY,
                sector TEXT,
                industry TEXT
            );
            CREATE TABLE IF NOT EXISTS market_caps (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                market_cap REAL NOT NULL,
                PRIMARY KEY (symbol, date)
            );
            CREATE TABLE IF NOT EXISTS metric_rows (
                date TEXT NOT NULL,
                symbol TEXT NOT NULL,
                stage TEXT NOT NULL,
                rs_percentile REAL,
                payload TEXT NOT NULL,
                PRIMARY KEY (date, symbol)
            );
            CREATE TABLE IF NOT EXISTS universe_snapshots (
                date TEXT PRIMARY KEY,
                payload TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS mcclellan_states (
                date TEXT PRIMARY KEY,
                ema_19 REAL NOT NULL,
                ema_39 REAL NOT NULL,
                summation REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS rrg_points (
                run_date TEXT NOT NULL,
                index_name TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                point_date TEXT NOT NULL,
                rs_ratio REAL NOT NULL,
                rs_momentum REAL NOT NULL,
                quadrant TEXT NOT NULL,
                PRIMARY KEY (run_date, index_name, timeframe, point_date)
            );
            CREATE TABLE IF NOT EXISTS run_reports (
                date TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                payload TEXT NOT NULL
            );",
        )
        .map_err(query_err)?;
        Ok(())
    }

    pub fn insert_bars(&self, bars: &[OhlcvBar]) -> Result<(), StagescanError> {
        self.insert_into("ohlcv", "symbol", bars)
    }

    /// Index bars use `OhlcvBar::symbol` as the index name.
    pub fn insert_index_bars(&self, bars: &[OhlcvBar]) -> Result<(), StagescanError> {
        self.insert_into("index_ohlcv", "index_name", bars)
    }

    fn insert_into(&self, table: &str, key: &str, bars: &[OhlcvBar]) -> Result<(), StagescanError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        {
            let sql = format!(
                "INSERT OR REPLACE INTO {table} ({key}, date, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            );
            let mut stmt = tx.prepare(&sql).map_err(query_err)?;
            for bar in bars {
                stmt.execute(params![
                    bar.symbol,
                    format_date(bar.date),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ])
                .map_err(query_err)?;
            }
        }
        tx.commit().map_err(query_err)?;
        Ok(())
    }

    pub fn insert_sector(&self, symbol: &str, info: &SectorInfo) -> Result<(), StagescanError> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO sectors (symbol, sector, industry) VALUES (?1, ?2, ?3)",
                params![symbol, info.sector, info.industry],
            )
            .map_err(query_err)?;
        Ok(())
    }

    pub fn insert_market_cap(
        &self,
        symbol: &str,
        date: NaiveDate,
        market_cap: f64,
    ) -> Result<(), StagescanError> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO market_caps (symbol, date, market_cap) VALUES (?1, ?2, ?3)",
                params![symbol, format_date(date), market_cap],
            )
            .map_err(query_err)?;
        Ok(())
    }

    fn fetch_from(
        &self,
        table: &str,
        key: &str,
        name: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, StagescanError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {key}, date, open, high, low, close, volume
             FROM {table}
             WHERE {key} = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date ASC"
        );
        let mut stmt = conn.prepare(&sql).map_err(query_err)?;
        let rows = stmt
            .query_map(
                params![name, format_date(start_date), format_date(end_date)],
                |row| {
                    Ok(OhlcvBar {
                        symbol: row.get(0)?,
                        date: date_column(row, 1)?,
                        open: row.get(2)?,
                        high: row.get(3)?,
                        low: row.get(4)?,
                        close: row.get(5)?,
                        volume: row.get(6)?,
                    })
                },
            )
            .map_err(query_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn distinct(&self, sql: &str) -> Result<Vec<String>, StagescanError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(query_err)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_err)?;
        rows.collect::<Result<Vec<String>, _>>().map_err(query_err)
    }

    /// Dates with a committed snapshot, newest first.
    pub fn committed_dates(&self) -> Result<Vec<NaiveDate>, StagescanError> {
        self.distinct("SELECT date FROM universe_snapshots ORDER BY date DESC")?
            .iter()
            .map(|d| parse_date(d))
            .collect()
    }
}

impl SeriesStorePort for SqliteAdapter {
    fn list_symbols(&self) -> Result<Vec<String>, StagescanError> {
        self.distinct("SELECT DISTINCT symbol FROM ohlcv ORDER BY symbol")
    }

    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, StagescanError> {
        self.fetch_from("ohlcv", "symbol", symbol, start_date, end_date)
    }

    fn list_indices(&self) -> Result<Vec<String>, StagescanError> {
        self.distinct("SELECT DISTINCT index_name FROM index_ohlcv ORDER BY index_name")
    }

    fn fetch_index_ohlcv(
        &self,
        index: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, StagescanError> {
        let bars = self.fetch_from("index_ohlcv", "index_name", index, start_date, end_date)?;
        if bars.is_empty() {
            return Err(StagescanError::NoData {
                symbol: index.to_string(),
            });
        }
        Ok(bars)
    }

    fn data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, StagescanError> {
        let conn = self.conn()?;
        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM ohlcv WHERE symbol = ?1",
                params![symbol],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_err)?;

        match result {
            (Some(min), Some(max), count) if count > 0 => {
                Ok(Some((parse_date(&min)?, parse_date(&max)?, count as usize)))
            }
            _ => Ok(None),
        }
    }

    fn market_caps(&self, date: NaiveDate) -> Result<HashMap<String, f64>, StagescanError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT m.symbol, m.market_cap FROM market_caps m
                 WHERE m.date = (SELECT MAX(date) FROM market_caps
                                 WHERE symbol = m.symbol AND date <= ?1)",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![format_date(date)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })
            .map_err(query_err)?;
        rows.collect::<Result<HashMap<_, _>, _>>().map_err(query_err)
    }

    fn sector_map(&self) -> Result<HashMap<String, SectorInfo>, StagescanError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT symbol, sector, industry FROM sectors")
            .map_err(query_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    SectorInfo {
                        sector: row.get(1)?,
                        industry: row.get(2)?,
                    },
                ))
            })
            .map_err(query_err)?;
        rows.collect::<Result<HashMap<_, _>, _>>().map_err(query_err)
    }
}

impl MetricStorePort for SqliteAdapter {
    fn commit_date(&self, commit: &DateCommit) -> Result<(), StagescanError> {
        let date = format_date(commit.date);
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        tx.execute("DELETE FROM metric_rows WHERE date = ?1", params![date])
            .map_err(query_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO metric_rows (date, symbol, stage, rs_percentile, payload)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(query_err)?;
            for row in &commit.rows {
                let payload = serde_json::to_string(row).map_err(json_err)?;
                stmt.execute(params![
                    date,
                    row.symbol,
                    row.stage.as_str(),
                    row.rs_percentile,
                    payload
                ])
                .map_err(query_err)?;
            }
        }

        let snapshot = serde_json::to_string(&commit.snapshot).map_err(json_err)?;
        tx.execute(
            "INSERT OR REPLACE INTO universe_snapshots (date, payload) VALUES (?1, ?2)",
            params![date, snapshot],
        )
        .map_err(query_err)?;

        let m = &commit.mcclellan;
        tx.execute(
            "INSERT OR REPLACE INTO mcclellan_states (date, ema_19, ema_39, summation)
             VALUES (?1, ?2, ?3, ?4)",
            params![format_date(m.date), m.ema_19, m.ema_39, m.summation],
        )
        .map_err(query_err)?;

        tx.execute("DELETE FROM rrg_points WHERE run_date = ?1", params![date])
            .map_err(query_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO rrg_points
                     (run_date, index_name, timeframe, point_date, rs_ratio, rs_momentum, quadrant)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(query_err)?;
            for p in &commit.rrg_points {
                stmt.execute(params![
                    date,
                    p.index,
                    p.timeframe.as_str(),
                    format_date(p.date),
                    p.rs_ratio,
                    p.rs_momentum,
                    p.quadrant.as_str()
                ])
                .map_err(query_err)?;
            }
        }

        write_report(&tx, &commit.report)?;
        tx.commit().map_err(query_err)?;
        debug!(%date, rows = commit.rows.len(), "commit written");
        Ok(())
    }

    fn record_run_report(&self, report: &RunReport) -> Result<(), StagescanError> {
        let conn = self.conn()?;
        write_report(&conn, report)
    }

    fn load_rows(&self, date: NaiveDate) -> Result<Option<Vec<DailyMetricRow>>, StagescanError> {
        let conn = self.conn()?;
        let date_str = format_date(date);
        let committed: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM universe_snapshots WHERE date = ?1",
                params![date_str],
                |row| row.get(0),
            )
            .map_err(query_err)?;
        if committed == 0 {
            return Ok(None);
        }

        let mut stmt = conn
            .prepare("SELECT payload FROM metric_rows WHERE date = ?1 ORDER BY symbol")
            .map_err(query_err)?;
        let payloads = stmt
            .query_map(params![date_str], |row| row.get::<_, String>(0))
            .map_err(query_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_err)?;

        payloads
            .iter()
            .map(|p| serde_json::from_str(p).map_err(json_err))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    fn latest_committed_date(&self) -> Result<Option<NaiveDate>, StagescanError> {
        let conn = self.conn()?;
        let latest: Option<String> = conn
            .query_row("SELECT MAX(date) FROM universe_snapshots", [], |row| row.get(0))
            .map_err(query_err)?;
        latest.as_deref().map(parse_date).transpose()
    }

    fn load_snapshot(&self, date: NaiveDate) -> Result<Option<UniverseSnapshot>, StagescanError> {
        let conn = self.conn()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM universe_snapshots WHERE date = ?1",
                params![format_date(date)],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_err)?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(json_err))
            .transpose()
    }

    fn mcclellan_state_before(
        &self,
        date: NaiveDate,
    ) -> Result<Option<McClellanState>, StagescanError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT date, ema_19, ema_39, summation FROM mcclellan_states
             WHERE date < ?1 ORDER BY date DESC LIMIT 1",
            params![format_date(date)],
            |row| {
                Ok(McClellanState {
                    date: date_column(row, 0)?,
                    ema_19: row.get(1)?,
                    ema_39: row.get(2)?,
                    summation: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(query_err)
    }

    fn load_rrg_tail(
        &self,
        date: NaiveDate,
        timeframe: Timeframe,
    ) -> Result<Vec<RrgPoint>, StagescanError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT index_name, point_date, rs_ratio, rs_momentum FROM rrg_points
                 WHERE run_date = ?1 AND timeframe = ?2
                 ORDER BY index_name, point_date",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![format_date(date), timeframe.as_str()], |row| {
                let rs_ratio: f64 = row.get(2)?;
                let rs_momentum: f64 = row.get(3)?;
                Ok(RrgPoint {
                    index: row.get(0)?,
                    timeframe,
                    date: date_column(row, 1)?,
                    rs_ratio,
                    rs_momentum,
                    quadrant: Quadrant::classify(rs_ratio, rs_momentum),
                })
            })
            .map_err(query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn load_run_report(&self, date: NaiveDate) -> Result<Option<RunReport>, StagescanError> {
        let conn = self.conn()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM run_reports WHERE date = ?1",
                params![format_date(date)],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_err)?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(json_err))
            .transpose()
    }
}

fn write_report(conn: &rusqlite::Connection, report: &RunReport) -> Result<(), StagescanError> {
    let status = match report.status {
        RunStatus::Committed => "committed",
        RunStatus::Failed => "failed",
    };
    let payload = serde_json::to_string(report).map_err(json_err)?;
    conn.execute(
        "INSERT OR REPLACE INTO run_reports (date, status, payload) VALUES (?1, ?2, ?3)",
        params![format_date(report.date), status, payload],
    )
    .map_err(query_err)?;
    Ok(())
}
