//! PostgreSQL series store (read-only upstream bar tables).

use crate::domain::config_validation::EngineConfig;
use crate::domain::error::StagescanError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::{SectorInfo, SeriesStorePort};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use postgres::types::ToSql;
use postgres::{Client, NoTls, Row};
use std::cell::RefCell;
use std::collections::HashMap;

pub struct PostgresAdapter {
    client: RefCell<Client>,
}

fn query_err(e: postgres::Error) -> StagescanError {
    StagescanError::DatabaseQuery {
        reason: e.to_string(),
    }
}

/// Inclusive timestamptz bounds covering whole days.
fn day_bounds(start_date: NaiveDate, end_date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = start_date.and_time(NaiveTime::MIN).and_utc();
    let end = end_date
        .succ_opt()
        .unwrap_or(end_date)
        .and_time(NaiveTime::MIN)
        .and_utc();
    (start, end)
}

fn bar_from_row(row: &Row) -> OhlcvBar {
    let dt: DateTime<Utc> = row.get(1);
    OhlcvBar {
        symbol: row.get(0),
        date: dt.naive_utc().date(),
        open: row.get(2),
        high: row.get(3),
        low: row.get(4),
        close: row.get(5),
        volume: row.get(6),
    }
}

impl PostgresAdapter {
    pub fn from_config(config: &EngineConfig) -> Result<Self, StagescanError> {
        let connection_string = config.postgres_connection_string.as_deref().ok_or_else(|| {
            StagescanError::ConfigMissing {
                section: "postgres".into(),
                key: "connection_string".into(),
            }
        })?;

        let client =
            Client::connect(connection_string, NoTls).map_err(|e| StagescanError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client: RefCell::new(client),
        })
    }

    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, StagescanError> {
        self.client.borrow_mut().query(sql, params).map_err(query_err)
    }

    fn fetch_bars(
        &self,
        table: &str,
        key: &str,
        name: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, StagescanError> {
        let (start, end) = day_bounds(start_date, end_date);
        let sql = format!(
            "SELECT {key}, date, \
                    open::double precision, high::double precision, \
                    low::double precision, close::double precision, \
                    volume::bigint \
             FROM {table} \
             WHERE {key} = $1 AND date >= $2 AND date < $3 \
             ORDER BY date ASC"
        );
        let rows = self.query(&sql, &[&name, &start, &end])?;
        Ok(rows.iter().map(bar_from_row).collect())
    }
}

impl SeriesStorePort for PostgresAdapter {
    fn list_symbols(&self) -> Result<Vec<String>, StagescanError> {
        let rows = self.query("SELECT DISTINCT symbol FROM public.ohlcv ORDER BY symbol", &[])?;
        Ok(rows.into_iter().map(|row| row.get(0)).collect())
    }

    fn fetch_ohlcv(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, StagescanError> {
        self.fetch_bars("public.ohlcv", "symbol", symbol, start_date, end_date)
    }

    fn list_indices(&self) -> Result<Vec<String>, StagescanError> {
        let rows = self.query(
            "SELECT DISTINCT index_name FROM public.index_ohlcv ORDER BY index_name",
            &[],
        )?;
        Ok(rows.into_iter().map(|row| row.get(0)).collect())
    }

    fn fetch_index_ohlcv(
        &self,
        index: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, StagescanError> {
        let bars =
            self.fetch_bars("public.index_ohlcv", "index_name", index, start_date, end_date)?;
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
        let rows = self.query(
            "SELECT MIN(date), MAX(date), COUNT(*) FROM public.ohlcv WHERE symbol = $1",
            &[&symbol],
        )?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let min_dt: Option<DateTime<Utc>> = row.get(0);
        let max_dt: Option<DateTime<Utc>> = row.get(1);
        let count: i64 = row.get(2);

        match (min_dt, max_dt) {
            (Some(min), Some(max)) if count > 0 => Ok(Some((
                min.naive_utc().date(),
                max.naive_utc().date(),
                count as usize,
            ))),
            _ => Ok(None),
        }
    }

    fn market_caps(&self, date: NaiveDate) -> Result<HashMap<String, f64>, StagescanError> {
        let (_, end) = day_bounds(date, date);
        let rows = self.query(
            "SELECT DISTINCT ON (symbol) symbol, market_cap::double precision \
             FROM public.market_caps WHERE date < $1 \
             ORDER BY symbol, date DESC",
            &[&end],
        )?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get::<_, String>(0), row.get::<_, f64>(1)))
            .collect())
    }

    fn sector_map(&self) -> Result<HashMap<String, SectorInfo>, StagescanError> {
        let rows = self.query("SELECT symbol, sector, industry FROM public.sectors", &[])?;
        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.get::<_, String>(0),
                    SectorInfo {
                        sector: row.get(1),
                        industry: row.get(2),
                    },
                )
            })
            .collect())
    }
}
