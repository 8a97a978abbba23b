//! Configuration validation.
//!
//! Reads every engine setting through [`ConfigPort`] once, up front, and
//! rejects bad values before any data is touched.

use crate::domain::error::StagescanError;
use crate::domain::oscillator::DEFAULT_SQUEEZE_THRESHOLD;
use crate::domain::rrg::RrgParams;
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;
use std::path::PathBuf;

pub const DEFAULT_LOOKBACK_DAYS: i64 = 400;
pub const DEFAULT_RRG_LOOKBACK_DAYS: i64 = 1500;
pub const DEFAULT_SQLITE_PATH: &str = "stagescan.db";
pub const DEFAULT_POOL_SIZE: i64 = 4;
pub const DEFAULT_BENCHMARK: &str = "NIFTY 50";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Sqlite,
    Csv,
    Postgres,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RrgConfig {
    pub enabled: bool,
    pub benchmark: String,
    /// Explicit index list; `None` means every index the store knows except the benchmark.
    pub indices: Option<Vec<String>>,
    pub lookback_days: i64,
    pub params: RrgParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub source: DataSource,
    pub csv_dir: Option<PathBuf>,
    pub sqlite_path: PathBuf,
    pub sqlite_pool_size: u32,
    pub postgres_connection_string: Option<String>,
    /// Calendar days of history loaded per symbol.
    pub lookback_days: i64,
    /// Worker threads for per-symbol work; 0 lets rayon decide.
    pub workers: usize,
    pub bb_squeeze_threshold: f64,
    /// Restricts the universe when set.
    pub symbols: Option<Vec<String>>,
    pub rrg: RrgConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            source: DataSource::Sqlite,
            csv_dir: None,
            sqlite_path: PathBuf::from(DEFAULT_SQLITE_PATH),
            sqlite_pool_size: DEFAULT_POOL_SIZE as u32,
            postgres_connection_string: None,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            workers: 0,
            bb_squeeze_threshold: DEFAULT_SQUEEZE_THRESHOLD,
            symbols: None,
            rrg: RrgConfig {
                enabled: true,
                benchmark: DEFAULT_BENCHMARK.to_string(),
                indices: None,
                lookback_days: DEFAULT_RRG_LOOKBACK_DAYS,
                params: RrgParams::default(),
            },
        }
    }
}

impl EngineConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, StagescanError> {
        let source = parse_source(config)?;
        let csv_dir = non_empty(config.get_string("data", "csv_dir")).map(PathBuf::from);
        if source == DataSource::Csv && csv_dir.is_none() {
            return Err(StagescanError::ConfigMissing {
                section: "data".into(),
                key: "csv_dir".into(),
            });
        }

        let postgres_connection_string = non_empty(config.get_string("postgres", "connection_string"));
        if source == DataSource::Postgres && postgres_connection_string.is_none() {
            return Err(StagescanError::ConfigMissing {
                section: "postgres".into(),
                key: "connection_string".into(),
            });
        }

        let sqlite_path = non_empty(config.get_string("sqlite", "path"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SQLITE_PATH));
        let sqlite_pool_size = positive_int(config, "sqlite", "pool_size", DEFAULT_POOL_SIZE)? as u32;

        let lookback_days = positive_int(config, "engine", "lookback_days", DEFAULT_LOOKBACK_DAYS)?;
        let workers = config.get_int("engine", "workers", 0);
        if workers < 0 {
            return Err(invalid("engine", "workers", "workers must be non-negative"));
        }
        let bb_squeeze_threshold =
            config.get_double("engine", "bb_squeeze_threshold", DEFAULT_SQUEEZE_THRESHOLD);
        if !bb_squeeze_threshold.is_finite() || bb_squeeze_threshold <= 0.0 {
            return Err(invalid(
                "engine",
                "bb_squeeze_threshold",
                "bb_squeeze_threshold must be positive",
            ));
        }

        let symbols = match non_empty(config.get_string("engine", "symbols")) {
            Some(list) => Some(parse_symbols(&list).map_err(|e| {
                invalid("engine", "symbols", &e.to_string())
            })?),
            None => None,
        };

        Ok(Self {
            source,
            csv_dir,
            sqlite_path,
            sqlite_pool_size,
            postgres_connection_string,
            lookback_days,
            workers: workers as usize,
            bb_squeeze_threshold,
            symbols,
            rrg: parse_rrg(config)?,
        })
    }
}

fn parse_source(config: &dyn ConfigPort) -> Result<DataSource, StagescanError> {
    match non_empty(config.get_string("data", "source"))
        .map(|s| s.to_ascii_lowercase())
        .as_deref()
    {
        None | Some("sqlite") => Ok(DataSource::Sqlite),
        Some("csv") => Ok(DataSource::Csv),
        Some("postgres") => Ok(DataSource::Postgres),
        Some(other) => Err(invalid(
            "data",
            "source",
            &format!("unknown source '{}', expected sqlite, csv or postgres", other),
        )),
    }
}

fn parse_rrg(config: &dyn ConfigPort) -> Result<RrgConfig, StagescanError> {
    let defaults = RrgParams::default();
    let benchmark = non_empty(config.get_string("rrg", "benchmark"))
        .unwrap_or_else(|| DEFAULT_BENCHMARK.to_string());
    let indices = non_empty(config.get_string("rrg", "indices")).map(|list| {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>()
    });

    let window = positive_int(config, "rrg", "window", defaults.window as i64)?;
    if window < 2 {
        return Err(invalid("rrg", "window", "window must be at least 2"));
    }

    Ok(RrgConfig {
        enabled: config.get_bool("rrg", "enabled", true),
        benchmark,
        indices,
        lookback_days: positive_int(config, "rrg", "lookback_days", DEFAULT_RRG_LOOKBACK_DAYS)?,
        params: RrgParams {
            window: window as usize,
            smoothing: positive_int(config, "rrg", "smoothing", defaults.smoothing as i64)? as usize,
            tail_daily: positive_int(config, "rrg", "tail_daily", defaults.tail_daily as i64)? as usize,
            tail_weekly: positive_int(config, "rrg", "tail_weekly", defaults.tail_weekly as i64)?
                as usize,
            tail_monthly: positive_int(config, "rrg", "tail_monthly", defaults.tail_monthly as i64)?
                as usize,
        },
    })
}

fn positive_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, StagescanError> {
    let value = config.get_int(section, key, default);
    if value <= 0 {
        return Err(invalid(section, key, &format!("{} must be positive", key)));
    }
    Ok(value)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn invalid(section: &str, key: &str, reason: &str) -> StagescanError {
    StagescanError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
