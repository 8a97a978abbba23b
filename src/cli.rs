//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::domain::config_validation::{DataSource, EngineConfig};
use crate::domain::engine;
use crate::domain::error::StagescanError;
use crate::domain::index_returns::{self, IndexReturn, ReturnPeriod};
use crate::domain::metric_row::DailyMetricRow;
use crate::domain::rrg::{RrgPoint, Timeframe};
use crate::domain::screener::{
    self, parse_overrides, IndustryGroup, ScreenOptions, ScreenerResult, ScreenerSpec,
};
use crate::ports::data_port::SeriesStorePort;
use crate::ports::metric_port::MetricStorePort;

#[derive(Parser, Debug)]
#[command(
    name = "stagescan",
    about = "Daily indicator engine, market breadth and screeners"
)]
pub struct Cli {
    /// Raise log verbosity (-v debug, -vv trace); RUST_LOG wins when set
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute and commit every metric for one trading date
    Compute {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        date: NaiveDate,
    },
    /// Run a screener over committed rows
    Screen {
        #[arg(short, long)]
        config: PathBuf,
        /// Screener name (see list-screeners)
        name: String,
        /// Defaults to the latest committed date
        #[arg(short, long)]
        date: Option<NaiveDate>,
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
        #[arg(long)]
        min_market_cap: Option<f64>,
        /// Threshold override, e.g. --set min_rvol=2.5
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Show the breadth snapshot and stage distribution
    Breadth {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        date: Option<NaiveDate>,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Rank industries by mean VARS
    Industries {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        date: Option<NaiveDate>,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Show committed RRG tails
    Rrg {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        date: Option<NaiveDate>,
        #[arg(short, long, default_value = "daily")]
        timeframe: Timeframe,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Trailing index returns over calendar periods
    Returns {
        #[arg(short, long)]
        config: PathBuf,
        /// Index name; every stored index when omitted
        #[arg(short, long)]
        index: Option<String>,
        /// End date; defaults to each index's latest bar
        #[arg(short, long)]
        date: Option<NaiveDate>,
        /// Period such as 1w, 3m, 1y, ytd or inception; all when omitted
        #[arg(short, long = "period")]
        periods: Vec<ReturnPeriod>,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Show the run report for a date
    Report {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List screeners and their default thresholds
    ListScreeners,
    /// Show what the series and metric stores hold
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Compute { config, date } => run_compute(&config, date),
        Command::Screen {
            config,
            name,
            date,
            limit,
            min_market_cap,
            overrides,
            format,
        } => run_screen(
            &config,
            &name,
            date,
            ScreenOptions {
                limit: Some(limit),
                min_market_cap,
            },
            &overrides,
            format,
        ),
        Command::Breadth {
            config,
            date,
            format,
        } => run_breadth(&config, date, format),
        Command::Industries {
            config,
            date,
            limit,
            format,
        } => run_industries(&config, date, limit, format),
        Command::Rrg {
            config,
            date,
            timeframe,
            format,
        } => run_rrg(&config, date, timeframe, format),
        Command::Returns {
            config,
            index,
            date,
            periods,
            format,
        } => run_returns(&config, index.as_deref(), date, &periods, format),
        Command::Report { config, date } => run_report(&config, date),
        Command::Validate { config } => run_validate(&config),
        Command::ListScreeners => {
            list_screeners();
            Ok(())
        }
        Command::Info { config, symbol } => run_info(&config, symbol.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_engine_config(path: &Path) -> Result<EngineConfig, StagescanError> {
    info!(path = %path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(path)?;
    EngineConfig::from_config(&adapter)
}

/// The committed-metric store. Always SQLite.
pub fn open_metric_store(config: &EngineConfig) -> Result<SqliteAdapter, StagescanError> {
    let store = SqliteAdapter::from_config(config)?;
    store.initialize_schema()?;
    Ok(store)
}

pub fn open_series_store(
    config: &EngineConfig,
) -> Result<Box<dyn SeriesStorePort>, StagescanError> {
    match config.source {
        DataSource::Sqlite => Ok(Box::new(open_metric_store(config)?)),
        DataSource::Csv => {
            let dir = config
                .csv_dir
                .clone()
                .ok_or_else(|| StagescanError::ConfigMissing {
                    section: "data".into(),
                    key: "csv_dir".into(),
                })?;
            Ok(Box::new(CsvAdapter::new(dir)))
        }
        DataSource::Postgres => open_postgres(config),
    }
}

#[cfg(feature = "postgres")]
fn open_postgres(config: &EngineConfig) -> Result<Box<dyn SeriesStorePort>, StagescanError> {
    use crate::adapters::postgres_adapter::PostgresAdapter;
    Ok(Box::new(PostgresAdapter::from_config(config)?))
}

#[cfg(not(feature = "postgres"))]
fn open_postgres(_config: &EngineConfig) -> Result<Box<dyn SeriesStorePort>, StagescanError> {
    Err(StagescanError::ConfigInvalid {
        section: "data".into(),
        key: "source".into(),
        reason: "postgres source requires the postgres feature".into(),
    })
}

fn run_compute(config_path: &Path, date: NaiveDate) -> Result<(), StagescanError> {
    let config = load_engine_config(config_path)?;
    let series = open_series_store(&config)?;
    let metrics = open_metric_store(&config)?;
    let report = engine::run_date(series.as_ref(), &metrics, &config, date)?;
    print!("{report}");
    Ok(())
}

fn run_screen(
    config_path: &Path,
    name: &str,
    date: Option<NaiveDate>,
    options: ScreenOptions,
    overrides: &[String],
    format: OutputFormat,
) -> Result<(), StagescanError> {
    let spec = ScreenerSpec::from_name_and_overrides(name, &parse_overrides(overrides)?)?;
    let config = load_engine_config(config_path)?;
    let metrics = open_metric_store(&config)?;
    let result = screener::run_screener(&metrics, &spec, date, &options)?;
    match format {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Table => {
            print!("{}", format_screener_table(&spec, &result));
            Ok(())
        }
    }
}

fn run_breadth(
    config_path: &Path,
    date: Option<NaiveDate>,
    format: OutputFormat,
) -> Result<(), StagescanError> {
    let config = load_engine_config(config_path)?;
    let metrics = open_metric_store(&config)?;
    let date = screener::resolve_date(&metrics, date)?;
    let snapshot = metrics
        .load_snapshot(date)?
        .ok_or(StagescanError::NotComputed { date })?;

    if format == OutputFormat::Json {
        return print_json(&snapshot);
    }

    println!("Breadth for {} ({} symbols)", snapshot.date, snapshot.total);
    println!(
        "  advancing {}  declining {}  unchanged {}  ratio {}",
        snapshot.up_count,
        snapshot.down_count,
        snapshot.unchanged_count,
        opt(snapshot.up_down_ratio, 2)
    );
    println!(
        "  above SMA20 {}%  SMA50 {}%  SMA200 {}%",
        opt(snapshot.above_sma20_percent, 1),
        opt(snapshot.above_sma50_percent, 1),
        opt(snapshot.above_sma200_percent, 1)
    );
    println!(
        "  new 20d highs {}  lows {}  ratio {}",
        snapshot.new_20d_highs,
        snapshot.new_20d_lows,
        opt(snapshot.high_low_ratio, 2)
    );
    println!(
        "  RANA {:.4}  McClellan oscillator {:.4}  summation {:.4}",
        snapshot.rana, snapshot.mcclellan_oscillator, snapshot.mcclellan_summation
    );
    println!("\n  stage  count  percent  avg range/ATR%  tight");
    for b in &snapshot.stage_distribution {
        println!(
            "  {:<5}  {:>5}  {:>6.1}%  {:>14}  {:>5}",
            b.stage.as_str(),
            b.count,
            b.percent,
            opt(b.avg_range_atr_percent, 1),
            b.tight_count
        );
    }
    Ok(())
}

fn run_industries(
    config_path: &Path,
    date: Option<NaiveDate>,
    limit: usize,
    format: OutputFormat,
) -> Result<(), StagescanError> {
    let config = load_engine_config(config_path)?;
    let metrics = open_metric_store(&config)?;
    let (date, groups) = screener::run_leading_industries(&metrics, date, Some(limit))?;
    match format {
        OutputFormat::Json => print_json(&groups),
        OutputFormat::Table => {
            print!("{}", format_industries(date, &groups));
            Ok(())
        }
    }
}

fn run_rrg(
    config_path: &Path,
    date: Option<NaiveDate>,
    timeframe: Timeframe,
    format: OutputFormat,
) -> Result<(), StagescanError> {
    let config = load_engine_config(config_path)?;
    let metrics = open_metric_store(&config)?;
    let date = screener::resolve_date(&metrics, date)?;
    if metrics.load_snapshot(date)?.is_none() {
        return Err(StagescanError::NotComputed { date });
    }
    let points = metrics.load_rrg_tail(date, timeframe)?;
    match format {
        OutputFormat::Json => print_json(&points),
        OutputFormat::Table => {
            print!("{}", format_rrg(date, timeframe, &points));
            Ok(())
        }
    }
}

fn run_returns(
    config_path: &Path,
    index: Option<&str>,
    date: Option<NaiveDate>,
    periods: &[ReturnPeriod],
    format: OutputFormat,
) -> Result<(), StagescanError> {
    let config = load_engine_config(config_path)?;
    let series = open_series_store(&config)?;
    let periods = if periods.is_empty() {
        &ReturnPeriod::ALL[..]
    } else {
        periods
    };
    let indices = match index {
        Some(name) => vec![name.to_string()],
        None => series.list_indices()?,
    };

    let mut returns = Vec::new();
    for name in &indices {
        returns.extend(index_returns::index_returns(
            series.as_ref(),
            name,
            date,
            periods,
        )?);
    }
    match format {
        OutputFormat::Json => print_json(&returns),
        OutputFormat::Table => {
            print!("{}", format_returns(&returns));
            Ok(())
        }
    }
}

fn run_report(config_path: &Path, date: Option<NaiveDate>) -> Result<(), StagescanError> {
    let config = load_engine_config(config_path)?;
    let metrics = open_metric_store(&config)?;
    let date = screener::resolve_date(&metrics, date)?;
    let report = metrics
        .load_run_report(date)?
        .ok_or(StagescanError::NotComputed { date })?;
    print!("{report}");
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), StagescanError> {
    let config = load_engine_config(config_path)?;
    println!("Config valid: {}", config_path.display());
    println!("  source:        {:?}", config.source);
    println!("  metric store:  {}", config.sqlite_path.display());
    println!("  lookback:      {} days", config.lookback_days);
    match &config.symbols {
        Some(symbols) => println!("  universe:      {} configured symbols", symbols.len()),
        None => println!("  universe:      every symbol in the store"),
    }
    if config.rrg.enabled {
        println!(
            "  rrg:           benchmark {}, window {}, smoothing {}",
            config.rrg.benchmark, config.rrg.params.window, config.rrg.params.smoothing
        );
    } else {
        println!("  rrg:           disabled");
    }
    Ok(())
}

fn list_screeners() {
    for name in ScreenerSpec::NAMES {
        if let Some(spec) = ScreenerSpec::default_for(name) {
            println!("{:<20} {}", name, spec.describe());
        }
    }
}

fn run_info(config_path: &Path, symbol: Option<&str>) -> Result<(), StagescanError> {
    let config = load_engine_config(config_path)?;
    let series = open_series_store(&config)?;

    if let Some(symbol) = symbol {
        let symbol = symbol.to_uppercase();
        match series.data_range(&symbol)? {
            Some((first, last, count)) => println!("{symbol}: {count} bars, {first} to {last}"),
            None => println!("{symbol}: no data"),
        }
        return Ok(());
    }

    let metrics = open_metric_store(&config)?;
    println!("symbols:        {}", series.list_symbols()?.len());
    println!("indices:        {}", series.list_indices()?.len());
    match metrics.latest_committed_date()? {
        Some(date) => println!("latest commit:  {date}"),
        None => println!("latest commit:  none"),
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), StagescanError> {
    let text = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    println!("{text}");
    Ok(())
}

fn opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{v:.precision$}"),
        None => "-".to_string(),
    }
}

fn row_line(row: &DailyMetricRow) -> String {
    format!(
        "{:<14} {:>10.2} {:>7} {:>7} {:>7} {:>6} {:>5} {:>6}",
        row.symbol,
        row.close,
        opt(row.change_1d_percent, 2),
        opt(row.change_1w_percent, 2),
        opt(row.rs_percentile, 1),
        opt(row.rvol, 2),
        row.stage.as_str(),
        opt(row.atr_extension_from_sma50, 2)
    )
}

pub fn format_screener_table(spec: &ScreenerSpec, result: &ScreenerResult) -> String {
    let mut out = format!(
        "{} on {}: {} matches ({})\n",
        result.screener,
        result.date,
        result.total_matches,
        spec.describe()
    );
    out.push_str(&format!(
        "{:<14} {:>10} {:>7} {:>7} {:>7} {:>6} {:>5} {:>6}\n",
        "symbol", "close", "1d%", "1w%", "rs", "rvol", "stage", "ext"
    ));
    for row in &result.rows {
        out.push_str(&row_line(row));
        out.push('\n');
    }
    out
}

pub fn format_industries(date: NaiveDate, groups: &[IndustryGroup]) -> String {
    let mut out = format!("Leading industries on {date}\n");
    for g in groups {
        let members: Vec<String> = g
            .top_members
            .iter()
            .map(|(s, c)| format!("{s} {c:+.1}%"))
            .collect();
        out.push_str(&format!(
            "{:<32} {:>4} {:>8}  {}\n",
            g.industry,
            g.member_count,
            opt(g.avg_vars, 2),
            members.join(", ")
        ));
    }
    out
}

pub fn format_returns(returns: &[IndexReturn]) -> String {
    let mut out = format!(
        "{:<24} {:<9} {:<10} {:<10} {:>9}\n",
        "index", "period", "start", "end", "return%"
    );
    for r in returns {
        let start = r
            .start_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        let value = match r.return_percent {
            Some(v) => format!("{v:.2}"),
            None => r.status.as_str().to_string(),
        };
        out.push_str(&format!(
            "{:<24} {:<9} {:<10} {:<10} {:>9}\n",
            r.index,
            r.period.as_str(),
            start,
            r.end_date,
            value
        ));
    }
    out
}

pub fn format_rrg(date: NaiveDate, timeframe: Timeframe, points: &[RrgPoint]) -> String {
    let mut out = format!("RRG {timeframe} tails committed {date}\n");
    for p in points {
        out.push_str(&format!(
            "{:<24} {}  {:>8.3} {:>8.3}  {}\n",
            p.index,
            p.date,
            p.rs_ratio,
            p.rs_momentum,
            p.quadrant.as_str()
        ));
    }
    out
}
