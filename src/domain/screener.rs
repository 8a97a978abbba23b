//! Screener filter/ranker over committed metric rows.
//!
//! Each screener is a [`ScreenerSpec`] variant carrying its own typed
//! thresholds. Results are ordered by the screener's sort key with the symbol
//! as the tie-breaker, so the same rows always come back in the same order.

use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::breadth::{StageBucket, UniverseSnapshot};
use crate::domain::error::StagescanError;
use crate::domain::indicator::adx::TrendDirection;
use crate::domain::metric_row::DailyMetricRow;
use crate::ports::metric_port::MetricStorePort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Both,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "both" => Ok(Direction::Both),
            other => Err(format!("expected up, down or both, got '{}'", other)),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
            Direction::Both => write!(f, "both"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScreenerSpec {
    Breakouts4Percent { min_change: f64, min_rvol: f64 },
    RsLeaders { min_rs: f64, min_stage: u8 },
    HighVolume { min_rvol: f64 },
    MaStacked { min_vcp: u8, stage: u8 },
    WeeklyMovers { min_change: f64, direction: Direction },
    MomentumWatchlist { min_rs: f64, max_extension: f64, min_stage: u8 },
    RsiOversold { max_rsi: f64 },
    BbSqueeze { max_bandwidth: f64 },
    StrongTrend { min_adx: f64, bullish_only: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortOrder {
    Ascending,
    Descending,
}

impl ScreenerSpec {
    pub const NAMES: [&'static str; 9] = [
        "breakouts-4percent",
        "rs-leaders",
        "high-volume",
        "ma-stacked",
        "weekly-movers",
        "momentum-watchlist",
        "rsi-oversold",
        "bb-squeeze",
        "strong-trend",
    ];

    pub fn default_for(name: &str) -> Option<Self> {
        let spec = match name {
            "breakouts-4percent" => ScreenerSpec::Breakouts4Percent {
                min_change: 4.0,
                min_rvol: 1.5,
            },
            "rs-leaders" => ScreenerSpec::RsLeaders {
                min_rs: 97.0,
                min_stage: 2,
            },
            "high-volume" => ScreenerSpec::HighVolume { min_rvol: 2.0 },
            "ma-stacked" => ScreenerSpec::MaStacked {
                min_vcp: 2,
                stage: 2,
            },
            "weekly-movers" => ScreenerSpec::WeeklyMovers {
                min_change: 20.0,
                direction: Direction::Both,
            },
            "momentum-watchlist" => ScreenerSpec::MomentumWatchlist {
                min_rs: 70.0,
                max_extension: 7.0,
                min_stage: 2,
            },
            "rsi-oversold" => ScreenerSpec::RsiOversold { max_rsi: 30.0 },
            "bb-squeeze" => ScreenerSpec::BbSqueeze {
                max_bandwidth: 10.0,
            },
            "strong-trend" => ScreenerSpec::StrongTrend {
                min_adx: 25.0,
                bullish_only: true,
            },
            _ => return None,
        };
        Some(spec)
    }

    /// Builds a screener from its name and `key=value` threshold overrides.
    pub fn from_name_and_overrides(
        name: &str,
        overrides: &[(String, String)],
    ) -> Result<Self, StagescanError> {
        let mut spec = Self::default_for(name).ok_or_else(|| StagescanError::ScreenerQuery {
            reason: format!("unknown screener '{}'", name),
        })?;
        for (key, value) in overrides {
            spec.apply_override(key.trim(), value.trim())?;
        }
        Ok(spec)
    }

    fn apply_override(&mut self, key: &str, value: &str) -> Result<(), StagescanError> {
        let name = self.name();
        match (self, key) {
            (ScreenerSpec::Breakouts4Percent { min_change, .. }, "min_change")
            | (ScreenerSpec::WeeklyMovers { min_change, .. }, "min_change") => {
                *min_change = parse_value(name, key, value)?
            }
            (ScreenerSpec::Breakouts4Percent { min_rvol, .. }, "min_rvol")
            | (ScreenerSpec::HighVolume { min_rvol }, "min_rvol") => {
                *min_rvol = parse_value(name, key, value)?
            }
            (ScreenerSpec::RsLeaders { min_rs, .. }, "min_rs")
            | (ScreenerSpec::MomentumWatchlist { min_rs, .. }, "min_rs") => {
                *min_rs = parse_value(name, key, value)?
            }
            (ScreenerSpec::RsLeaders { min_stage, .. }, "min_stage")
            | (ScreenerSpec::MomentumWatchlist { min_stage, .. }, "min_stage") => {
                *min_stage = parse_stage(name, key, value)?
            }
            (ScreenerSpec::MaStacked { min_vcp, .. }, "min_vcp") => {
                *min_vcp = parse_value(name, key, value)?
            }
            (ScreenerSpec::MaStacked { stage, .. }, "stage") => {
                *stage = parse_stage(name, key, value)?
            }
            (ScreenerSpec::WeeklyMovers { direction, .. }, "direction") => {
                *direction = parse_value(name, key, value)?
            }
            (ScreenerSpec::MomentumWatchlist { max_extension, .. }, "max_extension") => {
                *max_extension = parse_value(name, key, value)?
            }
            (ScreenerSpec::RsiOversold { max_rsi }, "max_rsi") => {
                *max_rsi = parse_value(name, key, value)?
            }
            (ScreenerSpec::BbSqueeze { max_bandwidth }, "max_bandwidth") => {
                *max_bandwidth = parse_value(name, key, value)?
            }
            (ScreenerSpec::StrongTrend { min_adx, .. }, "min_adx") => {
                *min_adx = parse_value(name, key, value)?
            }
            (ScreenerSpec::StrongTrend { bullish_only, .. }, "bullish_only") => {
                *bullish_only = parse_value(name, key, value)?
            }
            _ => {
                return Err(StagescanError::ScreenerQuery {
                    reason: format!("{} has no threshold '{}'", name, key),
                });
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScreenerSpec::Breakouts4Percent { .. } => "breakouts-4percent",
            ScreenerSpec::RsLeaders { .. } => "rs-leaders",
            ScreenerSpec::HighVolume { .. } => "high-volume",
            ScreenerSpec::MaStacked { .. } => "ma-stacked",
            ScreenerSpec::WeeklyMovers { .. } => "weekly-movers",
            ScreenerSpec::MomentumWatchlist { .. } => "momentum-watchlist",
            ScreenerSpec::RsiOversold { .. } => "rsi-oversold",
            ScreenerSpec::BbSqueeze { .. } => "bb-squeeze",
            ScreenerSpec::StrongTrend { .. } => "strong-trend",
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ScreenerSpec::Breakouts4Percent {
                min_change,
                min_rvol,
            } => format!("1d change >= {min_change}% on rvol >= {min_rvol}"),
            ScreenerSpec::RsLeaders { min_rs, min_stage } => {
                format!("rs >= {min_rs} in stage >= {min_stage}, by VARS")
            }
            ScreenerSpec::HighVolume { min_rvol } => format!("rvol >= {min_rvol}"),
            ScreenerSpec::MaStacked { min_vcp, stage } => {
                format!("8 > 21 > 50 > 200 SMA, vcp >= {min_vcp}, stage {stage}")
            }
            ScreenerSpec::WeeklyMovers {
                min_change,
                direction,
            } => format!("|1w change| >= {min_change}% ({direction})"),
            ScreenerSpec::MomentumWatchlist {
                min_rs,
                max_extension,
                min_stage,
            } => format!("rs >= {min_rs}, stage >= {min_stage}, extension <= {max_extension} ATR"),
            ScreenerSpec::RsiOversold { max_rsi } => format!("rsi < {max_rsi}"),
            ScreenerSpec::BbSqueeze { max_bandwidth } => {
                format!("bollinger squeeze, bandwidth <= {max_bandwidth}%")
            }
            ScreenerSpec::StrongTrend {
                min_adx,
                bullish_only,
            } => {
                if *bullish_only {
                    format!("adx > {min_adx}, bullish")
                } else {
                    format!("adx > {min_adx}")
                }
            }
        }
    }

    pub fn matches(&self, row: &DailyMetricRow) -> bool {
        let major = row.stage.major();
        match *self {
            ScreenerSpec::Breakouts4Percent {
                min_change,
                min_rvol,
            } => at_least(row.change_1d_percent, min_change) && at_least(row.rvol, min_rvol),
            ScreenerSpec::RsLeaders { min_rs, min_stage } => {
                at_least(row.rs_percentile, min_rs) && major >= min_stage
            }
            ScreenerSpec::HighVolume { min_rvol } => at_least(row.rvol, min_rvol),
            ScreenerSpec::MaStacked { min_vcp, stage } => {
                row.is_ma_stacked && row.vcp_score.is_some_and(|v| v >= min_vcp) && major == stage
            }
            ScreenerSpec::WeeklyMovers {
                min_change,
                direction,
            } => row.change_1w_percent.is_some_and(|c| match direction {
                Direction::Up => c >= min_change,
                Direction::Down => c <= -min_change,
                Direction::Both => c.abs() >= min_change,
            }),
            ScreenerSpec::MomentumWatchlist {
                min_rs,
                max_extension,
                min_stage,
            } => {
                at_least(row.rs_percentile, min_rs)
                    && major >= min_stage
                    && row.atr_extension_from_sma50.is_some_and(|e| e <= max_extension)
            }
            ScreenerSpec::RsiOversold { max_rsi } => row.rsi_14.is_some_and(|r| r < max_rsi),
            ScreenerSpec::BbSqueeze { max_bandwidth } => {
                row.is_bb_squeeze == Some(true)
                    && row.bb_bandwidth_percent.is_some_and(|bw| bw <= max_bandwidth)
            }
            ScreenerSpec::StrongTrend {
                min_adx,
                bullish_only,
            } => {
                row.adx_14.is_some_and(|a| a > min_adx)
                    && (!bullish_only || row.trend_direction == Some(TrendDirection::Bullish))
            }
        }
    }

    fn sort_key(&self, row: &DailyMetricRow) -> Option<f64> {
        match self {
            ScreenerSpec::Breakouts4Percent { .. } => row.change_1d_percent,
            ScreenerSpec::RsLeaders { .. } => row.vars_score,
            ScreenerSpec::HighVolume { .. } => row.rvol,
            ScreenerSpec::MaStacked { .. } => row.rs_percentile,
            ScreenerSpec::WeeklyMovers { .. } => row.change_1w_percent.map(f64::abs),
            ScreenerSpec::MomentumWatchlist { .. } => row.atr_extension_from_sma50,
            ScreenerSpec::RsiOversold { .. } => row.rsi_14,
            ScreenerSpec::BbSqueeze { .. } => row.bb_bandwidth_percent,
            ScreenerSpec::StrongTrend { .. } => row.adx_14,
        }
    }

    fn sort_order(&self) -> SortOrder {
        match self {
            ScreenerSpec::MomentumWatchlist { .. }
            | ScreenerSpec::RsiOversold { .. }
            | ScreenerSpec::BbSqueeze { .. } => SortOrder::Ascending,
            _ => SortOrder::Descending,
        }
    }
}

fn at_least(value: Option<f64>, min: f64) -> bool {
    value.is_some_and(|v| v >= min)
}

fn parse_value<T: FromStr>(screener: &str, key: &str, value: &str) -> Result<T, StagescanError> {
    value.parse::<T>().map_err(|_| StagescanError::ScreenerQuery {
        reason: format!("{}: invalid value '{}' for {}", screener, value, key),
    })
}

fn parse_stage(screener: &str, key: &str, value: &str) -> Result<u8, StagescanError> {
    let stage: u8 = parse_value(screener, key, value)?;
    if (1..=4).contains(&stage) {
        Ok(stage)
    } else {
        Err(StagescanError::ScreenerQuery {
            reason: format!("{}: {} must be between 1 and 4", screener, key),
        })
    }
}

/// Parses `key=value` tokens into override pairs.
pub fn parse_overrides(tokens: &[String]) -> Result<Vec<(String, String)>, StagescanError> {
    tokens
        .iter()
        .map(|t| {
            t.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .filter(|(k, _)| !k.is_empty())
                .ok_or_else(|| StagescanError::ScreenerQuery {
                    reason: format!("expected key=value, got '{}'", t),
                })
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScreenOptions {
    pub limit: Option<usize>,
    pub min_market_cap: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScreenerResult {
    pub screener: String,
    pub date: NaiveDate,
    pub total_matches: usize,
    pub rows: Vec<DailyMetricRow>,
}

/// Filters and orders `rows`. Rows lacking the sort key sort last.
pub fn screen_rows(
    spec: &ScreenerSpec,
    rows: &[DailyMetricRow],
    options: &ScreenOptions,
) -> Vec<DailyMetricRow> {
    let mut matched: Vec<&DailyMetricRow> = rows
        .iter()
        .filter(|r| match options.min_market_cap {
            Some(min) => r.market_cap.is_some_and(|cap| cap >= min),
            None => true,
        })
        .filter(|r| spec.matches(r))
        .collect();

    let order = spec.sort_order();
    matched.sort_by(|a, b| {
        let by_key = match (spec.sort_key(a), spec.sort_key(b)) {
            (Some(x), Some(y)) => match order {
                SortOrder::Ascending => x.total_cmp(&y),
                SortOrder::Descending => y.total_cmp(&x),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_key.then_with(|| a.symbol.cmp(&b.symbol))
    });

    matched.into_iter().cloned().collect()
}

/// Resolves the requested date, or the latest committed one.
pub fn resolve_date(
    store: &dyn MetricStorePort,
    date: Option<NaiveDate>,
) -> Result<NaiveDate, StagescanError> {
    match date {
        Some(d) => Ok(d),
        None => store
            .latest_committed_date()?
            .ok_or(StagescanError::NothingCommitted),
    }
}

fn committed_rows(
    store: &dyn MetricStorePort,
    date: NaiveDate,
) -> Result<Vec<DailyMetricRow>, StagescanError> {
    store
        .load_rows(date)?
        .ok_or(StagescanError::NotComputed { date })
}

pub fn run_screener(
    store: &dyn MetricStorePort,
    spec: &ScreenerSpec,
    date: Option<NaiveDate>,
    options: &ScreenOptions,
) -> Result<ScreenerResult, StagescanError> {
    let date = resolve_date(store, date)?;
    let rows = committed_rows(store, date)?;
    let mut matched = screen_rows(spec, &rows, options);
    let total_matches = matched.len();
    if let Some(limit) = options.limit {
        matched.truncate(limit);
    }
    Ok(ScreenerResult {
        screener: spec.name().to_string(),
        date,
        total_matches,
        rows: matched,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct StageAnalysis {
    pub date: NaiveDate,
    pub total: usize,
    pub buckets: Vec<StageBucket>,
}

pub fn stage_analysis(
    store: &dyn MetricStorePort,
    date: Option<NaiveDate>,
) -> Result<StageAnalysis, StagescanError> {
    let date = resolve_date(store, date)?;
    let snapshot: UniverseSnapshot = store
        .load_snapshot(date)?
        .ok_or(StagescanError::NotComputed { date })?;
    Ok(StageAnalysis {
        date,
        total: snapshot.total,
        buckets: snapshot.stage_distribution,
    })
}

pub const INDUSTRY_TOP_MEMBERS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndustryGroup {
    pub industry: String,
    pub member_count: usize,
    pub avg_vars: Option<f64>,
    /// (symbol, 1-month change), best first.
    pub top_members: Vec<(String, f64)>,
}

/// Groups rows by industry, ranked by the mean VARS of their members.
pub fn leading_industries(rows: &[DailyMetricRow]) -> Vec<IndustryGroup> {
    let mut groups: BTreeMap<&str, Vec<&DailyMetricRow>> = BTreeMap::new();
    for row in rows {
        if let Some(industry) = row.industry.as_deref() {
            groups.entry(industry).or_default().push(row);
        }
    }

    let mut out: Vec<IndustryGroup> = groups
        .into_iter()
        .map(|(industry, members)| {
            let vars: Vec<f64> = members.iter().filter_map(|r| r.vars_score).collect();
            let mut top: Vec<(String, f64)> = members
                .iter()
                .filter_map(|r| r.change_1m_percent.map(|c| (r.symbol.clone(), c)))
                .collect();
            top.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            top.truncate(INDUSTRY_TOP_MEMBERS);
            IndustryGroup {
                industry: industry.to_string(),
                member_count: members.len(),
                avg_vars: if vars.is_empty() {
                    None
                } else {
                    Some(vars.iter().sum::<f64>() / vars.len() as f64)
                },
                top_members: top,
            }
        })
        .collect();

    out.sort_by(|a, b| match (a.avg_vars, b.avg_vars) {
        (Some(x), Some(y)) => y.total_cmp(&x).then_with(|| a.industry.cmp(&b.industry)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.industry.cmp(&b.industry),
    });
    out
}

pub fn run_leading_industries(
    store: &dyn MetricStorePort,
    date: Option<NaiveDate>,
    limit: Option<usize>,
) -> Result<(NaiveDate, Vec<IndustryGroup>), StagescanError> {
    let date = resolve_date(store, date)?;
    let rows = committed_rows(store, date)?;
    let mut groups = leading_industries(&rows);
    if let Some(limit) = limit {
        groups.truncate(limit);
    }
    Ok((date, groups))
}
