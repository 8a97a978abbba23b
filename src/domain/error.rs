//! Domain error types.

use chrono::NaiveDate;
use std::fmt;

/// Barrier stages of a daily run. A failure in any of them aborts the whole date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BarrierStage {
    RelativeStrength,
    Breadth,
    Rrg,
    Commit,
}

impl fmt::Display for BarrierStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarrierStage::RelativeStrength => write!(f, "relative-strength"),
            BarrierStage::Breadth => write!(f, "breadth"),
            BarrierStage::Rrg => write!(f, "rrg"),
            BarrierStage::Commit => write!(f, "commit"),
        }
    }
}

/// Top-level error type for stagescan.
#[derive(Debug, thiserror::Error)]
pub enum StagescanError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("insufficient history for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientHistory {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("data integrity violation for {symbol} on {date}: {reason}")]
    DataIntegrity {
        symbol: String,
        date: NaiveDate,
        reason: String,
    },

    #[error("computation failed for {symbol}: {reason}")]
    SymbolCompute { symbol: String, reason: String },

    #[error("{stage} stage failed for {date}: {reason}")]
    BarrierStage {
        stage: BarrierStage,
        date: NaiveDate,
        reason: String,
    },

    #[error("metrics not computed for {date}")]
    NotComputed { date: NaiveDate },

    #[error("no committed metrics available")]
    NothingCommitted,

    #[error("invalid screener query: {reason}")]
    ScreenerQuery { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&StagescanError> for std::process::ExitCode {
    fn from(err: &StagescanError) -> Self {
        let code: u8 = match err {
            StagescanError::Io(_) => 1,
            StagescanError::ConfigParse { .. }
            | StagescanError::ConfigMissing { .. }
            | StagescanError::ConfigInvalid { .. } => 2,
            StagescanError::Database { .. } | StagescanError::DatabaseQuery { .. } => 3,
            StagescanError::ScreenerQuery { .. } => 4,
            StagescanError::NoData { .. }
            | StagescanError::InsufficientHistory { .. }
            | StagescanError::DataIntegrity { .. }
            | StagescanError::SymbolCompute { .. } => 5,
            StagescanError::BarrierStage { .. } => 6,
            StagescanError::NotComputed { .. } | StagescanError::NothingCommitted => 7,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn barrier_error_names_stage_and_date() {
        let err = StagescanError::BarrierStage {
            stage: BarrierStage::Rrg,
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            reason: "benchmark missing".into(),
        };
        assert_eq!(
            err.to_string(),
            "rrg stage failed for 2024-03-01: benchmark missing"
        );
    }

    #[test]
    fn not_computed_names_the_date() {
        let err = StagescanError::NotComputed {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        };
        assert_eq!(err.to_string(), "metrics not computed for 2024-03-01");
    }
}
