//! Outcome of one daily run, persisted for operators.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::error::BarrierStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Committed,
    Failed,
}

/// Where a single symbol dropped out of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolStage {
    Load,
    Integrity,
    Compute,
}

impl fmt::Display for SymbolStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolStage::Load => write!(f, "load"),
            SymbolStage::Integrity => write!(f, "integrity"),
            SymbolStage::Compute => write!(f, "compute"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolFailure {
    pub symbol: String,
    pub stage: SymbolStage,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarrierFailure {
    pub stage: BarrierStage,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub date: NaiveDate,
    pub status: RunStatus,
    pub attempted: usize,
    pub committed: usize,
    pub failures: Vec<SymbolFailure>,
    pub barrier_failure: Option<BarrierFailure>,
    pub rejected_bars: usize,
}

impl RunReport {
    pub fn new(date: NaiveDate, attempted: usize) -> Self {
        Self {
            date,
            status: RunStatus::Failed,
            attempted,
            committed: 0,
            failures: Vec::new(),
            barrier_failure: None,
            rejected_bars: 0,
        }
    }

    pub fn record_failure(&mut self, symbol: &str, stage: SymbolStage, reason: impl Into<String>) {
        self.failures.push(SymbolFailure {
            symbol: symbol.to_string(),
            stage,
            reason: reason.into(),
        });
    }

    pub fn mark_committed(&mut self, committed: usize) {
        self.status = RunStatus::Committed;
        self.committed = committed;
        self.barrier_failure = None;
    }

    pub fn mark_barrier_failed(&mut self, stage: BarrierStage, reason: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.committed = 0;
        self.barrier_failure = Some(BarrierFailure {
            stage,
            reason: reason.into(),
        });
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run for {}", self.date)?;
        let status = match self.status {
            RunStatus::Committed => "committed",
            RunStatus::Failed => "FAILED",
        };
        writeln!(f, "  status:        {}", status)?;
        writeln!(f, "  symbols:       {} attempted, {} committed", self.attempted, self.committed)?;
        writeln!(f, "  rejected bars: {}", self.rejected_bars)?;
        if let Some(b) = &self.barrier_failure {
            writeln!(f, "  barrier:       {} ({})", b.stage, b.reason)?;
        }
        if !self.failures.is_empty() {
            writeln!(f, "  skipped symbols:")?;
            for failure in &self.failures {
                writeln!(f, "    {:<16} {:<8} {}", failure.symbol, failure.stage, failure.reason)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    #[test]
    fn new_report_is_failed_until_committed() {
        let mut r = RunReport::new(date(), 3);
        assert_eq!(r.status, RunStatus::Failed);
        r.mark_committed(2);
        assert_eq!(r.status, RunStatus::Committed);
        assert_eq!(r.committed, 2);
    }

    #[test]
    fn barrier_failure_clears_committed_count() {
        let mut r = RunReport::new(date(), 3);
        r.record_failure("XYZ", SymbolStage::Compute, "rsi is not finite");
        r.mark_barrier_failed(BarrierStage::Rrg, "benchmark missing");
        assert_eq!(r.committed, 0);
        let text = r.to_string();
        assert!(text.contains("FAILED"));
        assert!(text.contains("rrg (benchmark missing)"));
        assert!(text.contains("XYZ"));
    }

    #[test]
    fn report_round_trips_through_json() {
        let mut r = RunReport::new(date(), 1);
        r.record_failure("ABC", SymbolStage::Load, "no data");
        let json = serde_json::to_string(&r).unwrap();
        let back: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
