//! Persisted metric store port.
//!
//! A date is written through [`MetricStorePort::commit_date`] as one unit:
//! readers see either the whole previous state of that date or the whole new one.

use chrono::NaiveDate;

use crate::domain::breadth::{McClellanState, UniverseSnapshot};
use crate::domain::error::StagescanError;
use crate::domain::metric_row::DailyMetricRow;
use crate::domain::rrg::{RrgPoint, Timeframe};
use crate::domain::run_report::RunReport;

/// Everything produced for one date.
#[derive(Debug, Clone)]
pub struct DateCommit {
    pub date: NaiveDate,
    pub rows: Vec<DailyMetricRow>,
    pub snapshot: UniverseSnapshot,
    pub mcclellan: McClellanState,
    pub rrg_points: Vec<RrgPoint>,
    pub report: RunReport,
}

pub trait MetricStorePort {
    /// Replaces every row, the snapshot, the McClellan state and the RRG points
    /// of `commit.date` atomically.
    fn commit_date(&self, commit: &DateCommit) -> Result<(), StagescanError>;

    /// Stores a report without touching committed data (used for failed runs).
    fn record_run_report(&self, report: &RunReport) -> Result<(), StagescanError>;

    /// Committed rows for `date`, or `None` if the date was never committed.
    fn load_rows(&self, date: NaiveDate) -> Result<Option<Vec<DailyMetricRow>>, StagescanError>;

    fn latest_committed_date(&self) -> Result<Option<NaiveDate>, StagescanError>;

    fn load_snapshot(&self, date: NaiveDate) -> Result<Option<UniverseSnapshot>, StagescanError>;

    /// Latest accumulator strictly before `date`.
    fn mcclellan_state_before(
        &self,
        date: NaiveDate,
    ) -> Result<Option<McClellanState>, StagescanError>;

    /// RRG tail committed for `date`, ordered by index then point date.
    fn load_rrg_tail(
        &self,
        date: NaiveDate,
        timeframe: Timeframe,
    ) -> Result<Vec<RrgPoint>, StagescanError>;

    fn load_run_report(&self, date: NaiveDate) -> Result<Option<RunReport>, StagescanError>;
}
