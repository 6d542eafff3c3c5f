//! Outbreak window: clusters near a reference date
//!
//! A window keeps the cases dated within `half_width_days` of a reference
//! date (inclusive on both ends) and clusters only those. Ids from a windowed
//! run are local to that run and not comparable with a full run's ids.

use arrow::record_batch::RecordBatch;
use chrono::{Days, NaiveDate};
use log::info;
use serde::{Deserialize, Serialize};

use crate::algorithm::distance::day_gap;
use crate::algorithm::orchestrator::{ClusterAssignment, ClusterEngine, LabeledTable};
use crate::error::{Error, Result};
use crate::filter::core::BatchFilter;
use crate::filter::date::DateRangeFilter;
use crate::models::Case;

/// Reference date plus half-width in days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutbreakWindow {
    pub reference: NaiveDate,
    pub half_width_days: u32,
}

impl OutbreakWindow {
    #[must_use]
    pub const fn new(reference: NaiveDate, half_width_days: u32) -> Self {
        Self {
            reference,
            half_width_days,
        }
    }

    /// First date inside the window
    pub fn start(&self) -> Result<NaiveDate> {
        self.reference
            .checked_sub_days(Days::new(u64::from(self.half_width_days)))
            .ok_or_else(|| Error::invalid_input(format!("window start before {self} is out of range")))
    }

    /// Last date inside the window
    pub fn end(&self) -> Result<NaiveDate> {
        self.reference
            .checked_add_days(Days::new(u64::from(self.half_width_days)))
            .ok_or_else(|| Error::invalid_input(format!("window end after {self} is out of range")))
    }

    /// Whether `date` lies within the window
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        day_gap(date, self.reference) <= u64::from(self.half_width_days)
    }

    /// The cases dated inside the window, in input order
    #[must_use]
    pub fn filter_cases(&self, cases: &[Case]) -> Vec<Case> {
        cases.iter().filter(|c| self.contains(c.date)).cloned().collect()
    }

    /// Table filter selecting the window on `date_column`
    pub fn date_filter(&self, date_column: &str) -> Result<DateRangeFilter> {
        Ok(DateRangeFilter::new(
            date_column,
            Some(self.start()?),
            Some(self.end()?),
        ))
    }
}

impl std::fmt::Display for OutbreakWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ±{} days", self.reference, self.half_width_days)
    }
}

impl ClusterEngine {
    /// Cluster the cases inside `window`.
    ///
    /// Returns the windowed cases and their labels. An empty window returns
    /// immediately without running the clustering.
    pub fn cluster_window_cases(
        &self,
        cases: &[Case],
        window: &OutbreakWindow,
    ) -> Result<(Vec<Case>, ClusterAssignment)> {
        let subset = window.filter_cases(cases);
        if subset.is_empty() {
            info!("No cases within {window}");
            return Ok((subset, ClusterAssignment::default()));
        }
        let assignment = self.cluster_transient(&format!("Window {window}"), &subset)?;
        Ok((subset, assignment))
    }

    /// Cluster the rows of `batch` dated inside `window`
    pub fn cluster_window(&self, batch: &RecordBatch, window: &OutbreakWindow) -> Result<LabeledTable> {
        let filter = window.date_filter(&self.config().columns.date)?;
        let subset = filter.filter(batch)?;
        if subset.num_rows() == 0 {
            info!("No cases within {window}");
            return Ok(LabeledTable::empty(batch));
        }
        self.cluster_batch_transient(&format!("Window {window}"), &subset)
    }
}
