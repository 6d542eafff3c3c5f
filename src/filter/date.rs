//! Date filtering for case tables
//!
//! Keeps rows whose Date32 column falls in an inclusive range. Rows with a
//! null date are always excluded.

use std::collections::HashSet;

use arrow::array::{BooleanArray, Date32Array};
use arrow::compute::kernels::{boolean, cmp};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;

use crate::error::util::downcast_array;
use crate::error::{Error, Result};
use crate::filter::core::{BatchFilter, filter_record_batch};
use crate::utils::arrow::cases::{column_as, date_to_days};

/// A filter that includes only rows with dates in a specified range
#[derive(Debug, Clone)]
pub struct DateRangeFilter {
    /// The name of the date column
    date_column: String,

    /// The start date (inclusive)
    start_date: Option<NaiveDate>,

    /// The end date (inclusive)
    end_date: Option<NaiveDate>,
}

impl DateRangeFilter {
    /// Create a new date range filter
    ///
    /// # Arguments
    /// * `date_column` - The name of the date column
    /// * `start_date` - Optional start date (inclusive)
    /// * `end_date` - Optional end date (inclusive)
    #[must_use]
    pub fn new(
        date_column: impl Into<String>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            date_column: date_column.into(),
            start_date,
            end_date,
        }
    }

    /// Boolean mask of the rows this filter keeps
    pub fn mask(&self, batch: &RecordBatch) -> Result<BooleanArray> {
        let dates = column_as(batch, &self.date_column, &DataType::Date32)?;
        let dates = downcast_array::<Date32Array>(&dates, &self.date_column, "Date32")?;
        let rows = batch.num_rows();

        let mut in_range = boolean::is_not_null(dates)?;

        if let Some(start) = self.start_date {
            let start_dates = Date32Array::from(vec![date_to_days(start); rows]);
            let ge_result = cmp::gt_eq(dates, &start_dates)?;
            in_range = boolean::and(&in_range, &ge_result)?;
        }

        if let Some(end) = self.end_date {
            let end_dates = Date32Array::from(vec![date_to_days(end); rows]);
            let le_result = cmp::lt_eq(dates, &end_dates)?;
            in_range = boolean::and(&in_range, &le_result)?;
        }

        // Comparisons against null dates produce nulls; treat them as "drop"
        Ok(in_range
            .iter()
            .map(|keep| Some(keep.unwrap_or(false)))
            .collect())
    }
}

impl BatchFilter for DateRangeFilter {
    fn filter(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(Error::invalid_input(format!(
                    "date range starts ({start}) after it ends ({end})"
                )));
            }
        }
        let mask = self.mask(batch)?;
        filter_record_batch(batch, &mask)
    }

    fn required_columns(&self) -> HashSet<String> {
        let mut cols = HashSet::new();
        cols.insert(self.date_column.clone());
        cols
    }
}
