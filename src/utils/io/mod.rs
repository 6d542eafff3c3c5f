//! IO utilities for case tables and published artifacts
//!
//! Tables are read from and written to Parquet or CSV, chosen by file
//! extension. Everything written goes through [`atomic::write_atomic`].

pub mod atomic;
pub mod csv;
pub mod parquet;

use std::path::Path;

use arrow::record_batch::RecordBatch;

use crate::error::{Error, Result};

// Re-export commonly used functions for convenience
pub use atomic::{write_atomic, write_json_atomic};
pub use csv::{read_csv, write_csv_atomic};
pub use parquet::{read_parquet, write_parquet_atomic};

/// Supported table formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Parquet,
    Csv,
}

impl TableFormat {
    /// Detect the format from the file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("parquet") => Ok(Self::Parquet),
            Some("csv") => Ok(Self::Csv),
            _ => Err(Error::invalid_input(format!(
                "unsupported table format for {} (expected .parquet or .csv)",
                path.display()
            ))),
        }
    }
}

/// Read a case table, dispatching on the file extension
pub fn read_case_table(path: &Path) -> Result<RecordBatch> {
    match TableFormat::from_path(path)? {
        TableFormat::Parquet => read_parquet(path),
        TableFormat::Csv => read_csv(path),
    }
}

/// Publish a table atomically, dispatching on the file extension
pub fn write_table(path: &Path, batch: &RecordBatch) -> Result<()> {
    match TableFormat::from_path(path)? {
        TableFormat::Parquet => write_parquet_atomic(path, batch),
        TableFormat::Csv => write_csv_atomic(path, batch),
    }
}
