//! Parquet file operations
//!
//! Reading case tables from Parquet and publishing labeled tables back to
//! Parquet atomically.

use std::fs::File;
use std::path::Path;
use std::time::Instant;

use arrow::record_batch::{RecordBatch, RecordBatchReader};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::Result;
use crate::error::util::safe_open_file;
use crate::utils::arrow::cases::concat_batches;
use crate::utils::io::atomic::write_atomic;
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Default batch size for Parquet reading
pub const DEFAULT_BATCH_SIZE: usize = 16384;

/// Helper function to get batch size from environment
#[must_use]
pub fn get_batch_size() -> usize {
    std::env::var("PARQUET_BATCH_SIZE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|&size| size > 0)
        .unwrap_or(DEFAULT_BATCH_SIZE)
}

/// Read a Parquet file into a single record batch
pub fn read_parquet(path: &Path) -> Result<RecordBatch> {
    let start = Instant::now();
    log_operation_start("Reading parquet file", path);

    let file = safe_open_file(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
        .with_batch_size(get_batch_size())
        .build()?;
    let schema = reader.schema();
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    let batch = concat_batches(&schema, &batches)?;

    log_operation_complete("read", path, batch.num_rows(), Some(start.elapsed()));
    Ok(batch)
}

/// Publish `batch` as a Parquet file, replacing `path` atomically
pub fn write_parquet_atomic(path: &Path, batch: &RecordBatch) -> Result<()> {
    let start = Instant::now();
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    write_atomic(path, |file: &mut File| {
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(batch)?;
        writer.close()?;
        Ok(())
    })?;

    log_operation_complete("wrote", path, batch.num_rows(), Some(start.elapsed()));
    Ok(())
}
