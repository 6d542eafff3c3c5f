//! CSV case tables
//!
//! Column types are inferred from the first rows. ISO dates infer as Date32;
//! anything else in the date column is cast when cases are extracted.

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::record_batch::RecordBatch;

use crate::error::util::safe_open_file;
use crate::error::{Error, Result};
use crate::utils::arrow::cases::concat_batches;
use crate::utils::io::atomic::write_atomic;
use crate::utils::io::parquet::get_batch_size;
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Rows sampled for schema inference
const INFER_MAX_RECORDS: usize = 1000;

/// Read a CSV file with a header row into a single record batch
pub fn read_csv(path: &Path) -> Result<RecordBatch> {
    let start = Instant::now();
    log_operation_start("Reading csv file", path);

    let mut file = safe_open_file(path)?;
    let format = Format::default().with_header(true);
    let (schema, _) = format.infer_schema(&mut file, Some(INFER_MAX_RECORDS))?;
    file.seek(SeekFrom::Start(0)).map_err(|e| Error::io(path, e))?;

    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(schema.clone())
        .with_format(format)
        .with_batch_size(get_batch_size())
        .build(file)?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    let batch = concat_batches(&schema, &batches)?;

    log_operation_complete("read", path, batch.num_rows(), Some(start.elapsed()));
    Ok(batch)
}

/// Publish `batch` as CSV with a header row, replacing `path` atomically
pub fn write_csv_atomic(path: &Path, batch: &RecordBatch) -> Result<()> {
    let start = Instant::now();
    write_atomic(path, |file: &mut File| {
        let mut writer = WriterBuilder::new().with_header(true).build(file);
        writer.write(batch)?;
        Ok(())
    })?;
    log_operation_complete("wrote", path, batch.num_rows(), Some(start.elapsed()));
    Ok(())
}
