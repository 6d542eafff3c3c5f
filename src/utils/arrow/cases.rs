//! Conversion between Arrow case tables and [`Case`] records
//!
//! The engine reads four required columns (diagnosis, latitude, longitude,
//! date) plus an optional id. Every other column is carried through
//! untouched when labels are attached.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Date32Array, Float64Array, Int32Array, StringArray};
use arrow::compute::kernels::{boolean, cast};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};
use log::warn;

use crate::config::ColumnConfig;
use crate::error::util::{column_not_found, downcast_array};
use crate::error::{Error, Result};
use crate::filter::core::filter_record_batch;
use crate::models::Case;

/// Name of the label column appended to labeled tables
pub const CLUSTER_COLUMN: &str = "cluster";

/// Days between 0001-01-01 (CE day 1) and the Unix epoch
const UNIX_EPOCH_FROM_CE: i32 = 719_163;

/// Convert a date to Arrow's Date32 representation
#[must_use]
pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_FROM_CE
}

/// Get a column, casting it to `expected_type` if it has another type
pub fn column_as(batch: &RecordBatch, column_name: &str, expected_type: &DataType) -> Result<ArrayRef> {
    let Ok(idx) = batch.schema().index_of(column_name) else {
        return column_not_found(column_name);
    };
    let column = batch.column(idx);
    if column.data_type() == expected_type {
        return Ok(column.clone());
    }
    Ok(cast::cast(column, expected_type)?)
}

/// Extract the cases of a validated table, in row order.
///
/// Nulls in a required column are a caller contract violation and fail with
/// [`Error::InvalidInput`]; use [`drop_incomplete_rows`] at ingestion time.
pub fn cases_from_batch(batch: &RecordBatch, columns: &ColumnConfig) -> Result<Vec<Case>> {
    let diagnosis = column_as(batch, &columns.diagnosis, &DataType::Utf8)?;
    let latitude = column_as(batch, &columns.latitude, &DataType::Float64)?;
    let longitude = column_as(batch, &columns.longitude, &DataType::Float64)?;
    let date = column_as(batch, &columns.date, &DataType::Date32)?;
    let id = match &columns.id {
        Some(name) => Some(column_as(batch, name, &DataType::Utf8)?),
        None => None,
    };

    let diagnosis = downcast_array::<StringArray>(&diagnosis, &columns.diagnosis, "Utf8")?;
    let latitude = downcast_array::<Float64Array>(&latitude, &columns.latitude, "Float64")?;
    let longitude = downcast_array::<Float64Array>(&longitude, &columns.longitude, "Float64")?;
    let date = downcast_array::<Date32Array>(&date, &columns.date, "Date32")?;
    let id = match (&id, &columns.id) {
        (Some(array), Some(name)) => Some(downcast_array::<StringArray>(array, name, "Utf8")?),
        _ => None,
    };

    let mut cases = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let missing = [
            (diagnosis.is_null(row), &columns.diagnosis),
            (latitude.is_null(row), &columns.latitude),
            (longitude.is_null(row), &columns.longitude),
            (date.is_null(row), &columns.date),
        ];
        if let Some((_, column)) = missing.iter().find(|(is_null, _)| *is_null) {
            return Err(Error::invalid_input(format!(
                "row {row} has no value in required column '{column}'"
            )));
        }

        let day = date.value_as_date(row).ok_or_else(|| {
            Error::invalid_input(format!("row {row} has an out-of-range date"))
        })?;
        let mut case = Case::new(
            row,
            diagnosis.value(row),
            latitude.value(row),
            longitude.value(row),
            day,
        );
        if let Some(ids) = id {
            if !ids.is_null(row) {
                case = case.with_id(ids.value(row));
            }
        }
        cases.push(case);
    }
    Ok(cases)
}

/// Remove rows missing any required value, normalizing the required columns'
/// types (Float64 coordinates, Date32 dates) on the way.
pub fn drop_incomplete_rows(batch: &RecordBatch, columns: &ColumnConfig) -> Result<RecordBatch> {
    let normalized = normalize_columns(batch, columns)?;

    let mut mask = BooleanArray::from(vec![true; normalized.num_rows()]);
    for name in columns.required() {
        let Some(column) = normalized.column_by_name(name) else {
            return column_not_found(name);
        };
        let present = boolean::is_not_null(column.as_ref())?;
        mask = boolean::and(&mask, &present)?;
    }

    let kept = filter_record_batch(&normalized, &mask)?;
    let dropped = normalized.num_rows() - kept.num_rows();
    if dropped > 0 {
        warn!("Dropped {dropped} rows missing diagnosis, coordinates or date");
    }
    Ok(kept)
}

/// Cast the required columns to the types the engine reads
pub fn normalize_columns(batch: &RecordBatch, columns: &ColumnConfig) -> Result<RecordBatch> {
    let targets = [
        (columns.diagnosis.as_str(), DataType::Utf8),
        (columns.latitude.as_str(), DataType::Float64),
        (columns.longitude.as_str(), DataType::Float64),
        (columns.date.as_str(), DataType::Date32),
    ];

    let schema = batch.schema();
    for (name, _) in &targets {
        if schema.index_of(name).is_err() {
            return column_not_found(name);
        }
    }

    let mut fields: Vec<Field> = Vec::with_capacity(schema.fields().len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for (idx, field) in schema.fields().iter().enumerate() {
        match targets.iter().find(|(name, _)| *name == field.name().as_str()) {
            Some((name, target)) if field.data_type() != target => {
                arrays.push(column_as(batch, name, target)?);
                fields.push(Field::new(field.name(), target.clone(), true));
            }
            _ => {
                arrays.push(batch.column(idx).clone());
                fields.push(field.as_ref().clone());
            }
        }
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Schema of `schema` with the cluster column appended (or replaced)
#[must_use]
pub fn labeled_schema(schema: &Schema) -> SchemaRef {
    let mut fields: Vec<Field> = schema
        .fields()
        .iter()
        .filter(|f| f.name() != CLUSTER_COLUMN)
        .map(|f| f.as_ref().clone())
        .collect();
    fields.push(Field::new(CLUSTER_COLUMN, DataType::Int32, false));
    Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()))
}

/// An empty labeled table with the shape of `schema`
#[must_use]
pub fn empty_labeled(schema: &Schema) -> RecordBatch {
    RecordBatch::new_empty(labeled_schema(schema))
}

/// Attach one label per row as the cluster column.
///
/// A previous cluster column (from an earlier run) is replaced.
pub fn with_cluster_column(batch: &RecordBatch, labels: &[i32]) -> Result<RecordBatch> {
    if labels.len() != batch.num_rows() {
        return Err(Error::invalid_input(format!(
            "{} labels for a table of {} rows",
            labels.len(),
            batch.num_rows()
        )));
    }

    let schema = batch.schema();
    let mut arrays: Vec<ArrayRef> = schema
        .fields()
        .iter()
        .zip(batch.columns())
        .filter(|(f, _)| f.name() != CLUSTER_COLUMN)
        .map(|(_, column)| column.clone())
        .collect();
    arrays.push(Arc::new(Int32Array::from(labels.to_vec())));

    Ok(RecordBatch::try_new(labeled_schema(&schema), arrays)?)
}

/// Read the cluster column of a labeled table
pub fn cluster_labels(batch: &RecordBatch) -> Result<Vec<i32>> {
    let column = column_as(batch, CLUSTER_COLUMN, &DataType::Int32)?;
    let labels = downcast_array::<Int32Array>(&column, CLUSTER_COLUMN, "Int32")?;
    Ok(labels.iter().map(|v| v.unwrap_or(crate::algorithm::dbscan::NOISE)).collect())
}

/// Concatenate batches sharing one schema into a single table
pub fn concat_batches(schema: &SchemaRef, batches: &[RecordBatch]) -> Result<RecordBatch> {
    Ok(arrow::compute::concat_batches(schema, batches)?)
}
