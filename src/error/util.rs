//! Utility functions for error handling
//!
//! Helpers for the common "column missing / wrong type" and file-access
//! failures, so call sites stay one line long.

use std::fs;
use std::path::Path;

use arrow::array::{Array, ArrayRef};

use crate::error::{Error, Result};

/// Create a column not found error
pub fn column_not_found<T>(column_name: &str) -> Result<T> {
    Err(Error::ColumnNotFound {
        column: column_name.to_string(),
    })
}

/// Create a column type error
pub fn column_type_error<T>(column_name: &str, expected_type: &str) -> Result<T> {
    Err(Error::ColumnType {
        column: column_name.to_string(),
        expected: expected_type.to_string(),
    })
}

/// Downcast an array to a concrete Arrow array type with a typed error
pub fn downcast_array<'a, A: Array + 'static>(
    array: &'a ArrayRef,
    column_name: &str,
    expected_type: &str,
) -> Result<&'a A> {
    match array.as_any().downcast_ref::<A>() {
        Some(typed) => Ok(typed),
        None => column_type_error(column_name, expected_type),
    }
}

/// Open a file, attaching the path to any failure
pub fn safe_open_file(path: &Path) -> Result<fs::File> {
    fs::File::open(path).map_err(|e| Error::io(path, e))
}

/// Ensure a directory exists, creating it if needed
pub fn ensure_directory(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|e| Error::io(path, e))
}
