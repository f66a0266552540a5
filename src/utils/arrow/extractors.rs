//! Field extraction utilities for Arrow record batches
//!
//! Lookups fail with a schema error naming the column; value extraction maps
//! nulls (and non-finite floats) to `None`.

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, PrimitiveArray, StringArray};
use arrow::datatypes::ArrowPrimitiveType;
use arrow::record_batch::RecordBatch;

use crate::error::{DaioeError, Result};

/// Get a column by name
pub fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| DaioeError::Schema(format!("missing expected column '{name}'")))
}

/// Get a Utf8 column by name
pub fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    let array = column(batch, name)?;
    array.as_string_opt::<i32>().ok_or_else(|| {
        DaioeError::Schema(format!(
            "column '{name}' is {}, expected Utf8",
            array.data_type()
        ))
    })
}

/// Get a primitive column by name
pub fn primitive_column<'a, T: ArrowPrimitiveType>(
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a PrimitiveArray<T>> {
    let array = column(batch, name)?;
    array.as_primitive_opt::<T>().ok_or_else(|| {
        DaioeError::Schema(format!(
            "column '{name}' is {}, expected {}",
            array.data_type(),
            T::DATA_TYPE
        ))
    })
}

/// Extract a non-empty string value
///
/// # Returns
/// * `Some(&str)` - The trimmed value
/// * `None` - If the cell is null or blank
#[must_use]
pub fn extract_string(array: &StringArray, row: usize) -> Option<&str> {
    if row >= array.len() || array.is_null(row) {
        return None;
    }
    let value = array.value(row).trim();
    (!value.is_empty()).then_some(value)
}

/// Extract a finite float value; NaN and infinities count as missing.
#[must_use]
pub fn extract_f64(array: &Float64Array, row: usize) -> Option<f64> {
    if row >= array.len() || array.is_null(row) {
        return None;
    }
    let value = array.value(row);
    value.is_finite().then_some(value)
}
