//! Shared utilities for the built-in transformers.
//!
//! This module contains common helper functions used across multiple
//! transformers to reduce code duplication and ensure consistency.

use polars::prelude::*;

use trellis_pipeline::{PipelineError, Result};

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType holds strings.
#[inline]
pub fn is_string_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String | DataType::Categorical(_, _))
}

// =============================================================================
// Series Statistics Utilities
// =============================================================================

/// Calculate the mode (most frequent value) of a string Series.
pub fn string_mode(series: &Series) -> Option<String> {
    let non_null = series.drop_nulls();
    if non_null.is_empty() {
        return None;
    }

    let str_series = non_null.cast(&DataType::String).ok()?;
    let str_chunked = str_series.str().ok()?;

    let mut value_counts: std::collections::HashMap<String, usize> =
        std::collections::HashMap::new();
    for val in str_chunked.into_iter().flatten() {
        *value_counts.entry(val.to_string()).or_insert(0) += 1;
    }

    value_counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(val, _)| val)
}

/// Mean and population standard deviation of a slice.
pub fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

// =============================================================================
// Series Transformation Utilities
// =============================================================================

/// Fill null values in a numeric Series with a specific value.
pub fn fill_numeric_nulls(series: &Series, fill_value: f64) -> PolarsResult<Series> {
    let mask = series.is_null();
    let len = series.len();
    let mut result_vec = Vec::with_capacity(len);

    for i in 0..len {
        if mask.get(i).unwrap_or(false) {
            result_vec.push(Some(fill_value));
        } else {
            let val = series.get(i)?;
            result_vec.push(Some(val.try_extract::<f64>()?));
        }
    }

    Ok(Series::new(series.name().clone(), result_vec))
}

/// Fill null values in a string Series with a specific value.
pub fn fill_string_nulls(series: &Series, fill_value: &str) -> PolarsResult<Series> {
    let str_series = series.cast(&DataType::String)?;
    let chunked = str_series.str()?;

    let result_vec: Vec<String> = chunked
        .into_iter()
        .map(|val| {
            val.map(str::to_string)
                .unwrap_or_else(|| fill_value.to_string())
        })
        .collect();

    Ok(Series::new(series.name().clone(), result_vec))
}

/// Extract a numeric Series as `f64` values, preserving nulls.
pub fn series_to_f64s(series: &Series) -> Result<Vec<Option<f64>>> {
    let mask = series.is_null();
    let len = series.len();
    let mut values = Vec::with_capacity(len);

    for i in 0..len {
        if mask.get(i).unwrap_or(false) {
            values.push(None);
        } else {
            let val = series.get(i).map_err(PipelineError::Polars)?;
            values.push(Some(
                val.try_extract::<f64>().map_err(PipelineError::Polars)?,
            ));
        }
    }

    Ok(values)
}

/// Extract a numeric Series as dense `f64` values, rejecting nulls.
pub fn series_to_dense_f64s(series: &Series) -> Result<Vec<f64>> {
    let values = series_to_f64s(series)?;
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.ok_or_else(|| {
                PipelineError::InvalidData(format!(
                    "column '{}' contains a null at row {i}; impute before modeling",
                    series.name()
                ))
            })
        })
        .collect()
}

/// Extract the numeric columns of a frame as a row-major matrix.
///
/// Returns the column names (the feature order) alongside the rows.
/// Fails on nulls; non-numeric columns are skipped.
pub fn numeric_feature_matrix(df: &DataFrame) -> Result<(Vec<String>, Vec<Vec<f64>>)> {
    let mut features = Vec::new();
    let mut columns: Vec<Vec<f64>> = Vec::new();

    for col in df.get_columns() {
        if !is_numeric_dtype(col.dtype()) {
            continue;
        }
        features.push(col.name().to_string());
        columns.push(series_to_dense_f64s(col.as_materialized_series())?);
    }

    if features.is_empty() {
        return Err(PipelineError::InvalidData(
            "frame has no numeric columns to model on".to_string(),
        ));
    }

    let height = df.height();
    let mut rows = Vec::with_capacity(height);
    for i in 0..height {
        rows.push(columns.iter().map(|c| c[i]).collect());
    }

    Ok((features, rows))
}
