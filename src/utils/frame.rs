//! DataFrame access helpers

use crate::error::{LagwatchError, Result};
use polars::prelude::*;

/// Check if dtype is numeric
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

/// Check if dtype holds text
pub fn is_text_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String)
}

/// Owned column names in frame order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

/// Read a column as a Float64 chunked array, NaN read as null.
///
/// Numeric and all-null columns are cast; any other dtype is rejected so a
/// text column is never silently turned into nulls.
pub fn column_as_f64(df: &DataFrame, name: &str) -> Result<Float64Chunked> {
    let column = df
        .column(name)
        .map_err(|_| LagwatchError::FeatureNotFound(name.to_string()))?;
    let series = column.as_materialized_series();

    if !is_numeric_dtype(series.dtype()) && series.dtype() != &DataType::Null {
        return Err(LagwatchError::InvalidInput(format!(
            "column '{}' has non-numeric dtype {}",
            name,
            series.dtype()
        )));
    }

    let cast = series.cast(&DataType::Float64)?;
    let values: Float64Chunked = cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(values.with_name(series.name().clone()))
}
