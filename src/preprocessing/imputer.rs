//! Null imputation for the canonical columns

use super::FrameTransform;
use crate::error::Result;
use crate::schema::{ColumnSpec, CATEGORICAL_COLUMNS, NUMERIC_COLUMNS};
use crate::utils::column_as_f64;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Most frequent non-null code of a column; ties go to the smallest code
fn mode_smallest(series: &Series) -> Result<Option<i64>> {
    let codes = series.cast(&DataType::Int64)?;
    let name = codes.name().clone();
    let counts = DataFrame::new(vec![Column::from(codes)])?
        .lazy()
        .filter(col(name.clone()).is_not_null())
        .group_by([col(name.clone())])
        .agg([len().alias("count")])
        .sort_by_exprs(
            [col("count"), col(name.clone())],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .limit(1)
        .collect()?;

    if counts.height() == 0 {
        return Ok(None);
    }
    Ok(counts.column(name.as_str())?.i64()?.get(0))
}

/// Fills categorical codes with their mode and numeric columns with their median.
///
/// Mode ties go to the smallest code. A column that is absent, has no
/// nulls, or has no non-null value to learn from is left as is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NullImputer {
    categorical_columns: Vec<String>,
    numeric_columns: Vec<String>,
}

impl Default for NullImputer {
    fn default() -> Self {
        Self {
            categorical_columns: CATEGORICAL_COLUMNS.iter().map(|c| c.to_string()).collect(),
            numeric_columns: NUMERIC_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl NullImputer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_categorical_columns(mut self, columns: &[&str]) -> Self {
        self.categorical_columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_numeric_columns(mut self, columns: &[&str]) -> Self {
        self.numeric_columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Impute a frame
    pub fn impute(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();

        for name in &self.categorical_columns {
            let Ok(col) = df.column(name) else {
                continue;
            };
            let series = col.as_materialized_series();
            if series.null_count() == 0 {
                continue;
            }

            let Some(fill) = mode_smallest(series)? else {
                tracing::debug!(column = %name, "no values to take a mode from");
                continue;
            };

            let codes = series.cast(&DataType::Int64)?;
            let filled: Int64Chunked = codes
                .i64()?
                .into_iter()
                .map(|opt| Some(opt.unwrap_or(fill)))
                .collect();
            let filled = filled
                .with_name(series.name().clone())
                .into_series()
                .cast(series.dtype())?;
            tracing::debug!(column = %name, fill, nulls = series.null_count(), "imputed with mode");
            result.with_column(filled)?;
        }

        for name in &self.numeric_columns {
            if df.column(name).is_err() {
                continue;
            }
            let values = column_as_f64(df, name)?;
            let nulls = values.null_count();
            if nulls == 0 {
                continue;
            }
            let Some(fill) = values.median() else {
                tracing::debug!(column = %name, "no values to take a median from");
                continue;
            };

            let filled: Float64Chunked = values
                .into_iter()
                .map(|opt| Some(opt.unwrap_or(fill)))
                .collect();
            tracing::debug!(column = %name, fill, nulls, "imputed with median");
            result.with_column(filled.with_name(name.as_str().into()).into_series())?;
        }

        Ok(result)
    }
}

impl FrameTransform for NullImputer {
    fn name(&self) -> &'static str {
        "null_imputation"
    }

    fn declared_columns(&self) -> Vec<ColumnSpec> {
        self.categorical_columns
            .iter()
            .map(|c| ColumnSpec::code(c.as_str()))
            .chain(self.numeric_columns.iter().map(|c| ColumnSpec::numeric(c.as_str())))
            .collect()
    }

    fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        self.impute(df)
    }
}
