//! IQR outlier detection and winsorization
//!
//! Bounds are `Q1 - k * IQR` and `Q3 + k * IQR` with quartiles taken by
//! linear interpolation over the non-null values of a column. A value equal
//! to a bound is inside the fence. [`OutlierEngine::detect`] and
//! [`OutlierEngine::treat`] each compute their own statistics; neither reuses
//! bounds produced by the other.

use super::FrameTransform;
use crate::error::{LagwatchError, Result};
use crate::schema::{ColumnSpec, NUMERIC_COLUMNS};
use crate::utils::column_as_f64;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// IQR statistics for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierStats {
    pub column: String,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub outlier_count: usize,
    /// Percentage of non-null values outside the bounds
    pub outlier_percentage: f64,
    /// Non-null values
    pub total_count: usize,
    pub null_count: usize,
    /// Percentage of all rows that are null
    pub null_percentage: f64,
}

impl OutlierStats {
    /// Compute statistics over a column's values; `None` when every value is null
    pub fn compute(column: &str, values: &Float64Chunked, multiplier: f64) -> Result<Option<Self>> {
        let total_count = values.len() - values.null_count();
        if total_count == 0 {
            return Ok(None);
        }

        let (Some(q1), Some(q3)) = (
            values.quantile(0.25, QuantileMethod::Linear)?,
            values.quantile(0.75, QuantileMethod::Linear)?,
        ) else {
            return Ok(None);
        };
        let iqr = q3 - q1;
        let lower_bound = q1 - multiplier * iqr;
        let upper_bound = q3 + multiplier * iqr;

        let outlier_count = values
            .into_iter()
            .flatten()
            .filter(|v| *v < lower_bound || *v > upper_bound)
            .count();
        let null_count = values.null_count();

        Ok(Some(Self {
            column: column.to_string(),
            q1,
            q3,
            iqr,
            lower_bound,
            upper_bound,
            outlier_count,
            outlier_percentage: outlier_count as f64 / total_count as f64 * 100.0,
            total_count,
            null_count,
            null_percentage: null_count as f64 / values.len() as f64 * 100.0,
        }))
    }

    pub fn is_outlier(&self, value: f64) -> bool {
        value < self.lower_bound || value > self.upper_bound
    }

    /// Clamp a value into `[lower_bound, upper_bound]`
    pub fn clip(&self, value: f64) -> f64 {
        value.max(self.lower_bound).min(self.upper_bound)
    }
}

/// Result of one outlier analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    column_stats: Vec<OutlierStats>,
    total_records: usize,
    columns_analyzed: Vec<String>,
}

impl OutlierReport {
    /// Per-column statistics, in analysis order. Columns with no
    /// non-null value are absent.
    pub fn column_stats(&self) -> &[OutlierStats] {
        &self.column_stats
    }

    pub fn total_records(&self) -> usize {
        self.total_records
    }

    /// Selected columns that were present in the frame
    pub fn columns_analyzed(&self) -> &[String] {
        &self.columns_analyzed
    }

    /// Statistics for one column
    pub fn get(&self, column: &str) -> Option<&OutlierStats> {
        self.column_stats.iter().find(|s| s.column == column)
    }

    /// Outlier count summed over columns
    pub fn total_outliers(&self) -> usize {
        self.column_stats.iter().map(|s| s.outlier_count).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for OutlierReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(90);
        writeln!(f, "{}", rule)?;
        writeln!(f, "OUTLIER ANALYSIS (IQR)")?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "Records: {}", self.total_records)?;
        writeln!(f, "Columns: {}", self.columns_analyzed.len())?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<16} {:>7} {:>7} {:>9} {:>7} {:>10} {:>10}",
            "column", "valid", "null%", "outliers", "out%", "lower", "upper"
        )?;
        writeln!(f, "{}", "-".repeat(90))?;
        for s in &self.column_stats {
            writeln!(
                f,
                "{:<16} {:>7} {:>6.1}% {:>9} {:>6.1}% {:>10.2} {:>10.2}",
                s.column,
                s.total_count,
                s.null_percentage,
                s.outlier_count,
                s.outlier_percentage,
                s.lower_bound,
                s.upper_bound
            )?;
        }
        write!(f, "{}", rule)
    }
}

/// IQR outlier detector and winsorizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierEngine {
    columns: Option<Vec<String>>,
    multiplier: f64,
}

impl Default for OutlierEngine {
    fn default() -> Self {
        Self {
            columns: None,
            multiplier: 1.5,
        }
    }
}

impl OutlierEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyze these columns instead of the registered numeric columns
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Set the IQR multiplier `k`
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    fn selected_columns(&self, df: &DataFrame) -> Vec<String> {
        let wanted: Vec<String> = match &self.columns {
            Some(cols) => cols.clone(),
            None => NUMERIC_COLUMNS.iter().map(|c| c.to_string()).collect(),
        };
        wanted
            .into_iter()
            .filter(|c| df.column(c).is_ok())
            .collect()
    }

    fn check_multiplier(&self) -> Result<()> {
        if !self.multiplier.is_finite() || self.multiplier < 0.0 {
            return Err(LagwatchError::ConfigError(format!(
                "IQR multiplier must be a non-negative number, got {}",
                self.multiplier
            )));
        }
        Ok(())
    }

    /// Compute per-column outlier statistics
    pub fn detect(&self, df: &DataFrame) -> Result<OutlierReport> {
        self.check_multiplier()?;
        let columns_analyzed = self.selected_columns(df);

        let mut column_stats = Vec::with_capacity(columns_analyzed.len());
        for name in &columns_analyzed {
            let values = column_as_f64(df, name)?;
            match OutlierStats::compute(name, &values, self.multiplier)? {
                Some(stats) => {
                    tracing::debug!(
                        column = %name,
                        lower = stats.lower_bound,
                        upper = stats.upper_bound,
                        outliers = stats.outlier_count,
                        "outlier bounds"
                    );
                    column_stats.push(stats);
                }
                None => tracing::debug!(column = %name, "no values, skipped"),
            }
        }

        let report = OutlierReport {
            column_stats,
            total_records: df.height(),
            columns_analyzed,
        };
        tracing::info!(
            rows = report.total_records,
            columns = report.column_stats.len(),
            outliers = report.total_outliers(),
            "outlier analysis complete"
        );
        Ok(report)
    }

    /// Clip every value of the selected columns to its IQR bounds.
    ///
    /// Treated columns come back as Float64; nulls stay null.
    pub fn treat(&self, df: &DataFrame) -> Result<DataFrame> {
        self.check_multiplier()?;
        let mut result = df.clone();

        for name in self.selected_columns(df) {
            let values = column_as_f64(df, &name)?;
            let Some(stats) = OutlierStats::compute(&name, &values, self.multiplier)? else {
                continue;
            };

            let clipped: Float64Chunked = values
                .into_iter()
                .map(|opt| opt.map(|v| stats.clip(v)))
                .collect();
            result.with_column(clipped.with_name(name.as_str().into()).into_series())?;

            if stats.outlier_count > 0 {
                tracing::debug!(column = %name, capped = stats.outlier_count, "winsorized");
            }
        }

        Ok(result)
    }
}

impl FrameTransform for OutlierEngine {
    fn name(&self) -> &'static str {
        "outlier_treatment"
    }

    fn declared_columns(&self) -> Vec<ColumnSpec> {
        match &self.columns {
            Some(cols) => cols.iter().map(|c| ColumnSpec::numeric(c.as_str())).collect(),
            None => NUMERIC_COLUMNS.iter().map(|c| ColumnSpec::numeric(*c)).collect(),
        }
    }

    fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        self.treat(df)
    }
}
