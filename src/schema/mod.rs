//! Canonical schema and per-year harmonization
//!
//! Raw yearly extracts name the same measurement differently ("Pedra 22",
//! "Pedra 2023", ...), spell categories differently and carry columns that
//! only mattered for one survey round. This module maps every year onto one
//! canonical column set:
//! - [`mapping`] - per-year profiles (renames, drops, value rules)
//! - [`normalizer`] - applies a profile to a raw frame
//! - [`merge`] - links consecutive years and stacks them into one table

pub mod mapping;
pub mod merge;
pub mod normalizer;

pub use mapping::{PhaseRule, ProfileRegistry, ValueRule, YearProfile};
pub use merge::{concat_diagonal, link_next_period};
pub use normalizer::{DataQualityFinding, NormalizedFrame, SchemaNormalizer};

use crate::error::{LagwatchError, Result};
use crate::utils::is_numeric_dtype;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Student registration id, used to link consecutive years
pub const ID_COLUMN: &str = "ra";
/// Phase (grade band) as an integer
pub const PHASE_COLUMN: &str = "fase";
/// Lag in the observed period
pub const LAG_CURRENT: &str = "lag_current";
/// Lag in the following period
pub const LAG_NEXT: &str = "lag_next";

/// Canonical numeric columns, coerced to f64
pub const NUMERIC_COLUMNS: &[&str] = &[
    "age",
    "inde",
    "iaa",
    "ieg",
    "ips",
    "ida",
    "math",
    "portuguese",
    "ipv",
    "ian",
    LAG_CURRENT,
    LAG_NEXT,
];

/// Canonical categorical columns, stored as integer codes
pub const CATEGORICAL_COLUMNS: &[&str] = &["gender", "education_institution", "stone"];

/// Semantic type of a canonical column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Floating point measurement
    Numeric,
    /// Integer category code
    Code,
}

impl ColumnKind {
    fn accepts(&self, dtype: &DataType) -> bool {
        is_numeric_dtype(dtype) || dtype == &DataType::Null
    }
}

/// A column a transform reads or writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub fn numeric(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: ColumnKind::Numeric }
    }

    pub fn code(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: ColumnKind::Code }
    }
}

/// Columns a frame must provide before a set of transforms runs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaContract {
    columns: Vec<ColumnSpec>,
}

impl SchemaContract {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add specs, keeping the first declaration of a name
    pub fn extend(&mut self, specs: impl IntoIterator<Item = ColumnSpec>) {
        for spec in specs {
            if !self.columns.iter().any(|c| c.name == spec.name) {
                self.columns.push(spec);
            }
        }
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Add every declared column the frame lacks, all null, in the dtype
    /// its kind is stored as
    pub fn fill_missing(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();
        for spec in &self.columns {
            if result.column(&spec.name).is_ok() {
                continue;
            }
            let dtype = match spec.kind {
                ColumnKind::Numeric => DataType::Float64,
                ColumnKind::Code => DataType::Int32,
            };
            tracing::debug!(column = %spec.name, "declared column absent, filled with nulls");
            result.with_column(Series::full_null(spec.name.as_str().into(), df.height(), &dtype))?;
        }
        Ok(result)
    }

    /// Check presence and dtype of every declared column in one pass
    pub fn validate(&self, df: &DataFrame) -> Result<()> {
        let mut problems = Vec::new();
        for spec in &self.columns {
            match df.column(&spec.name) {
                Ok(col) if spec.kind.accepts(col.dtype()) => {}
                Ok(col) => problems.push(format!(
                    "'{}' expected {:?}, found {}",
                    spec.name,
                    spec.kind,
                    col.dtype()
                )),
                Err(_) => problems.push(format!("'{}' missing", spec.name)),
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(LagwatchError::SchemaError(problems.join("; ")))
        }
    }
}

/// The canonical contract of a training-ready table
pub fn canonical_contract() -> SchemaContract {
    let mut contract = SchemaContract::new();
    contract.extend(NUMERIC_COLUMNS.iter().map(|c| ColumnSpec::numeric(*c)));
    contract.extend(CATEGORICAL_COLUMNS.iter().map(|c| ColumnSpec::code(*c)));
    contract
}
