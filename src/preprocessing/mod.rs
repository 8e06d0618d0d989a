//! Data preprocessing module
//!
//! Stages applied to harmonized frames:
//! - Type coercion and categorical encoding ([`TypeStandardizer`])
//! - IQR outlier detection and winsorization ([`OutlierEngine`])
//! - Median/mode null imputation ([`NullImputer`])
//! - Feature standardization for the model ([`StandardScaler`])

pub mod imputer;
pub mod outlier;
pub mod scaler;
pub mod standardizer;

pub use imputer::NullImputer;
pub use outlier::{OutlierEngine, OutlierReport, OutlierStats};
pub use scaler::StandardScaler;
pub use standardizer::{EncodingDictionary, TypeStandardizer};

use crate::error::Result;
use crate::schema::ColumnSpec;
use polars::prelude::*;

/// A whole-frame transform that declares the columns it reads.
///
/// The pipeline gathers the declarations of all transforms and validates the
/// merged frame against them once, before any transform runs.
pub trait FrameTransform: Send + Sync {
    /// Short stage name for logs
    fn name(&self) -> &'static str;

    /// Columns this transform reads, with their expected kind
    fn declared_columns(&self) -> Vec<ColumnSpec>;

    /// Apply the transform, returning a new frame
    fn apply(&self, df: &DataFrame) -> Result<DataFrame>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaContract;

    #[test]
    fn test_transforms_declare_canonical_columns() {
        let transforms: Vec<Box<dyn FrameTransform>> =
            vec![Box::new(OutlierEngine::new()), Box::new(NullImputer::new())];

        let mut contract = SchemaContract::new();
        for t in &transforms {
            contract.extend(t.declared_columns());
        }
        let names: Vec<&str> = contract.columns().iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"lag_next"));
        assert!(names.contains(&"stone"));
        assert_eq!(transforms[0].name(), "outlier_treatment");
    }
}
