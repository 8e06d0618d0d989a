//! Standardization of feature matrices

use crate::error::{LagwatchError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Z-score scaler: `(x - mean) / std`, population std.
///
/// A constant feature gets a scale of 1 so it maps to zero instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
    is_fitted: bool,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardScaler {
    pub fn new() -> Self {
        Self {
            mean: Array1::zeros(0),
            scale: Array1::zeros(0),
            is_fitted: false,
        }
    }

    /// Learn per-column mean and std
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(LagwatchError::InvalidInput(
                "cannot fit a scaler on zero rows".to_string(),
            ));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| LagwatchError::InvalidInput("empty feature matrix".to_string()))?;
        let std = x.std_axis(Axis(0), 0.0);

        self.scale = std.mapv(|s| if s == 0.0 || !s.is_finite() { 1.0 } else { s });
        self.mean = mean;
        self.is_fitted = true;
        Ok(self)
    }

    /// Scale a matrix with the fitted statistics
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(LagwatchError::ModelNotFitted);
        }
        if x.ncols() != self.mean.len() {
            return Err(LagwatchError::ShapeError {
                expected: format!("{} columns", self.mean.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        Ok((x - &self.mean) / &self.scale)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_standard_scaler_centers_columns() {
        let x = array![[1.0, 10.0], [2.0, 10.0], [3.0, 10.0], [4.0, 10.0], [5.0, 10.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();

        let col_mean = scaled.column(0).mean().unwrap();
        assert_relative_eq!(col_mean, 0.0, epsilon = 1e-12);
        // population std of 1..5 is sqrt(2)
        assert_relative_eq!(scaler.scale()[0], 2f64.sqrt(), epsilon = 1e-12);
        // constant column maps to zero
        assert!(scaled.column(1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_transform_requires_fit() {
        let scaler = StandardScaler::new();
        let x = array![[1.0]];
        assert!(matches!(scaler.transform(&x), Err(LagwatchError::ModelNotFitted)));
    }

    #[test]
    fn test_transform_checks_width() {
        let mut scaler = StandardScaler::new();
        scaler.fit(&array![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        assert!(matches!(
            scaler.transform(&array![[1.0]]),
            Err(LagwatchError::ShapeError { .. })
        ));
    }
}
