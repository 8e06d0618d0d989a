//! Runtime configuration

use crate::error::{LagwatchError, Result};
use crate::schema::ID_COLUMN;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings for the harmonization pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Survey years to load, oldest first
    pub years: Vec<u16>,

    /// Raw tables are named `<prefix><year>`
    pub table_prefix: String,

    /// Column that identifies a student across years
    pub id_column: String,

    /// IQR multiplier for outlier bounds
    pub iqr_multiplier: f64,

    /// Decimal places numeric columns are rounded to
    pub decimals: Option<u32>,

    /// Extra year profiles (JSON) layered over the built-in ones
    pub profile_file: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            years: vec![2022, 2023, 2024],
            table_prefix: "raw_data_".to_string(),
            id_column: ID_COLUMN.to_string(),
            iqr_multiplier: 1.5,
            decimals: Some(2),
            profile_file: None,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_years(mut self, years: Vec<u16>) -> Self {
        self.years = years;
        self
    }

    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    pub fn with_iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.iqr_multiplier = multiplier;
        self
    }

    pub fn with_decimals(mut self, decimals: Option<u32>) -> Self {
        self.decimals = decimals;
        self
    }

    pub fn with_profile_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.profile_file = Some(path.into());
        self
    }

    /// Name of the raw table for `year`
    pub fn table_name(&self, year: u16) -> String {
        format!("{}{}", self.table_prefix, year)
    }

    pub fn validate(&self) -> Result<()> {
        if self.years.is_empty() {
            return Err(LagwatchError::ConfigError("no years configured".to_string()));
        }
        if !self.iqr_multiplier.is_finite() || self.iqr_multiplier < 0.0 {
            return Err(LagwatchError::ConfigError(format!(
                "IQR multiplier must be a non-negative number, got {}",
                self.iqr_multiplier
            )));
        }
        Ok(())
    }
}

/// Hyperparameters of the training procedure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Share of rows held out for evaluation
    pub test_size: f64,

    /// Seed for the split, the folds and the forest
    pub random_state: u64,

    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,

    /// Folds for cross-validated F1
    pub cv_folds: usize,

    /// Weight classes by inverse frequency
    pub balanced_classes: bool,

    /// Probability at or above which a student is flagged
    pub threshold: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            random_state: 42,
            n_estimators: 100,
            max_depth: 5,
            min_samples_leaf: 10,
            cv_folds: 5,
            balanced_classes: true,
            threshold: 0.5,
        }
    }
}

impl TrainingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(LagwatchError::ConfigError(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.n_estimators == 0 {
            return Err(LagwatchError::ConfigError("n_estimators must be positive".to_string()));
        }
        if self.cv_folds < 2 {
            return Err(LagwatchError::ConfigError("cv_folds must be at least 2".to_string()));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(LagwatchError::ConfigError(format!(
                "threshold must be in [0, 1], got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Everything the command-line tool needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub training: TrainingConfig,
    /// Where the trained model is written and read
    pub model_path: PathBuf,
    /// Directory holding `<table>.csv` files
    pub data_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            training: TrainingConfig::default(),
            model_path: PathBuf::from("models/lag_model.bin"),
            data_dir: PathBuf::from("data"),
        }
    }
}

impl AppConfig {
    /// Load from a JSON file; absent fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            LagwatchError::ConfigError(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        self.training.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.pipeline.years, vec![2022, 2023, 2024]);
        assert_eq!(config.pipeline.table_name(2023), "raw_data_2023");
        assert_eq!(config.training.n_estimators, 100);
        assert_eq!(config.training.max_depth, 5);
        assert_eq!(config.training.min_samples_leaf, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"training": {{"n_estimators": 25}}, "data_dir": "/tmp/raw"}}"#).unwrap();

        let config = AppConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.training.n_estimators, 25);
        assert_eq!(config.training.max_depth, 5);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/raw"));
        assert_eq!(config.pipeline.iqr_multiplier, 1.5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(TrainingConfig::new().with_test_size(1.0).validate().is_err());
        assert!(TrainingConfig::new().with_cv_folds(1).validate().is_err());
        assert!(PipelineConfig::new().with_iqr_multiplier(-1.0).validate().is_err());
        assert!(PipelineConfig::new().with_years(Vec::new()).validate().is_err());
    }
}
