//! lagwatch - student lag-worsening prediction
//!
//! Harmonizes yearly student-performance extracts into one canonical table
//! and trains a classifier that flags students whose academic lag is likely
//! to get worse in the next period.
//!
//! # Modules
//!
//! ## Data preparation
//! - [`schema`] - Per-year column mapping, normalization, cross-year linking
//! - [`preprocessing`] - Type coercion, encoding, outliers, imputation, scaling
//! - [`pipeline`] - The end-to-end harmonization pipeline
//! - [`store`] - Tabular data sources (in-memory, CSV directory)
//!
//! ## Model
//! - [`training`] - Random forest, cross-validation, metrics, persistence
//! - [`inference`] - Shared model handle and per-student scoring
//!
//! ## Services
//! - [`config`] - Runtime configuration
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Data preparation
pub mod schema;
pub mod preprocessing;
pub mod pipeline;
pub mod store;

// Model
pub mod training;
pub mod inference;

// Services
pub mod cli;

// Utilities
pub mod utils;

pub use error::{LagwatchError, Result};

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::{AppConfig, PipelineConfig, TrainingConfig};
    pub use crate::error::{LagwatchError, Result};
    pub use crate::inference::{predict_students, ModelHandle, StudentFeatures, StudentPrediction};
    pub use crate::pipeline::{HarmonizationPipeline, PreparedDataset};
    pub use crate::preprocessing::{
        FrameTransform, NullImputer, OutlierEngine, OutlierReport, StandardScaler, TypeStandardizer,
    };
    pub use crate::schema::{ProfileRegistry, SchemaNormalizer, YearProfile};
    pub use crate::store::{CsvDirectoryStore, InMemoryStore, TabularStore};
    pub use crate::training::{train, ModelMetrics, TrainedModel, FEATURE_COLUMNS};
}
