//! Error types for the lagwatch pipeline

use thiserror::Error;

/// Result type alias for lagwatch operations
pub type Result<T> = std::result::Result<T, LagwatchError>;

/// Main error type for the pipeline and model
#[derive(Error, Debug)]
pub enum LagwatchError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The persisted model could not be loaded by a model handle
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<polars::error::PolarsError> for LagwatchError {
    fn from(err: polars::error::PolarsError) -> Self {
        LagwatchError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for LagwatchError {
    fn from(err: serde_json::Error) -> Self {
        LagwatchError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for LagwatchError {
    fn from(err: bincode::Error) -> Self {
        LagwatchError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for LagwatchError {
    fn from(err: ndarray::ShapeError) -> Self {
        LagwatchError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
