//! Utility functions shared by the pipeline stages

pub mod frame;

pub use frame::{column_as_f64, column_names, is_numeric_dtype, is_text_dtype};
