//! Inference boundary
//!
//! Serving code holds a [`ModelHandle`], which loads the persisted model once
//! and shares it, and scores [`StudentFeatures`] with [`predict_students`].

mod handle;
mod request;

pub use handle::ModelHandle;
pub use request::{predict_students, students_to_frame, StudentFeatures, StudentPrediction};
