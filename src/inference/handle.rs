//! Lazily loaded, shared model handle

use crate::error::{LagwatchError, Result};
use crate::training::TrainedModel;
use parking_lot::RwLock;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

type Loader = Box<dyn Fn() -> Result<TrainedModel> + Send + Sync>;

/// Loads a [`TrainedModel`] on first use and hands out the same instance
/// afterwards.
///
/// Concurrent first callers trigger exactly one load. A failed load leaves
/// the handle empty so the next call tries again.
pub struct ModelHandle {
    loader: Loader,
    model: RwLock<Option<Arc<TrainedModel>>>,
}

impl ModelHandle {
    /// Handle over an arbitrary loader
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<TrainedModel> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            model: RwLock::new(None),
        }
    }

    /// Handle that reads the model file at `path`
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::new(move || TrainedModel::load_path(&path))
    }

    /// Handle over an already trained model
    pub fn preloaded(model: TrainedModel) -> Self {
        let handle = Self::new(|| {
            Err(LagwatchError::ModelUnavailable("no loader configured".to_string()))
        });
        *handle.model.write() = Some(Arc::new(model));
        handle
    }

    /// The shared model, loading it if needed.
    ///
    /// Load failures surface as [`LagwatchError::ModelUnavailable`].
    pub fn get(&self) -> Result<Arc<TrainedModel>> {
        if let Some(model) = self.model.read().as_ref() {
            return Ok(Arc::clone(model));
        }

        let mut slot = self.model.write();
        if let Some(model) = slot.as_ref() {
            return Ok(Arc::clone(model));
        }

        let model = (self.loader)().map_err(|e| match e {
            LagwatchError::ModelUnavailable(msg) => LagwatchError::ModelUnavailable(msg),
            other => LagwatchError::ModelUnavailable(other.to_string()),
        })?;
        let model = Arc::new(model);
        *slot = Some(Arc::clone(&model));
        tracing::info!("model loaded");
        Ok(model)
    }

    pub fn is_loaded(&self) -> bool {
        self.model.read().is_some()
    }

    /// Drop the cached model; the next [`get`](Self::get) reloads it
    pub fn invalidate(&self) {
        *self.model.write() = None;
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let handle = ModelHandle::from_path(dir.path().join("absent.bin"));

        assert!(matches!(handle.get(), Err(LagwatchError::ModelUnavailable(_))));
        assert!(!handle.is_loaded());
    }

    #[test]
    fn test_failed_load_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = ModelHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(LagwatchError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "gone",
            )))
        });

        assert!(handle.get().is_err());
        assert!(handle.get().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
