//! The trained model: scaler, forest, feature list and metrics

use super::metrics::ModelMetrics;
use super::persistence::{read_artifact, write_artifact, ArtifactMetadata};
use super::random_forest::RandomForest;
use crate::error::{LagwatchError, Result};
use crate::preprocessing::StandardScaler;
use crate::utils::column_as_f64;
use chrono::{DateTime, Utc};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Features the lag-worsening model reads, in matrix column order
pub const FEATURE_COLUMNS: &[&str] = &[
    "ieg", "iaa", "ips", "ida", "ian", "ipv", "inde", "stone", "age",
];

/// A fitted classifier with the preprocessing it was trained with.
///
/// Only [`train`](super::train) creates one; afterwards it is read-only
/// apart from being reloaded from persisted bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    scaler: StandardScaler,
    classifier: RandomForest,
    feature_columns: Vec<String>,
    metrics: ModelMetrics,
    trained_at: DateTime<Utc>,
}

impl TrainedModel {
    pub(crate) fn new(
        scaler: StandardScaler,
        classifier: RandomForest,
        feature_columns: Vec<String>,
        metrics: ModelMetrics,
    ) -> Self {
        Self {
            scaler,
            classifier,
            feature_columns,
            metrics,
            trained_at: Utc::now(),
        }
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn metrics(&self) -> &ModelMetrics {
        &self.metrics
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    pub fn classifier(&self) -> &RandomForest {
        &self.classifier
    }

    /// Probability that each row's lag worsens.
    ///
    /// Nulls in a feature are filled with that feature's median over this
    /// batch, not with a training-time statistic; a batch of one row with a
    /// null has nothing to fill from and fails.
    pub fn predict_probability(&self, df: &DataFrame) -> Result<Vec<f64>> {
        let n_rows = df.height();
        if n_rows == 0 {
            return Ok(Vec::new());
        }

        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(self.feature_columns.len());
        for name in &self.feature_columns {
            let values = column_as_f64(df, name)?;
            let fill = values.median().ok_or_else(|| {
                LagwatchError::InvalidInput(format!("feature '{}' has no values in this batch", name))
            })?;
            columns.push(values.into_iter().map(|v| v.unwrap_or(fill)).collect());
        }

        let x = Array2::from_shape_fn((n_rows, columns.len()), |(i, j)| columns[j][i]);
        let scaled = self.scaler.transform(&x)?;
        let proba = self.classifier.predict_proba(&scaled)?;

        Ok(proba.iter().map(|p| p.clamp(0.0, 1.0)).collect())
    }

    /// `1` where the probability is at least `threshold`, else `0`
    pub fn predict_label(&self, df: &DataFrame, threshold: f64) -> Result<Vec<u8>> {
        Ok(self
            .predict_probability(df)?
            .into_iter()
            .map(|p| u8::from(p >= threshold))
            .collect())
    }

    /// Features with their importance, most important first
    pub fn feature_importance(&self) -> Vec<(String, f64)> {
        let Some(importances) = self.classifier.feature_importances() else {
            return Vec::new();
        };

        let mut ranked: Vec<(String, f64)> = self
            .feature_columns
            .iter()
            .cloned()
            .zip(importances.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    /// Read-only overview for reporting
    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            feature_columns: self.feature_columns.clone(),
            feature_importance: self.feature_importance(),
            metrics: self.metrics.clone(),
            n_trees: self.classifier.n_trees(),
            trained_at: self.trained_at,
        }
    }

    fn artifact_metadata(&self) -> ArtifactMetadata {
        let metrics = BTreeMap::from([
            ("accuracy".to_string(), self.metrics.accuracy),
            ("precision".to_string(), self.metrics.precision),
            ("recall".to_string(), self.metrics.recall),
            ("f1".to_string(), self.metrics.f1),
            ("auc_roc".to_string(), self.metrics.auc_roc),
            ("cv_f1_mean".to_string(), self.metrics.cv_f1_mean),
            ("cv_f1_std".to_string(), self.metrics.cv_f1_std),
        ]);
        ArtifactMetadata {
            trained_at: self.trained_at.to_rfc3339(),
            feature_names: self.feature_columns.clone(),
            model_type: "random_forest_classifier".to_string(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            metrics,
        }
    }

    /// Write the full model state to a byte sink
    pub fn persist<W: Write>(&self, writer: W) -> Result<()> {
        write_artifact(self, self.artifact_metadata(), writer)
    }

    /// Write the model to a file, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        self.persist(BufWriter::new(file))?;
        tracing::info!(path = %path.display(), "saved model");
        Ok(())
    }

    /// Read a model written by [`persist`](Self::persist)
    pub fn load<R: Read>(reader: R) -> Result<Self> {
        let (model, metadata): (Self, ArtifactMetadata) = read_artifact(reader)?;
        tracing::debug!(
            trained_at = %metadata.trained_at,
            version = %metadata.crate_version,
            "loaded model artifact"
        );
        Ok(model)
    }

    /// Read a model from a file
    pub fn load_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::load(BufReader::new(file))
    }
}

/// Feature list, ranked importances and metrics of a model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSummary {
    pub feature_columns: Vec<String>,
    pub feature_importance: Vec<(String, f64)>,
    pub metrics: ModelMetrics,
    pub n_trees: usize,
    pub trained_at: DateTime<Utc>,
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "random forest, {} trees, trained {}", self.n_trees, self.trained_at.to_rfc3339())?;
        writeln!(f, "features: {}", self.feature_columns.join(", "))?;
        writeln!(f)?;
        writeln!(f, "{}", self.metrics)?;
        writeln!(f)?;
        writeln!(f, "importance")?;
        for (name, score) in &self.feature_importance {
            writeln!(f, "  {:<8} {:.4}", name, score)?;
        }
        Ok(())
    }
}
