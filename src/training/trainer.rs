//! Training procedure for the lag-worsening classifier

use super::cross_validation::{stratified_train_test_split, CVResults, StratifiedKFold};
use super::metrics::{ClassificationScores, ModelMetrics};
use super::model::{TrainedModel, FEATURE_COLUMNS};
use super::random_forest::{ClassWeight, MaxFeatures, RandomForest};
use crate::config::TrainingConfig;
use crate::error::{LagwatchError, Result};
use crate::preprocessing::StandardScaler;
use crate::schema::{LAG_CURRENT, LAG_NEXT};
use crate::utils::column_as_f64;
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use std::time::Instant;

/// `1.0` where the lag got worse in the next period.
///
/// A null on either side compares false, so such rows count as negatives.
pub fn derive_labels(df: &DataFrame) -> Result<Array1<f64>> {
    let current = column_as_f64(df, LAG_CURRENT)?;
    let next = column_as_f64(df, LAG_NEXT)?;

    Ok(current
        .into_iter()
        .zip(next.into_iter())
        .map(|pair| match pair {
            (Some(c), Some(n)) if n > c => 1.0,
            _ => 0.0,
        })
        .collect())
}

/// Feature matrix with nulls filled by each column's median
pub fn feature_matrix(df: &DataFrame, features: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let mut columns = Vec::with_capacity(features.len());

    for name in features {
        let values = column_as_f64(df, name)?;
        let fill = values.median().ok_or_else(|| {
            LagwatchError::DataError(format!("feature '{}' has no non-null values", name))
        })?;
        let nulls = values.null_count();
        if nulls > 0 {
            tracing::debug!(feature = %name, nulls, fill, "imputed feature nulls with median");
        }
        columns.push(values.into_iter().map(|v| v.unwrap_or(fill)).collect::<Vec<f64>>());
    }

    Ok(Array2::from_shape_fn((n_rows, features.len()), |(i, j)| columns[j][i]))
}

fn build_forest(config: &TrainingConfig) -> RandomForest {
    let class_weight = if config.balanced_classes {
        ClassWeight::Balanced
    } else {
        ClassWeight::Uniform
    };
    RandomForest::new(config.n_estimators)
        .with_max_depth(config.max_depth)
        .with_min_samples_leaf(config.min_samples_leaf)
        .with_max_features(MaxFeatures::Sqrt)
        .with_class_weight(class_weight)
        .with_random_state(config.random_state)
}

fn select_labels(y: &Array1<f64>, indices: &[usize]) -> Array1<f64> {
    indices.iter().map(|&i| y[i]).collect()
}

fn cross_validate_f1(
    forest: &RandomForest,
    x: &Array2<f64>,
    y: &Array1<f64>,
    config: &TrainingConfig,
) -> Result<CVResults> {
    let splits = StratifiedKFold::new(config.cv_folds)
        .with_random_state(config.random_state)
        .split(y)?;

    let mut scores = Vec::with_capacity(splits.len());
    for split in splits {
        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train = select_labels(y, &split.train_indices);
        let x_test = x.select(Axis(0), &split.test_indices);
        let y_test = select_labels(y, &split.test_indices);

        let mut fold_forest = forest.unfitted();
        fold_forest.fit(&x_train, &y_train)?;
        let y_pred = fold_forest.predict(&x_test, config.threshold)?;

        let f1 = ClassificationScores::compute(&y_test, &y_pred).f1;
        if !y_test.iter().any(|v| *v > 0.5) {
            tracing::warn!(fold = split.fold_idx, "fold has no positive rows; F1 is 0");
        }
        tracing::debug!(fold = split.fold_idx, f1, "cross-validation fold");
        scores.push(f1);
    }

    Ok(CVResults::from_scores(scores))
}

/// Fit the scaler and forest on a harmonized, labeled table.
///
/// The table must carry [`FEATURE_COLUMNS`] plus both lag columns. Labels
/// with a single class are a configuration error.
pub fn train(df: &DataFrame, config: &TrainingConfig) -> Result<TrainedModel> {
    config.validate()?;
    let start = Instant::now();

    let y = derive_labels(df)?;
    let positives = y.iter().filter(|v| **v > 0.5).count();
    let negatives = y.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(LagwatchError::ConfigError(format!(
            "labels hold a single class ({} worsening, {} not); cannot train a classifier",
            positives, negatives
        )));
    }

    let features: Vec<String> = FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect();
    let x_raw = feature_matrix(df, &features)?;

    let mut scaler = StandardScaler::new();
    let x = scaler.fit_transform(&x_raw)?;

    let (train_idx, test_idx) = stratified_train_test_split(&y, config.test_size, config.random_state)?;
    let x_train = x.select(Axis(0), &train_idx);
    let y_train = select_labels(&y, &train_idx);
    let x_test = x.select(Axis(0), &test_idx);
    let y_test = select_labels(&y, &test_idx);

    tracing::info!(
        rows = y.len(),
        positives,
        train = train_idx.len(),
        test = test_idx.len(),
        "training random forest"
    );

    let mut forest = build_forest(config);
    forest.fit(&x_train, &y_train)?;

    let y_prob = forest.predict_proba(&x_test)?;
    let y_pred = y_prob.mapv(|p| if p >= config.threshold { 1.0 } else { 0.0 });

    let cv = cross_validate_f1(&forest, &x, &y, config)?;
    let metrics = ModelMetrics::compute(&y_test, &y_pred, &y_prob, &cv)?;

    tracing::info!(
        accuracy = metrics.accuracy,
        f1 = metrics.f1,
        auc_roc = metrics.auc_roc,
        cv_f1_mean = metrics.cv_f1_mean,
        cv_f1_std = metrics.cv_f1_std,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "training finished"
    );

    Ok(TrainedModel::new(scaler, forest, features, metrics))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_treat_null_as_not_worse() {
        let df = df!(
            LAG_CURRENT => &[Some(1.0), Some(2.0), None, Some(0.0)],
            LAG_NEXT => &[Some(2.0), Some(2.0), Some(5.0), None],
        )
        .unwrap();

        let y = derive_labels(&df).unwrap();
        assert_eq!(y.to_vec(), vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_feature_matrix_fills_with_median() {
        let df = df!(
            "a" => &[Some(1.0), None, Some(3.0), Some(10.0)],
            "b" => &[5.0, 6.0, 7.0, 8.0],
        )
        .unwrap();

        let x = feature_matrix(&df, &["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(x.dim(), (4, 2));
        assert_eq!(x[[1, 0]], 3.0);
        assert_eq!(x[[3, 1]], 8.0);
    }

    #[test]
    fn test_feature_matrix_missing_column() {
        let df = df!("a" => &[1.0]).unwrap();
        let result = feature_matrix(&df, &["stone".to_string()]);
        assert!(matches!(result, Err(LagwatchError::FeatureNotFound(_))));
    }
}
