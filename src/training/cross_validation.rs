//! Stratified splitting and k-fold cross-validation

use crate::error::{LagwatchError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Row indices grouped by class, classes in ascending order
fn class_indices(y: &Array1<f64>) -> BTreeMap<i64, Vec<usize>> {
    let mut classes: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (idx, &val) in y.iter().enumerate() {
        classes.entry(val.round() as i64).or_default().push(idx);
    }
    classes
}

/// Split rows into train and test sets preserving class proportions.
///
/// Each class contributes `round(test_size * n_class)` rows to the test set,
/// clamped so that both sides keep at least one row of every class. Returns
/// `(train, test)` index lists, each sorted ascending.
pub fn stratified_train_test_split(
    y: &Array1<f64>,
    test_size: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(LagwatchError::ConfigError(format!(
            "test size must be in (0, 1), got {}",
            test_size
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(y.len());
    let mut test = Vec::new();

    for (class, mut indices) in class_indices(y) {
        let n = indices.len();
        if n < 2 {
            return Err(LagwatchError::DataError(format!(
                "class {} has {} member; stratified split needs at least 2",
                class, n
            )));
        }
        indices.shuffle(&mut rng);

        let n_test = ((n as f64) * test_size).round() as usize;
        let n_test = n_test.clamp(1, n - 1);
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

/// Stratified k-fold splitter.
///
/// Rows of each class are shuffled and dealt round-robin over the folds,
/// continuing from where the previous class stopped so fold sizes differ by
/// at most one.
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_splits: usize,
    shuffle: bool,
    random_state: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: true,
            random_state: 42,
        }
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Generate train/test splits
    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        if self.n_splits < 2 {
            return Err(LagwatchError::ConfigError(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if y.len() < self.n_splits {
            return Err(LagwatchError::DataError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                y.len(),
                self.n_splits
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];
        let mut next_fold = 0usize;

        for (class, mut indices) in class_indices(y) {
            if indices.len() < self.n_splits {
                tracing::warn!(
                    class,
                    members = indices.len(),
                    folds = self.n_splits,
                    "class has fewer members than folds"
                );
            }
            if self.shuffle {
                indices.shuffle(&mut rng);
            }
            for idx in indices {
                folds[next_fold].push(idx);
                next_fold = (next_fold + 1) % self.n_splits;
            }
        }

        let splits = (0..self.n_splits)
            .map(|fold_idx| {
                let mut test_indices = folds[fold_idx].clone();
                test_indices.sort_unstable();
                let mut train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                train_indices.sort_unstable();
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect();

        Ok(splits)
    }
}

/// Per-fold scores with their mean and population std
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CVResults {
    pub scores: Vec<f64>,
    pub mean: f64,
    pub std: f64,
}

impl CVResults {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        if scores.is_empty() {
            return Self {
                scores,
                mean: 0.0,
                std: 0.0,
            };
        }
        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Self {
            scores,
            mean,
            std: variance.sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imbalanced(n_neg: usize, n_pos: usize) -> Array1<f64> {
        let mut y = vec![0.0; n_neg];
        y.extend(vec![1.0; n_pos]);
        Array1::from_vec(y)
    }

    #[test]
    fn test_split_preserves_class_ratio() {
        let y = imbalanced(80, 20);
        let (train, test) = stratified_train_test_split(&y, 0.2, 42).unwrap();

        assert_eq!(train.len() + test.len(), 100);
        assert_eq!(test.len(), 20);
        let test_pos = test.iter().filter(|&&i| y[i] > 0.5).count();
        assert_eq!(test_pos, 4);
        assert!(train.iter().all(|i| !test.contains(i)));
    }

    #[test]
    fn test_split_is_reproducible() {
        let y = imbalanced(30, 12);
        let a = stratified_train_test_split(&y, 0.2, 42).unwrap();
        let b = stratified_train_test_split(&y, 0.2, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_split_keeps_rare_class_on_both_sides() {
        let y = imbalanced(40, 2);
        let (train, test) = stratified_train_test_split(&y, 0.2, 1).unwrap();
        assert_eq!(test.iter().filter(|&&i| y[i] > 0.5).count(), 1);
        assert_eq!(train.iter().filter(|&&i| y[i] > 0.5).count(), 1);
    }

    #[test]
    fn test_split_rejects_singleton_class() {
        let y = imbalanced(10, 1);
        assert!(stratified_train_test_split(&y, 0.2, 42).is_err());
    }

    #[test]
    fn test_kfold_covers_every_row_once() {
        let y = imbalanced(23, 9);
        let splits = StratifiedKFold::new(5).split(&y).unwrap();
        assert_eq!(splits.len(), 5);

        let mut seen: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..32).collect::<Vec<_>>());

        for split in &splits {
            assert_eq!(split.train_indices.len() + split.test_indices.len(), 32);
            let pos = split.test_indices.iter().filter(|&&i| y[i] > 0.5).count();
            assert!((1..=2).contains(&pos));
            assert!((6..=7).contains(&split.test_indices.len()));
        }
    }

    #[test]
    fn test_cv_results_population_std() {
        let results = CVResults::from_scores(vec![0.5, 0.7]);
        assert!((results.mean - 0.6).abs() < 1e-12);
        assert!((results.std - 0.1).abs() < 1e-12);
    }
}
