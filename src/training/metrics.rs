//! Evaluation metrics for the binary classifier

use super::cross_validation::CVResults;
use crate::error::{LagwatchError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Metrics snapshot taken once at training time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Holdout accuracy
    pub accuracy: f64,
    /// Holdout precision
    pub precision: f64,
    /// Holdout recall
    pub recall: f64,
    /// Holdout F1 score
    pub f1: f64,
    /// Holdout AUC-ROC
    pub auc_roc: f64,
    /// Mean F1 across CV folds
    pub cv_f1_mean: f64,
    /// Population std of F1 across CV folds
    pub cv_f1_std: f64,
}

impl ModelMetrics {
    /// Compute holdout metrics and attach the CV summary.
    ///
    /// `y_pred` holds hard labels, `y_prob` positive-class probabilities.
    pub fn compute(
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
        y_prob: &Array1<f64>,
        cv: &CVResults,
    ) -> Result<Self> {
        let scores = ClassificationScores::compute(y_true, y_pred);
        Ok(Self {
            accuracy: scores.accuracy,
            precision: scores.precision,
            recall: scores.recall,
            f1: scores.f1,
            auc_roc: roc_auc(y_true, y_prob)?,
            cv_f1_mean: cv.mean,
            cv_f1_std: cv.std,
        })
    }
}

impl fmt::Display for ModelMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "accuracy   {:.4}", self.accuracy)?;
        writeln!(f, "precision  {:.4}", self.precision)?;
        writeln!(f, "recall     {:.4}", self.recall)?;
        writeln!(f, "f1         {:.4}", self.f1)?;
        writeln!(f, "auc_roc    {:.4}", self.auc_roc)?;
        write!(f, "cv_f1      {:.4} +/- {:.4}", self.cv_f1_mean, self.cv_f1_std)
    }
}

/// Threshold metrics from hard labels. A ratio with a zero denominator is 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationScores {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl ClassificationScores {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let (tp, fp, tn, fn_) = confusion_counts(y_true, y_pred);
        let total = tp + fp + tn + fn_;

        let ratio = |num: usize, den: usize| if den > 0 { num as f64 / den as f64 } else { 0.0 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            accuracy: ratio(tp + tn, total),
            precision,
            recall,
            f1,
        }
    }
}

/// `(tp, fp, tn, fn)` with 1 as the positive class
pub fn confusion_counts(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> (usize, usize, usize, usize) {
    let mut tp = 0;
    let mut fp = 0;
    let mut tn = 0;
    let mut fn_ = 0;

    for (t, p) in y_true.iter().zip(y_pred.iter()) {
        match (*t > 0.5, *p > 0.5) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (false, false) => tn += 1,
            (true, false) => fn_ += 1,
        }
    }

    (tp, fp, tn, fn_)
}

/// Area under the ROC curve via the rank-sum statistic; tied scores share
/// their average rank.
///
/// Undefined, and an error, when `y_true` holds a single class.
pub fn roc_auc(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<f64> {
    if y_true.len() != scores.len() {
        return Err(LagwatchError::ShapeError {
            expected: format!("{} scores", y_true.len()),
            actual: format!("{} scores", scores.len()),
        });
    }

    let n_pos = y_true.iter().filter(|v| **v > 0.5).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(LagwatchError::TrainingError(
            "AUC-ROC is undefined when only one class is present".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based ranks i+1 ..= j+1 share their mean
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = rank;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = y_true
        .iter()
        .zip(ranks.iter())
        .filter(|(t, _)| **t > 0.5)
        .map(|(_, r)| r)
        .sum();
    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Ok((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_classification_scores() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];

        let scores = ClassificationScores::compute(&y_true, &y_pred);
        assert_relative_eq!(scores.accuracy, 0.75);
        assert_relative_eq!(scores.precision, 0.75);
        assert_relative_eq!(scores.recall, 0.75);
        assert_relative_eq!(scores.f1, 0.75);
    }

    #[test]
    fn test_no_positive_predictions_score_zero() {
        let y_true = array![1.0, 0.0, 1.0];
        let y_pred = array![0.0, 0.0, 0.0];
        let scores = ClassificationScores::compute(&y_true, &y_pred);
        assert_eq!(scores.precision, 0.0);
        assert_eq!(scores.f1, 0.0);
    }

    #[test]
    fn test_roc_auc_perfect_and_ties() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        assert_relative_eq!(roc_auc(&y, &array![0.1, 0.2, 0.8, 0.9]).unwrap(), 1.0);
        assert_relative_eq!(roc_auc(&y, &array![0.5, 0.5, 0.5, 0.5]).unwrap(), 0.5);
        // one inverted pair out of four
        assert_relative_eq!(roc_auc(&y, &array![0.1, 0.6, 0.4, 0.9]).unwrap(), 0.75);
    }

    #[test]
    fn test_roc_auc_single_class_errors() {
        let y = array![1.0, 1.0];
        assert!(roc_auc(&y, &array![0.2, 0.3]).is_err());
    }
}
