//! Weighted binary decision tree

use crate::error::{LagwatchError, Result};
use ndarray::{Array1, Array2};
use rand::seq::index;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf holding the weighted fraction of positive samples
    Leaf {
        probability: f64,
        n_samples: usize,
    },
    /// Internal node; samples with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Weighted Gini impurity of a two-class node
fn gini(positive_weight: f64, total_weight: f64) -> f64 {
    if total_weight <= 0.0 {
        return 0.0;
    }
    let p = positive_weight / total_weight;
    2.0 * p * (1.0 - p)
}

/// Best split found for one node
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    /// Weighted impurity decrease
    gain: f64,
}

/// Binary classification tree with per-sample weights.
///
/// Labels are `0.0` / `1.0`. Leaves store the weighted share of positive
/// samples, so the tree predicts probabilities directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn at random for each split; all when `None`
    pub max_features: Option<usize>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Set features considered per split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    /// Fit the tree.
    ///
    /// `rng` drives the per-split feature draw; the same generator state
    /// gives the same tree.
    pub fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample_weight: &Array1<f64>,
        rng: &mut ChaCha8Rng,
    ) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() || n_samples != sample_weight.len() {
            return Err(LagwatchError::ShapeError {
                expected: format!("{} labels and weights", n_samples),
                actual: format!("{} labels, {} weights", y.len(), sample_weight.len()),
            });
        }
        if n_samples == 0 {
            return Err(LagwatchError::TrainingError(
                "cannot fit a tree on zero samples".to_string(),
            ));
        }

        self.n_features = x.ncols();
        let mut importances = vec![0.0; self.n_features];
        let indices: Vec<usize> = (0..n_samples).collect();

        let builder = TreeBuilder {
            tree: &*self,
            x,
            y,
            w: sample_weight,
        };
        let root = builder.build(&indices, 0, &mut importances, rng);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }

        self.root = Some(root);
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(self)
    }

    /// Positive-class probability per row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(LagwatchError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(LagwatchError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let mut node = root;
                loop {
                    match node {
                        TreeNode::Leaf { probability, .. } => break *probability,
                        TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                            node = if row[*feature_idx] <= *threshold { left.as_ref() } else { right.as_ref() };
                        }
                    }
                }
            })
            .collect())
    }

    /// Normalized impurity-decrease importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        fn leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves(left) + leaves(right),
            }
        }
        self.root.as_ref().map_or(0, leaves)
    }
}

struct TreeBuilder<'a> {
    tree: &'a DecisionTree,
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    w: &'a Array1<f64>,
}

impl TreeBuilder<'_> {
    fn weights(&self, indices: &[usize]) -> (f64, f64) {
        indices.iter().fold((0.0, 0.0), |(pos, tot), &i| {
            let w = self.w[i];
            (pos + if self.y[i] > 0.5 { w } else { 0.0 }, tot + w)
        })
    }

    fn build(
        &self,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let (positive, total) = self.weights(indices);
        let impurity = gini(positive, total);
        let leaf = TreeNode::Leaf {
            probability: if total > 0.0 { positive / total } else { 0.0 },
            n_samples,
        };

        let should_stop = n_samples < self.tree.min_samples_split
            || n_samples < 2 * self.tree.min_samples_leaf
            || self.tree.max_depth.map_or(false, |d| depth >= d)
            || impurity <= f64::EPSILON;
        if should_stop {
            return leaf;
        }

        let Some(best) = self.find_best_split(indices, total, impurity, rng) else {
            return leaf;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.x[[i, best.feature_idx]] <= best.threshold);

        importances[best.feature_idx] += best.gain;

        let left = Box::new(self.build(&left_idx, depth + 1, importances, rng));
        let right = Box::new(self.build(&right_idx, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    fn find_best_split(
        &self,
        indices: &[usize],
        total_weight: f64,
        parent_impurity: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitCandidate> {
        let n_features = self.x.ncols();
        let n_try = self.tree.max_features.unwrap_or(n_features).min(n_features);
        let features = index::sample(rng, n_features, n_try);
        let min_leaf = self.tree.min_samples_leaf;

        let mut best: Option<SplitCandidate> = None;
        let mut order: Vec<usize> = indices.to_vec();

        for feature_idx in features.iter() {
            order.sort_by(|&a, &b| {
                self.x[[a, feature_idx]]
                    .partial_cmp(&self.x[[b, feature_idx]])
                    .unwrap_or(Ordering::Equal)
            });

            let (total_pos, _) = self.weights(&order);
            let mut left_pos = 0.0;
            let mut left_tot = 0.0;

            // Sweep split positions; position k puts order[..=k] on the left
            for k in 0..order.len() - 1 {
                let i = order[k];
                let w = self.w[i];
                left_tot += w;
                if self.y[i] > 0.5 {
                    left_pos += w;
                }

                let n_left = k + 1;
                if n_left < min_leaf || order.len() - n_left < min_leaf {
                    continue;
                }
                let here = self.x[[i, feature_idx]];
                let next = self.x[[order[k + 1], feature_idx]];
                if here >= next {
                    continue;
                }

                let right_tot = total_weight - left_tot;
                let right_pos = total_pos - left_pos;
                let gain = total_weight * parent_impurity
                    - left_tot * gini(left_pos, left_tot)
                    - right_tot * gini(right_pos, right_tot);

                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature_idx,
                        threshold: (here + next) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn unit_weights(n: usize) -> Array1<f64> {
        Array1::ones(n)
    }

    #[test]
    fn test_separable_data() {
        let x = array![[0.0, 5.0], [0.1, 3.0], [0.2, 4.0], [1.0, 3.5], [1.1, 5.0], [1.2, 4.5]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut tree = DecisionTree::new();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        tree.fit(&x, &y, &unit_weights(6), &mut rng).unwrap();

        let proba = tree.predict_proba(&x).unwrap();
        assert_eq!(proba.to_vec(), vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);

        let importances = tree.feature_importances().unwrap();
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_min_samples_leaf_and_depth() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0, 1.0];

        let mut tree = DecisionTree::new().with_max_depth(1).with_min_samples_leaf(4);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        tree.fit(&x, &y, &unit_weights(8), &mut rng).unwrap();

        assert!(tree.get_depth() <= 1);
        assert!(tree.get_n_leaves() <= 2);
        let proba = tree.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_weights_shift_leaf_probability() {
        // one leaf only: the probability is the weighted positive share
        let x = array![[1.0], [1.0], [1.0]];
        let y = array![1.0, 0.0, 0.0];
        let w = array![2.0, 1.0, 1.0];

        let mut tree = DecisionTree::new();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        tree.fit(&x, &y, &w, &mut rng).unwrap();

        let proba = tree.predict_proba(&array![[1.0]]).unwrap();
        assert!((proba[0] - 0.5).abs() < 1e-12);
        assert_eq!(tree.get_n_leaves(), 1);
    }

    #[test]
    fn test_predict_requires_fit() {
        let tree = DecisionTree::new();
        assert!(matches!(
            tree.predict_proba(&array![[1.0]]),
            Err(LagwatchError::ModelNotFitted)
        ));
    }
}
