//! Model training module
//!
//! Fits the lag-worsening classifier:
//! - Decision trees and the random forest built from them
//! - Stratified holdout split and k-fold cross-validation
//! - Holdout metrics (accuracy, precision, recall, F1, AUC-ROC)
//! - The [`TrainedModel`] and its persisted form

pub mod cross_validation;
pub mod decision_tree;
pub mod metrics;
pub mod model;
pub mod persistence;
pub mod random_forest;
pub mod trainer;

pub use cross_validation::{stratified_train_test_split, CVResults, CVSplit, StratifiedKFold};
pub use decision_tree::{DecisionTree, TreeNode};
pub use metrics::{roc_auc, ClassificationScores, ModelMetrics};
pub use model::{ModelSummary, TrainedModel, FEATURE_COLUMNS};
pub use persistence::ArtifactMetadata;
pub use random_forest::{ClassWeight, MaxFeatures, RandomForest};
pub use trainer::{derive_labels, feature_matrix, train};
