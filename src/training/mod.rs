//! Classifier families and the fixed train / held-out split
//!
//! Every family implements [`Classifier`]; [`ClassifierSpec`] is the
//! serializable description the evaluator builds fresh instances from, so no
//! fitted state is ever shared between component counts or variants.
//!
//! - Support vector machines (linear, RBF, polynomial kernels)
//! - K-nearest neighbours with inverse-distance voting
//! - Gaussian naive Bayes
//! - Logistic regression
//! - Decision trees and random forests
//! - Multi-layer perceptron
//! - SAMME adaptive boosting over any non-ensemble family

pub mod adaboost;
pub mod decision_tree;
pub mod knn;
pub mod linear_models;
pub mod naive_bayes;
pub mod neural_network;
pub mod random_forest;
mod roster;
mod split;
pub mod svm;

pub use adaboost::AdaBoostClassifier;
pub use decision_tree::{DecisionTree, TreeNode};
pub use knn::{KNNClassifier, WeightScheme};
pub use linear_models::LogisticRegression;
pub use naive_bayes::GaussianNaiveBayes;
pub use neural_network::{Activation, MLPClassifier, MLPConfig};
pub use random_forest::{MaxFeatures, RandomForest};
pub use roster::{default_roster, neural_roster, validate_roster, ClassifierSpec, RosterEntry};
pub use split::{accuracy_score, train_test_split, TrainTestSplit};
pub use svm::{Gamma, KernelType, SVMClassifier, SVMConfig};

use crate::error::{CkdError, Result};
use ndarray::{Array1, Array2};

/// A binary (or multi-class) classifier over a dense, complete feature matrix
pub trait Classifier: Send + Sync + std::fmt::Debug {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Family name used in logs
    fn name(&self) -> &'static str;
}

/// Shared input checks for `fit`
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(CkdError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(CkdError::TrainingError(
            "cannot fit on an empty training split".to_string(),
        ));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(CkdError::InvalidInput(
            "training data contains absent or non-finite values".to_string(),
        ));
    }
    Ok(())
}

/// Sorted distinct labels
pub(crate) fn class_labels(y: &Array1<f64>) -> Vec<f64> {
    let mut classes: Vec<f64> = y.to_vec();
    classes.sort_by(|a, b| a.total_cmp(b));
    classes.dedup();
    classes
}

/// Sorted distinct labels, failing when the split holds a single class
pub(crate) fn require_two_classes(y: &Array1<f64>, family: &str) -> Result<Vec<f64>> {
    let classes = class_labels(y);
    if classes.len() < 2 {
        return Err(CkdError::TrainingError(format!(
            "{} needs at least 2 classes in the training split, found {}",
            family,
            classes.len()
        )));
    }
    Ok(classes)
}

pub(crate) fn class_index(classes: &[f64], label: f64) -> Option<usize> {
    classes.iter().position(|&c| (c - label).abs() < 1e-9)
}

pub(crate) fn check_predict_width(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(CkdError::ShapeError {
            expected: format!("{} features", expected),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}
