//! Random Forest classifier

use super::decision_tree::DecisionTree;
use super::{check_fit_input, check_predict_width, class_index, class_labels, Classifier};
use crate::error::{CkdError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

/// Bagged ensemble of Gini trees with per-node feature sampling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub random_state: u64,
    n_features: usize,
    classes: Vec<f64>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            random_state: 0,
            n_features: 0,
            classes: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn compute_max_features(&self, n_features: usize) -> usize {
        match self.max_features {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.n_estimators == 0 {
            return Err(CkdError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let n_samples = x.nrows();
        self.n_features = x.ncols();
        self.classes = class_labels(y);
        let max_features = self.compute_max_features(self.n_features);
        let base_seed = self.random_state;

        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<DecisionTree> {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot = y.select(Axis(0), &sample_indices);

                let mut tree = DecisionTree::new()
                    .with_max_depth(self.max_depth)
                    .with_max_features(Some(max_features))
                    .with_random_state(rng.gen());
                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect::<Result<_>>()?;

        self.trees = trees;
        Ok(())
    }

    /// Majority vote over trees; ties go to the smaller label
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(CkdError::ModelNotFitted);
        }
        check_predict_width(self.n_features, x)?;

        let all_predictions: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<_>>()?;

        let predictions: Array1<f64> = (0..x.nrows())
            .map(|i| {
                let mut votes = vec![0usize; self.classes.len()];
                for preds in &all_predictions {
                    if let Some(idx) = class_index(&self.classes, preds[i]) {
                        votes[idx] += 1;
                    }
                }
                let mut best = 0;
                for (idx, &v) in votes.iter().enumerate() {
                    if v > votes[best] {
                        best = idx;
                    }
                }
                self.classes[best]
            })
            .collect();
        Ok(predictions)
    }

    fn name(&self) -> &'static str {
        "random_forest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{accuracy_score, test_support::blobs};

    #[test]
    fn test_forest_separates_blobs() {
        let (x, y) = blobs();
        let mut forest = RandomForest::new(20).with_random_state(7);
        forest.fit(&x, &y).unwrap();
        assert_eq!(forest.n_trees(), 20);
        let acc = accuracy_score(&y, &forest.predict(&x).unwrap()).unwrap();
        assert!(acc >= 0.95, "accuracy {}", acc);
    }

    #[test]
    fn test_forest_is_deterministic_for_a_seed() {
        let (x, y) = blobs();
        let run = || {
            let mut forest = RandomForest::new(10).with_random_state(3);
            forest.fit(&x, &y).unwrap();
            forest.predict(&x).unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_max_features_rules() {
        let forest = RandomForest::new(1);
        assert_eq!(forest.compute_max_features(24), 4);
        assert_eq!(forest.compute_max_features(1), 1);
        let forest = RandomForest::new(1).with_max_features(MaxFeatures::Fixed(50));
        assert_eq!(forest.compute_max_features(24), 24);
    }
}
