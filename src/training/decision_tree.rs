//! Gini decision tree classifier

use super::{check_fit_input, check_predict_width, class_index, class_labels, Classifier};
use crate::error::{CkdError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf predicting the majority class
    Leaf { class_idx: usize, n_samples: usize },
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

impl TreeNode {
    fn predict_row(&self, row: ArrayView1<f64>) -> usize {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { class_idx, .. } => return *class_idx,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold {
                        &**left
                    } else {
                        &**right
                    };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    weighted_impurity: f64,
}

/// Decision tree classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn at random per node; `None` considers all of them
    pub max_features: Option<usize>,
    pub random_state: u64,
    n_features: usize,
    classes: Vec<f64>,
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
            random_state: 0,
            n_features: 0,
            classes: Vec::new(),
            feature_importances: None,
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    /// Normalized total impurity decrease per feature
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    fn gini(counts: &[usize], total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        let n = total as f64;
        1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
    }

    fn majority(counts: &[usize]) -> usize {
        let mut best = 0;
        for (idx, &c) in counts.iter().enumerate() {
            if c > counts[best] {
                best = idx;
            }
        }
        best
    }

    fn class_counts(&self, labels: &[usize], indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.classes.len()];
        for &i in indices {
            counts[labels[i]] += 1;
        }
        counts
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        labels: &[usize],
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();
        let counts = self.class_counts(labels, indices);
        let leaf = TreeNode::Leaf {
            class_idx: Self::majority(&counts),
            n_samples,
        };

        let is_pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        if is_pure
            || n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.is_some_and(|d| depth >= d)
        {
            return leaf;
        }

        let parent_impurity = Self::gini(&counts, n_samples);
        let Some(best) = self.find_best_split(x, labels, indices, rng) else {
            return leaf;
        };
        if best.weighted_impurity >= parent_impurity {
            return leaf;
        }

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);

        importances[best.feature_idx] +=
            n_samples as f64 * (parent_impurity - best.weighted_impurity);

        let left = Box::new(self.build_tree(x, labels, &left_indices, depth + 1, rng, importances));
        let right = Box::new(self.build_tree(x, labels, &right_indices, depth + 1, rng, importances));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity: parent_impurity,
        }
    }

    /// Sorted sweep over each candidate feature, accumulating class counts on
    /// the left side
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        labels: &[usize],
        indices: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitCandidate> {
        let n_features = x.ncols();
        let features: Vec<usize> = match self.max_features {
            Some(m) if m < n_features => {
                let mut drawn = index::sample(rng, n_features, m.max(1)).into_vec();
                drawn.sort_unstable();
                drawn
            }
            _ => (0..n_features).collect(),
        };

        let n = indices.len();
        let n_classes = self.classes.len();
        let total_counts = self.class_counts(labels, indices);
        let mut best: Option<SplitCandidate> = None;

        for feature_idx in features {
            let mut order: Vec<(f64, usize)> = indices
                .iter()
                .map(|&i| (x[[i, feature_idx]], labels[i]))
                .collect();
            order.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_counts = vec![0usize; n_classes];
            for pos in 0..n - 1 {
                left_counts[order[pos].1] += 1;
                let n_left = pos + 1;
                let n_right = n - n_left;
                if order[pos].0 >= order[pos + 1].0 {
                    continue;
                }
                if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                    continue;
                }
                let right_counts: Vec<usize> = total_counts
                    .iter()
                    .zip(&left_counts)
                    .map(|(t, l)| t - l)
                    .collect();
                let weighted = (n_left as f64 * Self::gini(&left_counts, n_left)
                    + n_right as f64 * Self::gini(&right_counts, n_right))
                    / n as f64;

                if best
                    .as_ref()
                    .map_or(true, |b| weighted < b.weighted_impurity)
                {
                    best = Some(SplitCandidate {
                        feature_idx,
                        threshold: (order[pos].0 + order[pos + 1].0) / 2.0,
                        weighted_impurity: weighted,
                    });
                }
            }
        }
        best
    }
}

impl Classifier for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.min_samples_leaf == 0 || self.min_samples_split < 2 {
            return Err(CkdError::ValidationError(
                "min_samples_leaf must be >= 1 and min_samples_split >= 2".to_string(),
            ));
        }

        self.classes = class_labels(y);
        self.n_features = x.ncols();
        let labels: Vec<usize> = y
            .iter()
            .map(|&v| class_index(&self.classes, v).unwrap_or(0))
            .collect();

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut importances = vec![0.0; self.n_features];
        let indices: Vec<usize> = (0..x.nrows()).collect();
        let root = self.build_tree(x, &labels, &indices, 0, &mut rng, &mut importances);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }
        self.feature_importances = Some(Array1::from_vec(importances));
        self.root = Some(root);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(CkdError::ModelNotFitted)?;
        check_predict_width(self.n_features, x)?;
        Ok(x
            .outer_iter()
            .map(|row| self.classes[root.predict_row(row)])
            .collect())
    }

    fn name(&self) -> &'static str {
        "decision_tree"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{accuracy_score, test_support::blobs};
    use ndarray::array;

    #[test]
    fn test_tree_fits_training_data() {
        let (x, y) = blobs();
        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();
        let acc = accuracy_score(&y, &tree.predict(&x).unwrap()).unwrap();
        assert_eq!(acc, 1.0);
    }

    #[test]
    fn test_xor_needs_depth_two() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 1.0, 1.0, 0.0];
        let mut tree = DecisionTree::new().with_max_depth(Some(1));
        tree.fit(&x, &y).unwrap();
        // a single split cannot lower the gini impurity of xor
        assert_eq!(tree.root().unwrap().depth(), 0);
    }

    #[test]
    fn test_threshold_at_midpoint() {
        let x = array![[1.0], [2.0], [4.0], [6.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();
        match tree.root().unwrap() {
            TreeNode::Split { threshold, .. } => assert_eq!(*threshold, 3.0),
            other => panic!("expected a split, got {:?}", other),
        }
        assert_eq!(tree.feature_importances().unwrap()[0], 1.0);
    }

    #[test]
    fn test_single_class_gives_leaf() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0, 1.0];
        let mut tree = DecisionTree::new();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&array![[9.0]]).unwrap()[0], 1.0);
    }

    #[test]
    fn test_feature_sampling_is_seeded() {
        let (x, y) = blobs();
        let fit = |seed| {
            let mut t = DecisionTree::new()
                .with_max_features(Some(1))
                .with_random_state(seed);
            t.fit(&x, &y).unwrap();
            t.predict(&x).unwrap()
        };
        assert_eq!(fit(3), fit(3));
    }
}
