//! K-Nearest Neighbors classifier

use super::{check_fit_input, check_predict_width, class_index, class_labels, Classifier};
use crate::error::{CkdError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightScheme {
    /// All neighbors have equal weight
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    #[default]
    Distance,
}

/// Euclidean K-Nearest Neighbors Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNClassifier {
    n_neighbors: usize,
    weights: WeightScheme,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
    classes: Vec<f64>,
}

impl KNNClassifier {
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors,
            weights: WeightScheme::Distance,
            x_train: None,
            y_train: None,
            classes: Vec::new(),
        }
    }

    pub fn with_weights(mut self, weights: WeightScheme) -> Self {
        self.weights = weights;
        self
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    /// (distance, label) of the k nearest training rows, ordered by distance then row
    fn k_nearest(&self, point: ArrayView1<f64>, x_train: &Array2<f64>, y_train: &Array1<f64>) -> Vec<(f64, f64)> {
        let mut all: Vec<(f64, usize)> = x_train
            .outer_iter()
            .enumerate()
            .map(|(i, row)| {
                let d = row
                    .iter()
                    .zip(point.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>()
                    .sqrt();
                (d, i)
            })
            .collect();
        let k = self.n_neighbors.min(all.len());
        if k < all.len() {
            all.select_nth_unstable_by(k, cmp_neighbor);
            all.truncate(k);
        }
        all.sort_by(cmp_neighbor);
        all.into_iter().map(|(d, i)| (d, y_train[i])).collect()
    }

    /// Weighted vote; exact matches outvote everything else
    fn vote(&self, neighbors: &[(f64, f64)]) -> f64 {
        let mut votes = vec![0.0; self.classes.len()];
        let use_exact =
            self.weights == WeightScheme::Distance && neighbors.iter().any(|(d, _)| *d == 0.0);

        for &(dist, label) in neighbors {
            let weight = match self.weights {
                WeightScheme::Uniform => 1.0,
                WeightScheme::Distance if use_exact => {
                    if dist == 0.0 {
                        1.0
                    } else {
                        0.0
                    }
                }
                WeightScheme::Distance => 1.0 / dist,
            };
            if let Some(idx) = class_index(&self.classes, label) {
                votes[idx] += weight;
            }
        }

        // ties go to the smaller label
        let mut best = 0;
        for (idx, &v) in votes.iter().enumerate() {
            if v > votes[best] {
                best = idx;
            }
        }
        self.classes[best]
    }
}

fn cmp_neighbor(a: &(f64, usize), b: &(f64, usize)) -> Ordering {
    a.0.partial_cmp(&b.0)
        .unwrap_or(Ordering::Equal)
        .then(a.1.cmp(&b.1))
}

impl Classifier for KNNClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.n_neighbors == 0 {
            return Err(CkdError::InvalidParameter {
                name: "n_neighbors".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        self.classes = class_labels(y);
        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let x_train = self.x_train.as_ref().ok_or(CkdError::ModelNotFitted)?;
        let y_train = self.y_train.as_ref().ok_or(CkdError::ModelNotFitted)?;
        check_predict_width(x_train.ncols(), x)?;

        let predictions: Vec<f64> = x
            .outer_iter()
            .into_par_iter()
            .map(|row| {
                let neighbors = self.k_nearest(row, x_train, y_train);
                self.vote(&neighbors)
            })
            .collect();
        Ok(Array1::from_vec(predictions))
    }

    fn name(&self) -> &'static str {
        "knn"
    }
}
