//! Seeded train / held-out partition and accuracy

use crate::error::{CkdError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A fixed partition of one feature matrix; row order inside each side follows
/// the shuffled permutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainTestSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
}

/// Shuffle the rows with a seeded generator and hold out
/// `ceil(test_fraction * n)` of them. The same inputs and seed always
/// produce the same partition.
pub fn train_test_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    test_fraction: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    let n = x.nrows();
    if n != y.len() {
        return Err(CkdError::ShapeError {
            expected: format!("y length = {}", n),
            actual: format!("y length = {}", y.len()),
        });
    }
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(CkdError::InvalidParameter {
            name: "test_fraction".to_string(),
            value: test_fraction.to_string(),
            reason: "must be strictly between 0 and 1".to_string(),
        });
    }

    let n_test = (test_fraction * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(CkdError::DataError(format!(
            "cannot split {} rows with test fraction {}",
            n, test_fraction
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_indices = indices[..n_test].to_vec();
    let train_indices = indices[n_test..].to_vec();

    Ok(TrainTestSplit {
        x_train: x.select(Axis(0), &train_indices),
        x_test: x.select(Axis(0), &test_indices),
        y_train: y.select(Axis(0), &train_indices),
        y_test: y.select(Axis(0), &test_indices),
        train_indices,
        test_indices,
    })
}

/// Fraction of predictions equal to the true label
pub fn accuracy_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    if y_true.len() != y_pred.len() {
        return Err(CkdError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(CkdError::ValidationError(
            "accuracy of an empty split is undefined".to_string(),
        ));
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    Ok(correct as f64 / y_true.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn data(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| (i * 10 + j) as f64);
        let y = Array1::from_shape_fn(n, |i| (i % 2) as f64);
        (x, y)
    }

    #[test]
    fn test_split_sizes_round_test_side_up() {
        let (x, y) = data(11);
        let split = train_test_split(&x, &y, 0.2, 12).unwrap();
        assert_eq!(split.test_indices.len(), 3);
        assert_eq!(split.train_indices.len(), 8);
        assert_eq!(split.x_train.nrows(), 8);
        assert_eq!(split.y_test.len(), 3);
    }

    #[test]
    fn test_split_is_a_partition() {
        let (x, y) = data(30);
        let split = train_test_split(&x, &y, 0.2, 12).unwrap();
        let mut all: Vec<usize> = split
            .train_indices
            .iter()
            .chain(split.test_indices.iter())
            .copied()
            .collect();
        all.sort();
        assert_eq!(all, (0..30).collect::<Vec<_>>());
        for (k, &row) in split.test_indices.iter().enumerate() {
            assert_eq!(split.x_test.row(k), x.row(row));
            assert_eq!(split.y_test[k], y[row]);
        }
    }

    #[test]
    fn test_split_is_deterministic() {
        let (x, y) = data(25);
        let a = train_test_split(&x, &y, 0.2, 12).unwrap();
        let b = train_test_split(&x, &y, 0.2, 12).unwrap();
        assert_eq!(a.test_indices, b.test_indices);
        let c = train_test_split(&x, &y, 0.2, 13).unwrap();
        assert_ne!(a.test_indices, c.test_indices);
    }

    #[test]
    fn test_bad_fraction_rejected() {
        let (x, y) = data(10);
        assert!(train_test_split(&x, &y, 0.0, 1).is_err());
        assert!(train_test_split(&x, &y, 1.0, 1).is_err());
        let (x, y) = data(1);
        assert!(train_test_split(&x, &y, 0.5, 1).is_err());
    }

    #[test]
    fn test_accuracy() {
        let t = array![1.0, 0.0, 1.0, 1.0];
        let p = array![1.0, 1.0, 1.0, 0.0];
        assert!((accuracy_score(&t, &p).unwrap() - 0.5).abs() < 1e-12);
        assert!(accuracy_score(&t, &array![1.0]).is_err());
    }

    #[test]
    fn test_accuracy_counts_exact_matches_only() {
        let t = array![1.0, 0.0, 2.0];
        let p = array![0.9, 0.0, 2.4];
        assert!((accuracy_score(&t, &p).unwrap() - 1.0 / 3.0).abs() < 1e-12);
    }
}
