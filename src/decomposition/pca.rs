//! PCA - Principal Component Analysis
//!
//! Centers the data on the fitted means (no scaling) and extracts the
//! eigenvectors of the sample covariance matrix with cyclic Jacobi rotations.
//! Components are ordered by decreasing explained variance and each is
//! sign-normalized so its largest-magnitude loading is positive.

use crate::error::{CkdError, Result};
use ndarray::{s, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

const MAX_SWEEPS: usize = 100;
const OFF_DIAGONAL_TOL: f64 = 1e-12;

/// PCA configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pca {
    /// Number of retained components; `None` keeps all of them
    pub n_components: Option<usize>,
}

impl Pca {
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components: Some(n_components),
        }
    }

    /// Keep every component
    pub fn full() -> Self {
        Self::default()
    }

    pub fn fit(&self, x: &Array2<f64>) -> Result<FittedPca> {
        let (n, d) = x.dim();
        if n < 2 {
            return Err(CkdError::DataError(
                "PCA requires at least 2 samples".to_string(),
            ));
        }
        if d == 0 {
            return Err(CkdError::DataError(
                "PCA requires at least 1 feature".to_string(),
            ));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(CkdError::InvalidInput(
                "PCA input contains absent or non-finite values".to_string(),
            ));
        }
        let k = self.n_components.unwrap_or(d);
        if k == 0 || k > d {
            return Err(CkdError::InvalidParameter {
                name: "n_components".to_string(),
                value: k.to_string(),
                reason: format!("must be between 1 and the feature count {}", d),
            });
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| CkdError::ComputationError("Failed to compute means".to_string()))?;
        let centered = x - &mean;
        let cov = centered.t().dot(&centered) / (n as f64 - 1.0);

        let (eigenvalues, eigenvectors) = jacobi_eigen(&cov)?;

        let mut order: Vec<usize> = (0..d).collect();
        order.sort_by(|&a, &b| {
            eigenvalues[b]
                .partial_cmp(&eigenvalues[a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });

        let total_variance: f64 = eigenvalues.iter().map(|v| v.max(0.0)).sum();
        let mut components = Array2::zeros((k, d));
        let mut explained_variance = Array1::zeros(k);
        for (rank, &idx) in order.iter().take(k).enumerate() {
            let mut vector = eigenvectors.column(idx).to_owned();
            let pivot = vector
                .iter()
                .copied()
                .fold(0.0f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
            if pivot < 0.0 {
                vector.mapv_inplace(|v| -v);
            }
            components.row_mut(rank).assign(&vector);
            explained_variance[rank] = eigenvalues[idx].max(0.0);
        }
        let explained_variance_ratio = if total_variance > 0.0 {
            explained_variance.mapv(|v| v / total_variance)
        } else {
            Array1::zeros(k)
        };

        Ok(FittedPca {
            mean,
            components,
            explained_variance,
            explained_variance_ratio,
        })
    }
}

/// Fitted projection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedPca {
    mean: Array1<f64>,
    /// n_components x n_features
    components: Array2<f64>,
    explained_variance: Array1<f64>,
    explained_variance_ratio: Array1<f64>,
}

impl FittedPca {
    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    pub fn explained_variance(&self) -> &Array1<f64> {
        &self.explained_variance
    }

    pub fn explained_variance_ratio(&self) -> &Array1<f64> {
        &self.explained_variance_ratio
    }

    /// Keep the leading `k` components; equal to fitting with `k` directly
    pub fn truncated(&self, k: usize) -> Result<FittedPca> {
        if k == 0 || k > self.n_components() {
            return Err(CkdError::InvalidParameter {
                name: "n_components".to_string(),
                value: k.to_string(),
                reason: format!("must be between 1 and {}", self.n_components()),
            });
        }
        Ok(FittedPca {
            mean: self.mean.clone(),
            components: self.components.slice(s![..k, ..]).to_owned(),
            explained_variance: self.explained_variance.slice(s![..k]).to_owned(),
            explained_variance_ratio: self.explained_variance_ratio.slice(s![..k]).to_owned(),
        })
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.mean.len() {
            return Err(CkdError::ShapeError {
                expected: format!("{} features", self.mean.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok((x - &self.mean).dot(&self.components.t()))
    }
}

/// Eigen-decomposition of a symmetric matrix; eigenvectors are the columns
fn jacobi_eigen(matrix: &Array2<f64>) -> Result<(Array1<f64>, Array2<f64>)> {
    let n = matrix.nrows();
    let mut a = matrix.clone();
    let mut v = Array2::<f64>::eye(n);
    let scale = a.iter().map(|x| x * x).sum::<f64>().sqrt().max(f64::MIN_POSITIVE);

    for _ in 0..MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|p| (p + 1..n).map(move |q| (p, q)))
            .map(|(p, q)| a[[p, q]] * a[[p, q]])
            .sum::<f64>()
            .sqrt();
        if off <= OFF_DIAGONAL_TOL * scale {
            return Ok((a.diag().to_owned(), v));
        }

        for p in 0..n {
            for q in p + 1..n {
                let apq = a[[p, q]];
                if apq.abs() <= f64::MIN_POSITIVE {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    Err(CkdError::ComputationError(format!(
        "Jacobi eigen-decomposition did not converge in {} sweeps",
        MAX_SWEEPS
    )))
}
