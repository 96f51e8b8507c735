//! Support Vector Machine classifier
//!
//! Binary soft-margin SVM trained with simplified SMO (Sequential Minimal
//! Optimization) over a precomputed kernel matrix.

use super::{check_fit_input, check_predict_width, require_two_classes, Classifier};
use crate::error::{CkdError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Maximum number of samples for eager kernel matrix computation.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Kernel coefficient
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gamma {
    /// 1 / (n_features * variance of the training matrix)
    Scale,
    Value(f64),
}

impl Gamma {
    fn resolve(&self, x: &Array2<f64>) -> f64 {
        match *self {
            Gamma::Value(g) => g,
            Gamma::Scale => {
                let n = x.len() as f64;
                let mean = x.sum() / n;
                let var = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                if var > 0.0 {
                    1.0 / (x.ncols() as f64 * var)
                } else {
                    1.0
                }
            }
        }
    }
}

/// Kernel function type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KernelType {
    /// K(x, y) = x · y
    Linear,
    /// K(x, y) = (γ x · y + r)^d
    Polynomial { degree: u32, gamma: Gamma, coef0: f64 },
    /// K(x, y) = exp(-γ ||x - y||²)
    Rbf { gamma: Gamma },
}

impl Default for KernelType {
    fn default() -> Self {
        KernelType::Rbf {
            gamma: Gamma::Scale,
        }
    }
}

/// Kernel with gamma resolved against the training data
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
enum FittedKernel {
    Linear,
    Polynomial { degree: u32, gamma: f64, coef0: f64 },
    Rbf { gamma: f64 },
}

impl FittedKernel {
    fn eval(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match *self {
            FittedKernel::Linear => a.dot(&b),
            FittedKernel::Polynomial {
                degree,
                gamma,
                coef0,
            } => (gamma * a.dot(&b) + coef0).powi(degree as i32),
            FittedKernel::Rbf { gamma } => {
                let sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
                (-gamma * sq).exp()
            }
        }
    }
}

/// SVM configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    pub kernel: KernelType,
    /// Tolerance for the KKT check
    pub tol: f64,
    /// Maximum number of full passes
    pub max_iter: usize,
    /// Seed for the SMO partner choice
    pub random_state: u64,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelType::default(),
            tol: 1e-3,
            max_iter: 1000,
            random_state: 42,
        }
    }
}

impl SVMConfig {
    pub fn with_kernel(mut self, kernel: KernelType) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }
}

/// Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    config: SVMConfig,
    kernel: Option<FittedKernel>,
    support_vectors: Array2<f64>,
    /// alpha_i * y_i per support vector
    dual_coef: Array1<f64>,
    bias: f64,
    /// Labels mapped to -1 and +1
    classes: Vec<f64>,
}

impl SVMClassifier {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            kernel: None,
            support_vectors: Array2::zeros((0, 0)),
            dual_coef: Array1::zeros(0),
            bias: 0.0,
            classes: Vec::new(),
        }
    }

    pub fn n_support(&self) -> usize {
        self.dual_coef.len()
    }

    fn resolve_kernel(&self, x: &Array2<f64>) -> FittedKernel {
        match self.config.kernel {
            KernelType::Linear => FittedKernel::Linear,
            KernelType::Polynomial {
                degree,
                gamma,
                coef0,
            } => FittedKernel::Polynomial {
                degree,
                gamma: gamma.resolve(x),
                coef0,
            },
            KernelType::Rbf { gamma } => FittedKernel::Rbf {
                gamma: gamma.resolve(x),
            },
        }
    }

    /// Compute kernel matrix (upper triangle rows in parallel)
    fn compute_kernel_matrix(kernel: FittedKernel, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (i..n).map(|j| kernel.eval(x.row(i), x.row(j))).collect())
            .collect();

        let mut k = Array2::zeros((n, n));
        for (i, row_vals) in rows.into_iter().enumerate() {
            for (offset, val) in row_vals.into_iter().enumerate() {
                let j = i + offset;
                k[[i, j]] = val;
                k[[j, i]] = val;
            }
        }
        k
    }

    /// SMO over a precomputed kernel; returns alphas and bias
    fn smo_train(&self, k: &Array2<f64>, y: &Array1<f64>) -> (Array1<f64>, f64) {
        let n = y.len();
        let c = self.config.c;
        let tol = self.config.tol;
        let mut alphas = Array1::<f64>::zeros(n);
        let mut bias = 0.0;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);

        let decision = |alphas: &Array1<f64>, bias: f64, idx: usize| -> f64 {
            alphas
                .iter()
                .zip(y.iter())
                .enumerate()
                .filter(|(_, (a, _))| **a > 0.0)
                .map(|(i, (a, yi))| a * yi * k[[i, idx]])
                .sum::<f64>()
                + bias
        };

        let max_passes = 5;
        let mut passes = 0;
        let mut total_iter = 0;

        while passes < max_passes && total_iter < self.config.max_iter {
            let mut num_changed = 0;

            for i in 0..n {
                let e_i = decision(&alphas, bias, i) - y[i];
                if !((y[i] * e_i < -tol && alphas[i] < c) || (y[i] * e_i > tol && alphas[i] > 0.0)) {
                    continue;
                }

                let j = loop {
                    let j = rng.gen_range(0..n);
                    if j != i {
                        break j;
                    }
                };
                let e_j = decision(&alphas, bias, j) - y[j];

                let alpha_i_old = alphas[i];
                let alpha_j_old = alphas[j];

                let (l, h) = if y[i] != y[j] {
                    ((alpha_j_old - alpha_i_old).max(0.0), (c + alpha_j_old - alpha_i_old).min(c))
                } else {
                    ((alpha_i_old + alpha_j_old - c).max(0.0), (alpha_i_old + alpha_j_old).min(c))
                };
                if (l - h).abs() < 1e-10 {
                    continue;
                }

                let eta = 2.0 * k[[i, j]] - k[[i, i]] - k[[j, j]];
                if eta >= 0.0 {
                    continue;
                }

                alphas[j] = (alpha_j_old - y[j] * (e_i - e_j) / eta).clamp(l, h);
                if (alphas[j] - alpha_j_old).abs() < 1e-5 {
                    continue;
                }
                alphas[i] = alpha_i_old + y[i] * y[j] * (alpha_j_old - alphas[j]);

                let b1 = bias
                    - e_i
                    - y[i] * (alphas[i] - alpha_i_old) * k[[i, i]]
                    - y[j] * (alphas[j] - alpha_j_old) * k[[i, j]];
                let b2 = bias
                    - e_j
                    - y[i] * (alphas[i] - alpha_i_old) * k[[i, j]]
                    - y[j] * (alphas[j] - alpha_j_old) * k[[j, j]];

                bias = if alphas[i] > 0.0 && alphas[i] < c {
                    b1
                } else if alphas[j] > 0.0 && alphas[j] < c {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };
                num_changed += 1;
            }

            total_iter += 1;
            if num_changed == 0 {
                passes += 1;
            } else {
                passes = 0;
            }
        }

        (alphas, bias)
    }

    /// Signed distance to the separating surface; positive means the larger label
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let kernel = self.kernel.ok_or(CkdError::ModelNotFitted)?;
        check_predict_width(self.support_vectors.ncols(), x)?;
        let scores: Vec<f64> = x
            .outer_iter()
            .into_par_iter()
            .map(|row| {
                self.support_vectors
                    .outer_iter()
                    .zip(self.dual_coef.iter())
                    .map(|(sv, coef)| coef * kernel.eval(row, sv))
                    .sum::<f64>()
                    + self.bias
            })
            .collect();
        Ok(Array1::from_vec(scores))
    }
}

impl Classifier for SVMClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let classes = require_two_classes(y, self.name())?;
        if classes.len() > 2 {
            return Err(CkdError::TrainingError(format!(
                "SVM supports binary labels only, found {} classes",
                classes.len()
            )));
        }
        let n = x.nrows();
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(CkdError::InvalidInput(format!(
                "{} samples exceed the SVM kernel matrix limit of {}",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }

        let y_signed = y.mapv(|v| if (v - classes[1]).abs() < 1e-9 { 1.0 } else { -1.0 });
        let kernel = self.resolve_kernel(x);
        let k = Self::compute_kernel_matrix(kernel, x);
        let (alphas, bias) = self.smo_train(&k, &y_signed);

        let support: Vec<usize> = alphas
            .iter()
            .enumerate()
            .filter(|(_, &a)| a > 1e-8)
            .map(|(i, _)| i)
            .collect();

        self.support_vectors = x.select(ndarray::Axis(0), &support);
        self.dual_coef = support.iter().map(|&i| alphas[i] * y_signed[i]).collect();
        self.bias = bias;
        self.kernel = Some(kernel);
        self.classes = classes;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = self.decision_function(x)?;
        Ok(scores.mapv(|s| if s >= 0.0 { self.classes[1] } else { self.classes[0] }))
    }

    fn name(&self) -> &'static str {
        "svm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{accuracy_score, test_support::blobs};
    use ndarray::array;

    #[test]
    fn test_linear_svm_separates_blobs() {
        let (x, y) = blobs();
        let mut svm = SVMClassifier::new(SVMConfig::default().with_kernel(KernelType::Linear));
        svm.fit(&x, &y).unwrap();
        let acc = accuracy_score(&y, &svm.predict(&x).unwrap()).unwrap();
        assert!(acc >= 0.95, "accuracy {}", acc);
        assert!(svm.n_support() > 0);
    }

    #[test]
    fn test_rbf_and_poly_kernels() {
        let (x, y) = blobs();
        for kernel in [
            KernelType::default(),
            KernelType::Polynomial {
                degree: 3,
                gamma: Gamma::Scale,
                coef0: 1.0,
            },
        ] {
            let mut svm = SVMClassifier::new(SVMConfig::default().with_kernel(kernel));
            svm.fit(&x, &y).unwrap();
            let acc = accuracy_score(&y, &svm.predict(&x).unwrap()).unwrap();
            assert!(acc >= 0.9, "{:?}: accuracy {}", kernel, acc);
        }
    }

    #[test]
    fn test_gamma_scale() {
        let x = array![[0.0, 2.0], [2.0, 0.0]];
        // var of {0, 2, 2, 0} is 1
        assert!((Gamma::Scale.resolve(&x) - 0.5).abs() < 1e-12);
        assert_eq!(Gamma::Scale.resolve(&array![[1.0], [1.0]]), 1.0);
    }

    #[test]
    fn test_single_class_rejected() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![1.0, 1.0, 1.0];
        let mut svm = SVMClassifier::new(SVMConfig::default());
        assert!(matches!(svm.fit(&x, &y), Err(CkdError::TrainingError(_))));
    }

    #[test]
    fn test_predict_before_fit() {
        let svm = SVMClassifier::new(SVMConfig::default());
        assert!(matches!(
            svm.predict(&array![[1.0]]),
            Err(CkdError::ModelNotFitted)
        ));
    }
}
