//! Yeo-Johnson power transform

use super::{check_width, ensure_finite, StandardScaler, Transformer};
use crate::error::{CkdError, Result};
use crate::imputation::is_missing;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

const LAMBDA_MIN: f64 = -5.0;
const LAMBDA_MAX: f64 = 5.0;
const LAMBDA_GRID_STEP: f64 = 0.1;
const GOLDEN_TOL: f64 = 1e-8;

/// Monotonic power remap toward a Gaussian shape.
///
/// One lambda per column is chosen by maximum likelihood over the observed
/// values: a coarse grid search over [-5, 5] refined by golden-section search
/// around the best grid point. With `standardize` the transformed columns are
/// then scaled to zero mean and unit variance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerTransformer {
    standardize: bool,
    lambdas: Option<Vec<f64>>,
    scaler: Option<StandardScaler>,
}

impl Default for PowerTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerTransformer {
    pub fn new() -> Self {
        Self {
            standardize: true,
            lambdas: None,
            scaler: None,
        }
    }

    pub fn with_standardize(mut self, standardize: bool) -> Self {
        self.standardize = standardize;
        self
    }

    /// Fitted lambda per column
    pub fn lambdas(&self) -> Option<&[f64]> {
        self.lambdas.as_deref()
    }

    fn apply_lambdas(&self, lambdas: &[f64], x: &Array2<f64>) -> Array2<f64> {
        let mut out = x.clone();
        for (mut col, &lambda) in out.axis_iter_mut(Axis(1)).zip(lambdas) {
            col.mapv_inplace(|v| {
                if is_missing(v) {
                    v
                } else {
                    yeo_johnson(v, lambda)
                }
            });
        }
        out
    }
}

/// Yeo-Johnson transform of one value
pub fn yeo_johnson(x: f64, lambda: f64) -> f64 {
    if x >= 0.0 {
        if lambda.abs() < f64::EPSILON {
            x.ln_1p()
        } else {
            ((x + 1.0).powf(lambda) - 1.0) / lambda
        }
    } else if (lambda - 2.0).abs() > f64::EPSILON {
        -((1.0 - x).powf(2.0 - lambda) - 1.0) / (2.0 - lambda)
    } else {
        -(-x).ln_1p()
    }
}

/// Profile log-likelihood of lambda for observed values
fn log_likelihood(values: &[f64], lambda: f64) -> f64 {
    let n = values.len() as f64;
    let transformed: Vec<f64> = values.iter().map(|&v| yeo_johnson(v, lambda)).collect();
    let mean = transformed.iter().sum::<f64>() / n;
    let var = transformed.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / n;
    if var <= 0.0 || !var.is_finite() {
        return f64::NEG_INFINITY;
    }
    let jacobian: f64 = values.iter().map(|&v| v.signum() * v.abs().ln_1p()).sum();
    -n / 2.0 * var.ln() + (lambda - 1.0) * jacobian
}

fn optimize_lambda(values: &[f64]) -> f64 {
    if values.len() < 2 || values.iter().all(|&v| v == values[0]) {
        return 1.0;
    }

    let steps = ((LAMBDA_MAX - LAMBDA_MIN) / LAMBDA_GRID_STEP).round() as usize;
    let mut best_lambda = 1.0;
    let mut best_ll = f64::NEG_INFINITY;
    for i in 0..=steps {
        let lambda = LAMBDA_MIN + i as f64 * LAMBDA_GRID_STEP;
        let ll = log_likelihood(values, lambda);
        if ll > best_ll {
            best_ll = ll;
            best_lambda = lambda;
        }
    }
    if !best_ll.is_finite() {
        return 1.0;
    }

    // golden-section refinement in the neighbouring grid cells
    let inv_phi = (5f64.sqrt() - 1.0) / 2.0;
    let mut a = (best_lambda - LAMBDA_GRID_STEP).max(LAMBDA_MIN);
    let mut b = (best_lambda + LAMBDA_GRID_STEP).min(LAMBDA_MAX);
    let mut c = b - inv_phi * (b - a);
    let mut d = a + inv_phi * (b - a);
    while (b - a).abs() > GOLDEN_TOL {
        if log_likelihood(values, c) > log_likelihood(values, d) {
            b = d;
        } else {
            a = c;
        }
        c = b - inv_phi * (b - a);
        d = a + inv_phi * (b - a);
    }
    let refined = (a + b) / 2.0;
    if log_likelihood(values, refined) >= best_ll {
        refined
    } else {
        best_lambda
    }
}

impl Transformer for PowerTransformer {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let lambdas: Vec<f64> = x
            .axis_iter(Axis(1))
            .map(|col| {
                let observed: Vec<f64> =
                    col.iter().copied().filter(|v| !is_missing(*v)).collect();
                if observed.is_empty() {
                    1.0
                } else {
                    optimize_lambda(&observed)
                }
            })
            .collect();

        self.scaler = if self.standardize {
            let transformed = self.apply_lambdas(&lambdas, x);
            let mut scaler = StandardScaler::new();
            scaler.fit(&transformed)?;
            Some(scaler)
        } else {
            None
        };
        self.lambdas = Some(lambdas);
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let lambdas = self.lambdas.as_ref().ok_or(CkdError::ModelNotFitted)?;
        check_width(lambdas.len(), x)?;
        let mut out = self.apply_lambdas(lambdas, x);
        if let Some(scaler) = &self.scaler {
            out = scaler.transform(&out)?;
        }
        ensure_finite(x, &out, "power transform")?;
        Ok(out)
    }
}
