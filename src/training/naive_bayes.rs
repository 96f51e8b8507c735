//! Gaussian Naive Bayes for continuous features

use super::{check_fit_input, check_predict_width, class_labels, Classifier};
use crate::error::{CkdError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Gaussian Naive Bayes Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    /// Per class, per feature mean
    means: Vec<Vec<f64>>,
    /// Per class, per feature variance (smoothed)
    variances: Vec<Vec<f64>>,
    log_priors: Vec<f64>,
    classes: Vec<f64>,
    /// Fraction of the largest feature variance added to every variance
    var_smoothing: f64,
}

impl Default for GaussianNaiveBayes {
    fn default() -> Self {
        Self::new()
    }
}

impl GaussianNaiveBayes {
    pub fn new() -> Self {
        Self {
            means: Vec::new(),
            variances: Vec::new(),
            log_priors: Vec::new(),
            classes: Vec::new(),
            var_smoothing: 1e-9,
        }
    }

    pub fn with_var_smoothing(mut self, smoothing: f64) -> Self {
        self.var_smoothing = smoothing;
        self
    }

    /// Unnormalized joint log likelihood per class
    fn joint_log_likelihood(&self, row: ArrayView1<f64>) -> Vec<f64> {
        self.classes
            .iter()
            .enumerate()
            .map(|(c, _)| {
                let ll: f64 = row
                    .iter()
                    .zip(&self.means[c])
                    .zip(&self.variances[c])
                    .map(|((&xi, &mean), &var)| {
                        -0.5 * ((xi - mean).powi(2) / var + var.ln() + (2.0 * PI).ln())
                    })
                    .sum();
                self.log_priors[c] + ll
            })
            .collect()
    }

    /// Class log-probabilities (log-sum-exp normalized)
    pub fn predict_log_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.classes.is_empty() {
            return Err(CkdError::ModelNotFitted);
        }
        check_predict_width(self.means[0].len(), x)?;
        let mut log_probs = Array2::zeros((x.nrows(), self.classes.len()));
        for (mut out, row) in log_probs.outer_iter_mut().zip(x.outer_iter()) {
            let jll = self.joint_log_likelihood(row);
            let max_val = jll.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let log_sum = jll.iter().map(|&v| (v - max_val).exp()).sum::<f64>().ln();
            for (o, v) in out.iter_mut().zip(jll) {
                *o = v - max_val - log_sum;
            }
        }
        Ok(log_probs)
    }
}

impl Classifier for GaussianNaiveBayes {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        let n_samples = x.nrows();
        let n_features = x.ncols();
        let classes = class_labels(y);

        let max_var = x
            .var_axis(Axis(0), 0.0)
            .iter()
            .cloned()
            .fold(0.0f64, f64::max);
        let epsilon = self.var_smoothing * max_var;

        let mut means = Vec::with_capacity(classes.len());
        let mut variances = Vec::with_capacity(classes.len());
        let mut log_priors = Vec::with_capacity(classes.len());

        for &class in &classes {
            // single-pass Welford per feature
            let mut feature_means = vec![0.0; n_features];
            let mut feature_m2 = vec![0.0; n_features];
            let mut count = 0usize;
            for (row, _) in x
                .outer_iter()
                .zip(y.iter())
                .filter(|(_, &label)| (label - class).abs() < 1e-9)
            {
                count += 1;
                for (j, &val) in row.iter().enumerate() {
                    let delta = val - feature_means[j];
                    feature_means[j] += delta / count as f64;
                    feature_m2[j] += delta * (val - feature_means[j]);
                }
            }
            let mut feature_vars: Vec<f64> = feature_m2
                .iter()
                .map(|&m2| m2 / count as f64 + epsilon)
                .collect();
            // constant features inside a class would otherwise give zero variance
            if epsilon == 0.0 {
                feature_vars.iter_mut().for_each(|v| *v = v.max(f64::MIN_POSITIVE));
            }

            means.push(feature_means);
            variances.push(feature_vars);
            log_priors.push((count as f64 / n_samples as f64).ln());
        }

        self.means = means;
        self.variances = variances;
        self.log_priors = log_priors;
        self.classes = classes;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let log_probs = self.predict_log_proba(x)?;
        Ok(log_probs
            .outer_iter()
            .map(|row| {
                let mut best = 0;
                for (idx, &v) in row.iter().enumerate() {
                    if v > row[best] {
                        best = idx;
                    }
                }
                self.classes[best]
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "gaussian_nb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{accuracy_score, test_support::blobs};
    use ndarray::array;

    #[test]
    fn test_gnb_separates_blobs() {
        let (x, y) = blobs();
        let mut nb = GaussianNaiveBayes::new();
        nb.fit(&x, &y).unwrap();
        let acc = accuracy_score(&y, &nb.predict(&x).unwrap()).unwrap();
        assert_eq!(acc, 1.0);
    }

    #[test]
    fn test_log_proba_rows_normalized() {
        let (x, y) = blobs();
        let mut nb = GaussianNaiveBayes::new();
        nb.fit(&x, &y).unwrap();
        let lp = nb.predict_log_proba(&x).unwrap();
        for row in lp.outer_iter() {
            let total: f64 = row.iter().map(|v| v.exp()).sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_priors_follow_class_frequency() {
        let x = array![[0.0], [0.1], [0.2], [5.0]];
        let y = array![0.0, 0.0, 0.0, 1.0];
        let mut nb = GaussianNaiveBayes::new();
        nb.fit(&x, &y).unwrap();
        assert!((nb.log_priors[0].exp() - 0.75).abs() < 1e-12);
        // single-member class has zero spread; smoothing keeps it finite
        assert!(nb.variances[1][0] > 0.0);
        assert_eq!(nb.predict(&array![[5.0]]).unwrap()[0], 1.0);
    }
}
