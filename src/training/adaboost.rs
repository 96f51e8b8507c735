//! AdaBoost (Adaptive Boosting), SAMME variant
//!
//! The weak learner is any non-ensemble family described by a
//! [`ClassifierSpec`]. None of the families take sample weights, so each round
//! trains on a weighted bootstrap resample of the training split; the round's
//! error and the weight update are computed on the full split.

use super::{
    check_fit_input, check_predict_width, class_index, require_two_classes, Classifier,
    ClassifierSpec,
};
use crate::error::{CkdError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::distributions::{Distribution, WeightedIndex};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Boosted ensemble of freshly built base learners
#[derive(Debug)]
pub struct AdaBoostClassifier {
    base: ClassifierSpec,
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub random_state: u64,
    estimators: Vec<Box<dyn Classifier>>,
    /// Estimator weight per kept round
    alphas: Vec<f64>,
    classes: Vec<f64>,
    n_features: usize,
}

impl AdaBoostClassifier {
    pub fn new(base: ClassifierSpec, n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            base,
            n_estimators,
            learning_rate,
            random_state: 0,
            estimators: Vec::new(),
            alphas: Vec::new(),
            classes: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Number of rounds that were kept
    pub fn n_rounds(&self) -> usize {
        self.estimators.len()
    }

    pub fn estimator_weights(&self) -> &[f64] {
        &self.alphas
    }
}

impl Classifier for AdaBoostClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.base.is_ensemble() {
            return Err(CkdError::TrainingError(
                "boosting an ensemble family is not supported".to_string(),
            ));
        }
        if self.n_estimators == 0 || self.learning_rate <= 0.0 {
            return Err(CkdError::InvalidParameter {
                name: "n_estimators / learning_rate".to_string(),
                value: format!("{} / {}", self.n_estimators, self.learning_rate),
                reason: "both must be positive".to_string(),
            });
        }

        let classes = require_two_classes(y, self.name())?;
        let n_classes = classes.len() as f64;
        let n_samples = x.nrows();
        let mut weights = vec![1.0 / n_samples as f64; n_samples];
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);

        self.estimators.clear();
        self.alphas.clear();

        for round in 0..self.n_estimators {
            let sampler = WeightedIndex::new(&weights).map_err(|e| {
                CkdError::ComputationError(format!("invalid boosting weights: {}", e))
            })?;
            let sample: Vec<usize> = (0..n_samples).map(|_| sampler.sample(&mut rng)).collect();
            let x_sample = x.select(Axis(0), &sample);
            let y_sample = y.select(Axis(0), &sample);

            let mut estimator = self.base.build(self.random_state.wrapping_add(round as u64));
            if let Err(e) = estimator.fit(&x_sample, &y_sample) {
                if round == 0 {
                    return Err(e);
                }
                debug!(round, error = %e, "Weak learner failed on resample; stopping early");
                break;
            }

            let predictions = estimator.predict(x)?;
            let incorrect: Vec<bool> = predictions
                .iter()
                .zip(y.iter())
                .map(|(p, t)| (p - t).abs() >= 0.5)
                .collect();
            let total: f64 = weights.iter().sum();
            let error: f64 = weights
                .iter()
                .zip(&incorrect)
                .filter(|(_, &wrong)| wrong)
                .map(|(w, _)| w)
                .sum::<f64>()
                / total;

            if error <= 0.0 {
                // perfect learner: keep it with unit weight and stop
                self.estimators.push(estimator);
                self.alphas.push(1.0);
                break;
            }
            if error >= 1.0 - 1.0 / n_classes {
                if round == 0 {
                    return Err(CkdError::TrainingError(format!(
                        "{} weak learner is no better than chance (error {:.3})",
                        self.base.family(),
                        error
                    )));
                }
                break;
            }

            let alpha = self.learning_rate * (((1.0 - error) / error).ln() + (n_classes - 1.0).ln());

            for (w, &wrong) in weights.iter_mut().zip(&incorrect) {
                if wrong {
                    *w *= alpha.exp();
                }
            }
            let sum: f64 = weights.iter().sum();
            weights.iter_mut().for_each(|w| *w /= sum);

            self.estimators.push(estimator);
            self.alphas.push(alpha);
        }

        debug!(base = self.base.family(), rounds = self.estimators.len(), "Boosting finished");
        self.classes = classes;
        self.n_features = x.ncols();
        Ok(())
    }

    /// Class with the largest sum of estimator weights
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.estimators.is_empty() {
            return Err(CkdError::ModelNotFitted);
        }
        check_predict_width(self.n_features, x)?;

        let mut scores = Array2::<f64>::zeros((x.nrows(), self.classes.len()));
        for (estimator, &alpha) in self.estimators.iter().zip(&self.alphas) {
            let predictions = estimator.predict(x)?;
            for (i, &p) in predictions.iter().enumerate() {
                if let Some(c) = class_index(&self.classes, p) {
                    scores[[i, c]] += alpha;
                }
            }
        }

        Ok(scores
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
        "adaboost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{accuracy_score, test_support::blobs};
    use ndarray::array;

    fn stump() -> ClassifierSpec {
        ClassifierSpec::DecisionTree { max_depth: Some(1) }
    }

    #[test]
    fn test_boosted_stumps_beat_a_single_stump() {
        // interval target: no single threshold gets it right
        let x = Array2::from_shape_fn((30, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(30, |i| if (10..20).contains(&i) { 1.0 } else { 0.0 });

        let mut single = stump().build(0);
        single.fit(&x, &y).unwrap();
        let single_acc = accuracy_score(&y, &single.predict(&x).unwrap()).unwrap();

        let mut boosted = AdaBoostClassifier::new(stump(), 50, 1.0).with_random_state(12);
        boosted.fit(&x, &y).unwrap();
        let boosted_acc = accuracy_score(&y, &boosted.predict(&x).unwrap()).unwrap();
        assert!(boosted_acc > single_acc, "{} vs {}", boosted_acc, single_acc);
        assert!(boosted.n_rounds() > 1);
    }

    #[test]
    fn test_perfect_learner_stops_after_one_round() {
        let (x, y) = blobs();
        let mut boosted =
            AdaBoostClassifier::new(ClassifierSpec::Knn { k: 1 }, 50, 1.0).with_random_state(1);
        boosted.fit(&x, &y).unwrap();
        // 1-NN on a resample of well separated blobs is exact on the full split
        assert_eq!(boosted.n_rounds(), 1);
        assert_eq!(boosted.estimator_weights(), &[1.0]);
        let acc = accuracy_score(&y, &boosted.predict(&x).unwrap()).unwrap();
        assert_eq!(acc, 1.0);
    }

    #[test]
    fn test_alpha_uses_samme_formula() {
        let x = Array2::from_shape_fn((30, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(30, |i| if (10..20).contains(&i) { 1.0 } else { 0.0 });
        let mut boosted = AdaBoostClassifier::new(stump(), 1, 0.5).with_random_state(4);
        boosted.fit(&x, &y).unwrap();
        let alpha = boosted.estimator_weights()[0];
        // binary SAMME: alpha = lr * ln((1 - err) / err), err in (0, 0.5)
        assert!(alpha > 0.0);
        assert!(alpha < 0.5 * (29.0f64).ln());
    }

    #[test]
    fn test_ensemble_base_rejected() {
        let (x, y) = blobs();
        let mut boosted = AdaBoostClassifier::new(
            ClassifierSpec::RandomForest {
                n_estimators: 5,
                max_depth: None,
            },
            10,
            1.0,
        );
        assert!(boosted.fit(&x, &y).is_err());
    }

    #[test]
    fn test_single_class_rejected() {
        let mut boosted = AdaBoostClassifier::new(stump(), 10, 1.0);
        assert!(boosted.fit(&array![[0.0], [1.0]], &array![0.0, 0.0]).is_err());
    }
}
