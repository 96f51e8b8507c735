//! Multi-layer perceptron classifier
//!
//! Feedforward network with a softmax output, trained by mini-batch gradient
//! descent with momentum on the cross-entropy loss.

use super::{check_fit_input, check_predict_width, class_index, require_two_classes, Classifier};
use crate::error::{CkdError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Hidden-layer activation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Relu,
    Sigmoid,
    Tanh,
}

impl Activation {
    fn apply(&self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Relu => z.mapv(|v| v.max(0.0)),
            Activation::Sigmoid => z.mapv(|v| 1.0 / (1.0 + (-v).exp())),
            Activation::Tanh => z.mapv(f64::tanh),
        }
    }

    /// Derivative expressed through the pre-activation
    fn derivative(&self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Relu => z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Sigmoid => z.mapv(|v| {
                let s = 1.0 / (1.0 + (-v).exp());
                s * (1.0 - s)
            }),
            Activation::Tanh => z.mapv(|v| 1.0 - v.tanh().powi(2)),
        }
    }
}

fn softmax(z: &Array2<f64>) -> Array2<f64> {
    let mut result = z.clone();
    for mut row in result.rows_mut() {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    result
}

/// Neural network configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MLPConfig {
    pub hidden_layers: Vec<usize>,
    pub activation: Activation,
    pub learning_rate: f64,
    pub max_epochs: usize,
    pub batch_size: usize,
    /// L2 weight decay
    pub alpha: f64,
    pub momentum: f64,
    pub random_state: u64,
}

impl Default for MLPConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![100],
            activation: Activation::Relu,
            learning_rate: 0.01,
            max_epochs: 200,
            batch_size: 32,
            alpha: 0.0001,
            momentum: 0.9,
            random_state: 42,
        }
    }
}

impl MLPConfig {
    pub fn with_hidden_layers(mut self, layers: Vec<usize>) -> Self {
        self.hidden_layers = layers;
        self
    }

    pub fn with_max_epochs(mut self, epochs: usize) -> Self {
        self.max_epochs = epochs;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }
}

/// Multi-Layer Perceptron Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPClassifier {
    config: MLPConfig,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    classes: Vec<f64>,
}

impl MLPClassifier {
    pub fn new(config: MLPConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            biases: Vec::new(),
            classes: Vec::new(),
        }
    }

    fn initialize_weights(&mut self, n_features: usize, rng: &mut ChaCha8Rng) {
        self.weights.clear();
        self.biases.clear();

        let mut layer_sizes = vec![n_features];
        layer_sizes.extend(&self.config.hidden_layers);
        layer_sizes.push(self.classes.len());

        for pair in layer_sizes.windows(2) {
            let (n_in, n_out) = (pair[0], pair[1]);
            // Glorot uniform
            let scale = (6.0 / (n_in + n_out) as f64).sqrt();
            self.weights
                .push(Array2::from_shape_fn((n_in, n_out), |_| rng.gen_range(-scale..scale)));
            self.biases.push(Array1::zeros(n_out));
        }
    }

    /// Pre-activations and activations per layer; activations[0] is the input
    fn forward(&self, x: &Array2<f64>) -> (Vec<Array2<f64>>, Vec<Array2<f64>>) {
        let mut activations = vec![x.clone()];
        let mut z_values = Vec::with_capacity(self.weights.len());
        let last = self.weights.len().saturating_sub(1);

        for (i, (w, b)) in self.weights.iter().zip(&self.biases).enumerate() {
            let z = activations[i].dot(w) + b;
            let a = if i < last {
                self.config.activation.apply(&z)
            } else {
                softmax(&z)
            };
            z_values.push(z);
            activations.push(a);
        }
        (activations, z_values)
    }

    fn backward(
        &self,
        y_onehot: &Array2<f64>,
        activations: &[Array2<f64>],
        z_values: &[Array2<f64>],
    ) -> Vec<(Array2<f64>, Array1<f64>)> {
        let n = y_onehot.nrows() as f64;
        let n_layers = self.weights.len();
        let mut gradients = Vec::with_capacity(n_layers);

        // softmax + cross-entropy
        let mut delta = (&activations[n_layers] - y_onehot) / n;
        for i in (0..n_layers).rev() {
            let grad_w = activations[i].t().dot(&delta);
            let grad_b = delta.sum_axis(Axis(0));
            gradients.push((grad_w, grad_b));
            if i > 0 {
                delta = delta.dot(&self.weights[i].t()) * self.config.activation.derivative(&z_values[i - 1]);
            }
        }
        gradients.reverse();
        gradients
    }

    /// Class probabilities, columns ordered by sorted label
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let first = self.weights.first().ok_or(CkdError::ModelNotFitted)?;
        check_predict_width(first.nrows(), x)?;
        let (mut activations, _) = self.forward(x);
        activations.pop().ok_or(CkdError::ModelNotFitted)
    }
}

impl Classifier for MLPClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;
        if self.config.hidden_layers.iter().any(|&h| h == 0) || self.config.batch_size == 0 {
            return Err(CkdError::InvalidParameter {
                name: "hidden_layers".to_string(),
                value: format!("{:?}", self.config.hidden_layers),
                reason: "layer sizes and batch size must be positive".to_string(),
            });
        }
        self.classes = require_two_classes(y, self.name())?;

        let n_samples = x.nrows();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);
        self.initialize_weights(x.ncols(), &mut rng);

        let mut y_onehot = Array2::<f64>::zeros((n_samples, self.classes.len()));
        for (i, &label) in y.iter().enumerate() {
            if let Some(c) = class_index(&self.classes, label) {
                y_onehot[[i, c]] = 1.0;
            }
        }

        let mut velocities_w: Vec<Array2<f64>> =
            self.weights.iter().map(|w| Array2::zeros(w.raw_dim())).collect();
        let mut velocities_b: Vec<Array1<f64>> =
            self.biases.iter().map(|b| Array1::zeros(b.len())).collect();
        let lr = self.config.learning_rate;
        let momentum = self.config.momentum;
        let decay = 1.0 - self.config.alpha * lr;

        let mut indices: Vec<usize> = (0..n_samples).collect();
        for _epoch in 0..self.config.max_epochs {
            indices.shuffle(&mut rng);
            for batch in indices.chunks(self.config.batch_size) {
                let x_batch = x.select(Axis(0), batch);
                let y_batch = y_onehot.select(Axis(0), batch);

                let (activations, z_values) = self.forward(&x_batch);
                let gradients = self.backward(&y_batch, &activations, &z_values);

                for (i, (grad_w, grad_b)) in gradients.into_iter().enumerate() {
                    velocities_w[i] = &velocities_w[i] * momentum - grad_w * lr;
                    velocities_b[i] = &velocities_b[i] * momentum - grad_b * lr;
                    self.weights[i] = (&self.weights[i] + &velocities_w[i]) * decay;
                    self.biases[i] = &self.biases[i] + &velocities_b[i];
                }
            }
        }
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
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
        "mlp"
    }
}
