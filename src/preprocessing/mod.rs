//! Numeric transform strategies
//!
//! Every strategy implements [`Transformer`]: it is fit on the NUMERIC block
//! of a dataset and applied to a same-shape matrix. Absent cells (NaN) are
//! ignored while fitting and pass through every transform untouched.

mod bank;
mod power;
mod quantile;
mod scaler;

pub use bank::{NamedTransform, TransformBank, TransformVariant, IDENTITY_VARIANT};
pub use power::PowerTransformer;
pub use quantile::{QuantileOutput, QuantileTransformer};
pub use scaler::{IdentityTransform, RobustScaler, StandardScaler};

use crate::error::{CkdError, Result};
use crate::imputation::is_missing;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Fit/apply interface shared by every numeric transform
pub trait Transformer: Send + Sync {
    /// Learn per-column parameters from observed values
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    /// Apply the learned mapping; absent cells stay absent
    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}

/// Serializable description of a transform strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum TransformSpec {
    Identity,
    /// Rank-based remap to a uniform or normal target distribution
    Quantile {
        output: QuantileOutput,
        #[serde(default = "default_n_quantiles")]
        n_quantiles: usize,
    },
    /// Yeo-Johnson power transform, optionally standardized afterwards
    YeoJohnson {
        #[serde(default = "default_true")]
        standardize: bool,
    },
    /// Median centering, inter-percentile range scaling
    Robust { q_low: f64, q_high: f64 },
    /// Mean centering, standard deviation scaling
    Standard,
}

fn default_n_quantiles() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

impl TransformSpec {
    /// Fresh, unfitted transformer for this strategy
    pub fn build(&self) -> Box<dyn Transformer> {
        match self {
            TransformSpec::Identity => Box::new(IdentityTransform),
            TransformSpec::Quantile {
                output,
                n_quantiles,
            } => Box::new(QuantileTransformer::new(*output).with_n_quantiles(*n_quantiles)),
            TransformSpec::YeoJohnson { standardize } => {
                Box::new(PowerTransformer::new().with_standardize(*standardize))
            }
            TransformSpec::Robust { q_low, q_high } => {
                Box::new(RobustScaler::new().with_quantile_range(*q_low, *q_high))
            }
            TransformSpec::Standard => Box::new(StandardScaler::new()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            TransformSpec::Quantile { n_quantiles, .. } if *n_quantiles < 2 => {
                Err(CkdError::InvalidParameter {
                    name: "n_quantiles".to_string(),
                    value: n_quantiles.to_string(),
                    reason: "must be at least 2".to_string(),
                })
            }
            TransformSpec::Robust { q_low, q_high }
                if !(0.0..=100.0).contains(q_low)
                    || !(0.0..=100.0).contains(q_high)
                    || q_low >= q_high =>
            {
                Err(CkdError::InvalidParameter {
                    name: "quantile_range".to_string(),
                    value: format!("({}, {})", q_low, q_high),
                    reason: "expected 0 <= q_low < q_high <= 100".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Fail closed if an observed input cell produced a non-finite output
pub(crate) fn ensure_finite(
    input: &Array2<f64>,
    output: &Array2<f64>,
    transform: &str,
) -> Result<()> {
    for ((row, col), &out) in output.indexed_iter() {
        if !is_missing(input[[row, col]]) && !out.is_finite() {
            return Err(CkdError::ComputationError(format!(
                "{} produced {} at row {}, column {}",
                transform, out, row, col
            )));
        }
    }
    Ok(())
}

pub(crate) fn check_width(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(CkdError::ShapeError {
            expected: format!("{} columns", expected),
            actual: format!("{} columns", x.ncols()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_validation() {
        assert!(TransformSpec::Robust {
            q_low: 85.0,
            q_high: 15.0
        }
        .validate()
        .is_err());
        assert!(TransformSpec::Quantile {
            output: QuantileOutput::Uniform,
            n_quantiles: 1
        }
        .validate()
        .is_err());
        assert!(TransformSpec::Standard.validate().is_ok());
    }

    #[test]
    fn test_spec_json_shape() {
        let spec: TransformSpec =
            serde_json::from_str(r#"{"strategy":"robust","q_low":15.0,"q_high":85.0}"#).unwrap();
        assert_eq!(
            spec,
            TransformSpec::Robust {
                q_low: 15.0,
                q_high: 85.0
            }
        );
        let spec: TransformSpec =
            serde_json::from_str(r#"{"strategy":"quantile","output":"normal"}"#).unwrap();
        assert!(matches!(spec, TransformSpec::Quantile { n_quantiles: 1000, .. }));
    }
}
