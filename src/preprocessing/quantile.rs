//! Rank-based quantile transform to a uniform or normal distribution

use super::{check_width, ensure_finite, Transformer};
use crate::error::{CkdError, Result};
use crate::imputation::is_missing;
use crate::utils::{observed_sorted, percentile_sorted};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Values within this distance of the fitted range ends map to the ends
const BOUNDS_THRESHOLD: f64 = 1e-7;

/// Target distribution of a [`QuantileTransformer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantileOutput {
    Uniform,
    Normal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnQuantiles {
    quantiles: Vec<f64>,
    /// `-quantiles` reversed, ascending
    neg_reversed: Vec<f64>,
}

/// Maps each column through its empirical CDF.
///
/// Landmarks are `min(n_quantiles, n_rows)` evenly spaced percentiles of the
/// observed values. Interpolation is averaged over the forward and reversed
/// landmark tables so tied landmarks map to the middle of their rank span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantileTransformer {
    output: QuantileOutput,
    n_quantiles: usize,
    references: Vec<f64>,
    neg_references_reversed: Vec<f64>,
    columns: Option<Vec<Option<ColumnQuantiles>>>,
}

impl QuantileTransformer {
    pub fn new(output: QuantileOutput) -> Self {
        Self {
            output,
            n_quantiles: 1000,
            references: Vec::new(),
            neg_references_reversed: Vec::new(),
            columns: None,
        }
    }

    pub fn with_n_quantiles(mut self, n_quantiles: usize) -> Self {
        self.n_quantiles = n_quantiles.max(1);
        self
    }

    pub fn output(&self) -> QuantileOutput {
        self.output
    }

    fn transform_value(&self, v: f64, col: &ColumnQuantiles, normal: Option<&Normal>) -> f64 {
        if is_missing(v) {
            return v;
        }
        let q = &col.quantiles;
        let lower_x = q[0];
        let upper_x = q[q.len() - 1];

        let mut p = 0.5
            * (interp(v, q, &self.references)
                - interp(-v, &col.neg_reversed, &self.neg_references_reversed));

        let (at_lower, at_upper) = match self.output {
            QuantileOutput::Normal => (
                v - BOUNDS_THRESHOLD < lower_x,
                v + BOUNDS_THRESHOLD > upper_x,
            ),
            QuantileOutput::Uniform => (v == lower_x, v == upper_x),
        };
        if at_upper {
            p = 1.0;
        }
        if at_lower {
            p = 0.0;
        }

        match normal {
            Some(dist) => {
                let clip = BOUNDS_THRESHOLD - f64::EPSILON;
                dist.inverse_cdf(p.clamp(clip, 1.0 - clip))
            }
            None => p,
        }
    }
}

/// Piecewise-linear interpolation; `xp` ascending, ends clamp
fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let n = xp.len();
    if x < xp[0] {
        return fp[0];
    }
    if x >= xp[n - 1] {
        return fp[n - 1];
    }
    let j = xp.partition_point(|&p| p <= x) - 1;
    let slope = (fp[j + 1] - fp[j]) / (xp[j + 1] - xp[j]);
    fp[j] + slope * (x - xp[j])
}

impl Transformer for QuantileTransformer {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let n_quantiles = self.n_quantiles.min(x.nrows()).max(1);
        self.references = if n_quantiles == 1 {
            vec![0.0]
        } else {
            (0..n_quantiles)
                .map(|i| i as f64 / (n_quantiles - 1) as f64)
                .collect()
        };
        self.neg_references_reversed = self.references.iter().rev().map(|r| -r).collect();

        let columns = x
            .axis_iter(Axis(1))
            .map(|col| {
                let sorted = observed_sorted(col);
                if sorted.is_empty() {
                    return None;
                }
                let mut quantiles: Vec<f64> = self
                    .references
                    .iter()
                    .filter_map(|r| percentile_sorted(&sorted, r * 100.0))
                    .collect();
                // keep landmarks non-decreasing under rounding
                for i in 1..quantiles.len() {
                    quantiles[i] = quantiles[i].max(quantiles[i - 1]);
                }
                let neg_reversed = quantiles.iter().rev().map(|q| -q).collect();
                Some(ColumnQuantiles {
                    quantiles,
                    neg_reversed,
                })
            })
            .collect();

        self.columns = Some(columns);
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let columns = self.columns.as_ref().ok_or(CkdError::ModelNotFitted)?;
        check_width(columns.len(), x)?;

        let normal = match self.output {
            QuantileOutput::Normal => Some(
                Normal::new(0.0, 1.0)
                    .map_err(|e| CkdError::ComputationError(e.to_string()))?,
            ),
            QuantileOutput::Uniform => None,
        };

        let mut out = x.clone();
        for (mut col, fitted) in out.axis_iter_mut(Axis(1)).zip(columns) {
            if let Some(fitted) = fitted {
                col.mapv_inplace(|v| self.transform_value(v, fitted, normal.as_ref()));
            }
        }

        let name = match self.output {
            QuantileOutput::Normal => "normal quantile transform",
            QuantileOutput::Uniform => "uniform quantile transform",
        };
        ensure_finite(x, &out, name)?;
        Ok(out)
    }
}
