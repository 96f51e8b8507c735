//! Location/scale transforms

use super::{check_width, ensure_finite, Transformer};
use crate::error::{CkdError, Result};
use crate::utils::{handle_zero_scale, nan_mean_std, observed_sorted, percentile_sorted};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Parameters for one fitted column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    center: f64,
    scale: f64,
}

fn apply_params(
    params: &[Option<ScalerParams>],
    x: &Array2<f64>,
    name: &str,
) -> Result<Array2<f64>> {
    check_width(params.len(), x)?;
    let mut out = x.clone();
    for (mut col, p) in out.axis_iter_mut(Axis(1)).zip(params) {
        // all-absent columns were not fit and pass through
        if let Some(p) = p {
            col.mapv_inplace(|v| (v - p.center) / p.scale);
        }
    }
    ensure_finite(x, &out, name)?;
    Ok(out)
}

/// Median centering and inter-percentile range scaling.
///
/// The default range is the interquartile range (25, 75).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobustScaler {
    q_low: f64,
    q_high: f64,
    params: Option<Vec<Option<ScalerParams>>>,
}

impl Default for RobustScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl RobustScaler {
    pub fn new() -> Self {
        Self {
            q_low: 25.0,
            q_high: 75.0,
            params: None,
        }
    }

    /// Set the percentile range used as scale
    pub fn with_quantile_range(mut self, q_low: f64, q_high: f64) -> Self {
        self.q_low = q_low;
        self.q_high = q_high;
        self
    }

    pub fn quantile_range(&self) -> (f64, f64) {
        (self.q_low, self.q_high)
    }
}

impl Transformer for RobustScaler {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let params = x
            .axis_iter(Axis(1))
            .map(|col| {
                let sorted = observed_sorted(col);
                let center = percentile_sorted(&sorted, 50.0)?;
                let lo = percentile_sorted(&sorted, self.q_low)?;
                let hi = percentile_sorted(&sorted, self.q_high)?;
                Some(ScalerParams {
                    center,
                    scale: handle_zero_scale(hi - lo),
                })
            })
            .collect();
        self.params = Some(params);
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let params = self.params.as_ref().ok_or(CkdError::ModelNotFitted)?;
        apply_params(params, x, "robust scaler")
    }
}

/// Mean centering and population standard deviation scaling
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    params: Option<Vec<Option<ScalerParams>>>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transformer for StandardScaler {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let params = x
            .axis_iter(Axis(1))
            .map(|col| {
                nan_mean_std(col).map(|(mean, std)| ScalerParams {
                    center: mean,
                    scale: handle_zero_scale(std),
                })
            })
            .collect();
        self.params = Some(params);
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let params = self.params.as_ref().ok_or(CkdError::ModelNotFitted)?;
        apply_params(params, x, "standard scaler")
    }
}

/// Leaves the data unchanged
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct IdentityTransform;

impl Transformer for IdentityTransform {
    fn fit(&mut self, _x: &Array2<f64>) -> Result<()> {
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        Ok(x.clone())
    }
}
