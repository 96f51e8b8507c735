//! NaN-aware column statistics shared by the scalers and the PCA

use crate::imputation::is_missing;
use ndarray::ArrayView1;

/// Observed (non-absent) values of a column, sorted ascending
pub fn observed_sorted(col: ArrayView1<'_, f64>) -> Vec<f64> {
    let mut values: Vec<f64> = col.iter().copied().filter(|v| !is_missing(*v)).collect();
    values.sort_by(|a, b| a.total_cmp(b));
    values
}

/// Linear-interpolated percentile of sorted data, `q` in [0, 100].
///
/// Returns `None` for an empty slice.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Mean and population standard deviation over observed values
pub fn nan_mean_std(col: ArrayView1<'_, f64>) -> Option<(f64, f64)> {
    let mut count = 0usize;
    let mut mean = 0.0;
    let mut m2 = 0.0;
    for &v in col.iter().filter(|v| !is_missing(**v)) {
        count += 1;
        let delta = v - mean;
        mean += delta / count as f64;
        m2 += delta * (v - mean);
    }
    if count == 0 {
        return None;
    }
    Some((mean, (m2 / count as f64).sqrt()))
}

/// Replace near-zero scales with 1 so constant columns pass through centered
pub fn handle_zero_scale(scale: f64) -> f64 {
    if scale.abs() < 10.0 * f64::EPSILON {
        1.0
    } else {
        scale
    }
}
