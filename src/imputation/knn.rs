//! Distance-weighted nearest-neighbor imputation

use crate::data::PartitionedDataset;
use crate::error::{CkdError, Result};
use crate::imputation::{is_missing, Imputer};
use crate::preprocessing::TransformVariant;
use ndarray::{concatenate, s, Array2, ArrayView1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info, warn};

/// Result of imputing a matrix
#[derive(Debug, Clone)]
pub struct ImputationOutcome {
    pub values: Array2<f64>,
    /// Columns with no observed value anywhere; their cells stay absent
    pub unresolved: Vec<usize>,
    pub imputed_cells: usize,
}

/// A transform variant after imputation
#[derive(Debug, Clone)]
pub struct ImputedDataset {
    pub variant: String,
    pub data: PartitionedDataset,
    pub imputed_cells: usize,
    /// Attributes that could not be imputed
    pub unresolved: Vec<String>,
}

impl ImputedDataset {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// The imputed data, or an underflow error naming the unresolved attributes
    pub fn into_complete(self) -> Result<PartitionedDataset> {
        if self.unresolved.is_empty() {
            Ok(self.data)
        } else {
            Err(CkdError::ImputationUnderflow {
                attributes: self.unresolved,
            })
        }
    }
}

/// Candidate donor with its distance to the receiving row
#[derive(Debug, Clone, Copy)]
struct Donor {
    row: usize,
    distance: f64,
}

/// KNN imputer with inverse-distance weights.
///
/// Distances ignore coordinates absent in either row and are rescaled by
/// `total / shared` so rows sharing fewer observed attributes are not
/// favoured. Donors for a cell are the rows observing that attribute; the `k`
/// nearest contribute an inverse-distance weighted average. A donor at
/// distance zero takes all the weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceWeightedImputer {
    n_neighbors: usize,
    include_target_in_distance: bool,
    /// Donor pool, set by `fit`
    fit_data: Option<Array2<f64>>,
}

impl Default for DistanceWeightedImputer {
    fn default() -> Self {
        Self::new(8)
    }
}

impl DistanceWeightedImputer {
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1),
            include_target_in_distance: true,
            fit_data: None,
        }
    }

    /// Whether the outcome column takes part in row distances
    pub fn with_target_in_distance(mut self, include: bool) -> Self {
        self.include_target_in_distance = include;
        self
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    /// `sqrt(total / shared * sum of squared differences over shared coordinates)`,
    /// `None` when the rows share no observed coordinate
    fn distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> Option<f64> {
        let mut shared = 0usize;
        let mut accum = 0.0f64;
        for (&ai, &bi) in a.iter().zip(b.iter()) {
            if is_missing(ai) || is_missing(bi) {
                continue;
            }
            shared += 1;
            let d = ai - bi;
            accum += d * d;
        }
        if shared == 0 {
            return None;
        }
        Some((a.len() as f64 / shared as f64 * accum).sqrt())
    }

    /// Inverse-distance weighted average over the selected donors
    fn weighted_estimate(donors: &[Donor], data: &Array2<f64>, col: usize) -> f64 {
        if donors.iter().any(|d| d.distance == 0.0) {
            let exact: Vec<f64> = donors
                .iter()
                .filter(|d| d.distance == 0.0)
                .map(|d| data[[d.row, col]])
                .collect();
            return exact.iter().sum::<f64>() / exact.len() as f64;
        }
        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for d in donors {
            let w = 1.0 / d.distance;
            weighted_sum += w * data[[d.row, col]];
            weight_sum += w;
        }
        weighted_sum / weight_sum
    }

    /// Impute every absent cell of `x` from the fitted donor pool.
    ///
    /// Columns with no observed donor are reported in `unresolved` and left
    /// absent. A cell whose donors all share no coordinate with its row is an
    /// error.
    pub fn impute(&self, x: &Array2<f64>) -> Result<ImputationOutcome> {
        self.impute_with_names(x, |j| format!("column {}", j))
    }

    fn impute_with_names<F>(&self, x: &Array2<f64>, column_name: F) -> Result<ImputationOutcome>
    where
        F: Fn(usize) -> String + Sync,
    {
        let data = self.fit_data.as_ref().ok_or(CkdError::ModelNotFitted)?;
        if x.ncols() != data.ncols() {
            return Err(CkdError::ShapeError {
                expected: format!("{} columns", data.ncols()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let n_cols = data.ncols();
        let donors_by_col: Vec<Vec<usize>> = (0..n_cols)
            .map(|j| {
                (0..data.nrows())
                    .filter(|&i| !is_missing(data[[i, j]]))
                    .collect()
            })
            .collect();
        let unresolved: Vec<usize> = (0..n_cols)
            .filter(|&j| donors_by_col[j].is_empty())
            .collect();

        let receivers: Vec<usize> = (0..x.nrows())
            .filter(|&i| {
                x.row(i)
                    .iter()
                    .enumerate()
                    .any(|(j, &v)| is_missing(v) && !donors_by_col[j].is_empty())
            })
            .collect();

        let k = self.n_neighbors;
        let fills: Vec<Vec<(usize, usize, f64)>> = receivers
            .par_iter()
            .map(|&i| -> Result<Vec<(usize, usize, f64)>> {
                let row = x.row(i);
                // one distance vector per receiving row, shared by all its absent cells
                let distances: Vec<Option<f64>> = data
                    .rows()
                    .into_iter()
                    .map(|other| Self::distance(row, other))
                    .collect();

                let mut cells = Vec::new();
                for (j, &v) in row.iter().enumerate() {
                    if !is_missing(v) || donors_by_col[j].is_empty() {
                        continue;
                    }
                    let mut donors: Vec<Donor> = donors_by_col[j]
                        .iter()
                        .filter_map(|&r| distances[r].map(|distance| Donor { row: r, distance }))
                        .collect();
                    if donors.is_empty() {
                        return Err(CkdError::NoComparableRows {
                            row: i,
                            attribute: column_name(j),
                        });
                    }
                    donors.sort_by(|a, b| {
                        a.distance
                            .partial_cmp(&b.distance)
                            .unwrap_or(Ordering::Equal)
                            .then(a.row.cmp(&b.row))
                    });
                    donors.truncate(k);
                    cells.push((i, j, Self::weighted_estimate(&donors, data, j)));
                }
                Ok(cells)
            })
            .collect::<Result<_>>()?;

        let mut values = x.clone();
        let mut imputed_cells = 0;
        for (i, j, v) in fills.into_iter().flatten() {
            values[[i, j]] = v;
            imputed_cells += 1;
        }

        Ok(ImputationOutcome {
            values,
            unresolved,
            imputed_cells,
        })
    }

    /// Impute one dataset, optionally using the target as a distance coordinate.
    ///
    /// The target itself is never imputed.
    pub fn impute_dataset(&self, variant: &str, dataset: &PartitionedDataset) -> Result<ImputedDataset> {
        let features = dataset.features();
        let matrix = if self.include_target_in_distance {
            let target = dataset.target().view().insert_axis(Axis(1));
            concatenate(Axis(1), &[features.view(), target])?
        } else {
            features.clone()
        };

        let n_features = dataset.n_features();
        let names = dataset.feature_names();

        let mut imputer = self.clone();
        imputer.fit(&matrix)?;
        let outcome = imputer.impute_with_names(&matrix, |j| {
            names
                .get(j)
                .cloned()
                .unwrap_or_else(|| dataset.target_name().to_string())
        })?;

        let unresolved: Vec<String> = outcome
            .unresolved
            .iter()
            .filter(|&&j| j < n_features)
            .map(|&j| names[j].clone())
            .collect();
        if !unresolved.is_empty() {
            warn!(variant, attributes = ?unresolved, "Attributes have no observed value, left absent");
        }

        let imputed = outcome.values.slice(s![.., ..n_features]).to_owned();
        info!(variant, cells = outcome.imputed_cells, k = self.n_neighbors, "Imputed variant");

        Ok(ImputedDataset {
            variant: variant.to_string(),
            data: dataset.with_features(imputed)?,
            imputed_cells: outcome.imputed_cells,
            unresolved,
        })
    }

    /// Impute a transform variant with no state shared across variants
    pub fn impute_variant(&self, variant: &TransformVariant) -> Result<ImputedDataset> {
        debug!(variant = %variant.id, "Imputing variant");
        self.impute_dataset(&variant.id, &variant.data)
    }
}

impl Imputer for DistanceWeightedImputer {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        if x.nrows() == 0 {
            return Err(CkdError::ValidationError(
                "Cannot fit imputer on an empty matrix".to_string(),
            ));
        }
        self.fit_data = Some(x.clone());
        Ok(())
    }

    /// Strict variant of [`DistanceWeightedImputer::impute`]: unresolved
    /// columns are an error
    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let outcome = self.impute(x)?;
        if !outcome.unresolved.is_empty() {
            return Err(CkdError::ImputationUnderflow {
                attributes: outcome
                    .unresolved
                    .iter()
                    .map(|j| format!("column {}", j))
                    .collect(),
            });
        }
        Ok(outcome.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_no_absent_cells_remain() {
        let data = array![
            [1.0, 10.0],
            [2.0, 20.0],
            [3.0, 30.0],
            [4.0, 40.0],
            [f64::NAN, 25.0],
            [2.5, f64::NAN],
        ];
        let result = DistanceWeightedImputer::new(3).fit_transform(&data).unwrap();
        assert!(!result.iter().any(|v| v.is_nan()));
        assert!(result[[4, 0]] >= 1.0 && result[[4, 0]] <= 4.0);
        assert!(result[[5, 1]] >= 10.0 && result[[5, 1]] <= 40.0);
    }

    #[test]
    fn test_distance_rescales_by_shared_coordinates() {
        let a = array![0.0, f64::NAN, 3.0, 0.0];
        let b = array![0.0, 5.0, 0.0, f64::NAN];
        // shared coords: 0 and 2 -> sq = 9, total 4 / shared 2
        let d = DistanceWeightedImputer::distance(a.view(), b.view()).unwrap();
        assert!((d - (2.0f64 * 9.0).sqrt()).abs() < 1e-12);
        let c = array![f64::NAN, 1.0, f64::NAN, 1.0];
        let e = array![1.0, f64::NAN, 1.0, f64::NAN];
        assert!(DistanceWeightedImputer::distance(c.view(), e.view()).is_none());
    }

    #[test]
    fn test_exact_match_takes_full_weight() {
        let data = array![
            [0.0, 0.0, 7.0],
            [1.0, 1.0, 100.0],
            [2.0, 2.0, 200.0],
            [0.0, 0.0, f64::NAN],
        ];
        let result = DistanceWeightedImputer::new(3).fit_transform(&data).unwrap();
        assert_eq!(result[[3, 2]], 7.0);
    }

    #[test]
    fn test_fewer_donors_than_k_uses_all() {
        let data = array![[1.0, 2.0], [3.0, 4.0], [5.0, f64::NAN]];
        let result = DistanceWeightedImputer::new(8).fit_transform(&data).unwrap();
        // distances proportional to 4 and 2
        let expected = (2.0 / 4.0 + 4.0 / 2.0) / (1.0 / 4.0 + 1.0 / 2.0);
        assert!((result[[2, 1]] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_all_absent_column_is_unresolved() {
        let data = array![
            [1.0, 5.0, f64::NAN],
            [2.0, 6.0, f64::NAN],
            [f64::NAN, 5.5, f64::NAN],
        ];
        let mut imputer = DistanceWeightedImputer::new(2);
        imputer.fit(&data).unwrap();
        let outcome = imputer.impute(&data).unwrap();
        assert_eq!(outcome.unresolved, vec![2]);
        assert!((outcome.values[[2, 0]] - 1.5).abs() < 1e-12);
        assert!(outcome.values.column(2).iter().all(|v| v.is_nan()));
        assert!(matches!(
            imputer.transform(&data),
            Err(CkdError::ImputationUnderflow { .. })
        ));
    }

    #[test]
    fn test_incomparable_donors_fail_closed() {
        let data = array![[1.0, f64::NAN, 5.0], [f64::NAN, 2.0, f64::NAN]];
        let mut imputer = DistanceWeightedImputer::new(2);
        imputer.fit(&data).unwrap();
        assert!(matches!(
            imputer.impute(&data),
            Err(CkdError::NoComparableRows { .. })
        ));
    }

    #[test]
    fn test_dataset_imputation_names_unresolved_attributes() {
        let ds = PartitionedDataset::from_parts(
            vec!["a".into(), "b".into()],
            vec![],
            "y".into(),
            array![[1.0, f64::NAN], [f64::NAN, f64::NAN], [3.0, f64::NAN]],
            array![0.0, 1.0, 1.0],
        )
        .unwrap();
        let imputed = DistanceWeightedImputer::new(2).impute_dataset("v", &ds).unwrap();
        assert_eq!(imputed.unresolved, vec!["b".to_string()]);
        assert!(!imputed.data.features()[[1, 0]].is_nan());
        assert!(matches!(
            imputed.into_complete(),
            Err(CkdError::ImputationUnderflow { .. })
        ));
    }
}
