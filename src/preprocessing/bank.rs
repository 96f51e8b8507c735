//! Transform bank: named strategies producing parallel dataset variants

use super::{QuantileOutput, TransformSpec};
use crate::data::PartitionedDataset;
use crate::error::{CkdError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// Id of the untransformed variant
pub const IDENTITY_VARIANT: &str = "identity";

/// A strategy registered under an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedTransform {
    pub id: String,
    pub spec: TransformSpec,
}

impl NamedTransform {
    pub fn new(id: &str, spec: TransformSpec) -> Self {
        Self {
            id: id.to_string(),
            spec,
        }
    }
}

/// A dataset whose NUMERIC block was replaced by one strategy's output
#[derive(Debug, Clone)]
pub struct TransformVariant {
    pub id: String,
    pub data: PartitionedDataset,
}

/// Ordered registry of transform strategies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformBank {
    strategies: Vec<NamedTransform>,
}

impl Default for TransformBank {
    fn default() -> Self {
        Self::new(Self::default_strategies((25.0, 75.0), (15.0, 85.0)))
    }
}

impl TransformBank {
    pub fn new(strategies: Vec<NamedTransform>) -> Self {
        Self { strategies }
    }

    /// The six standard strategies with the given robust percentile ranges
    pub fn default_strategies(robust: (f64, f64), wide_robust: (f64, f64)) -> Vec<NamedTransform> {
        vec![
            NamedTransform::new(
                "normal-quantile",
                TransformSpec::Quantile {
                    output: QuantileOutput::Normal,
                    n_quantiles: 1000,
                },
            ),
            NamedTransform::new(
                "uniform-quantile",
                TransformSpec::Quantile {
                    output: QuantileOutput::Uniform,
                    n_quantiles: 1000,
                },
            ),
            NamedTransform::new("power", TransformSpec::YeoJohnson { standardize: true }),
            NamedTransform::new(
                "robust",
                TransformSpec::Robust {
                    q_low: robust.0,
                    q_high: robust.1,
                },
            ),
            NamedTransform::new(
                "wide-robust",
                TransformSpec::Robust {
                    q_low: wide_robust.0,
                    q_high: wide_robust.1,
                },
            ),
            NamedTransform::new("standard", TransformSpec::Standard),
        ]
    }

    pub fn strategies(&self) -> &[NamedTransform] {
        &self.strategies
    }

    /// Look up a strategy by id; the identity id is always available
    pub fn get(&self, id: &str) -> Option<TransformSpec> {
        if id == IDENTITY_VARIANT {
            return Some(TransformSpec::Identity);
        }
        self.strategies
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.spec.clone())
    }

    /// Variant ids in output order, identity first
    pub fn variant_ids(&self) -> Vec<String> {
        std::iter::once(IDENTITY_VARIANT.to_string())
            .chain(self.strategies.iter().map(|s| s.id.clone()))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        ids.insert(IDENTITY_VARIANT);
        for s in &self.strategies {
            if !ids.insert(s.id.as_str()) {
                return Err(CkdError::ConfigError(format!(
                    "duplicate transform id '{}'",
                    s.id
                )));
            }
            s.spec.validate()?;
        }
        Ok(())
    }

    /// Produce the identity variant followed by one variant per strategy.
    ///
    /// Each strategy is fit on the NUMERIC block only; CATEGORICAL columns and
    /// the target are carried through. The source dataset is not modified.
    pub fn apply(&self, dataset: &PartitionedDataset) -> Result<Vec<TransformVariant>> {
        let numeric = dataset.numeric().to_owned();

        let transformed: Vec<TransformVariant> = self
            .strategies
            .par_iter()
            .map(|named| -> Result<TransformVariant> {
                let mut transformer = named.spec.build();
                let out = transformer.fit_transform(&numeric)?;
                debug!(variant = %named.id, "Fitted transform");
                Ok(TransformVariant {
                    id: named.id.clone(),
                    data: dataset.with_numeric(out)?,
                })
            })
            .collect::<Result<_>>()?;

        let mut variants = Vec::with_capacity(transformed.len() + 1);
        variants.push(TransformVariant {
            id: IDENTITY_VARIANT.to_string(),
            data: dataset.clone(),
        });
        variants.extend(transformed);

        info!(
            variants = variants.len(),
            rows = dataset.n_rows(),
            "Built transform variants"
        );
        Ok(variants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn dataset() -> PartitionedDataset {
        PartitionedDataset::from_parts(
            vec!["a".into(), "b".into()],
            vec!["c".into()],
            "y".into(),
            array![
                [1.0, 10.0, 1.0],
                [2.0, f64::NAN, 0.0],
                [3.0, 30.0, 1.0],
                [40.0, 35.0, f64::NAN],
                [5.0, 12.0, 0.0],
            ],
            array![1.0, 0.0, 1.0, 1.0, 0.0],
        )
        .unwrap()
    }

    #[test]
    fn test_default_bank_produces_seven_variants() {
        let ds = dataset();
        let bank = TransformBank::default();
        let variants = bank.apply(&ds).unwrap();
        assert_eq!(variants.len(), 7);
        assert_eq!(
            variants.iter().map(|v| v.id.clone()).collect::<Vec<_>>(),
            bank.variant_ids()
        );
        for v in &variants {
            assert_eq!(v.data.n_rows(), ds.n_rows());
            assert_eq!(v.data.target(), ds.target());
            // categorical block is never transformed
            assert!(v.data.categorical()[[3, 0]].is_nan());
            assert_eq!(v.data.categorical()[[0, 0]], 1.0);
            // absent numeric cell stays absent
            assert!(v.data.numeric()[[1, 1]].is_nan());
        }
    }

    #[test]
    fn test_row_order_preserved() {
        let ds = dataset();
        let variants = TransformBank::default().apply(&ds).unwrap();
        for v in &variants {
            let col = v.data.numeric().column(0).to_vec();
            // column a is strictly increasing except row 3 which is the max
            assert!(col[0] < col[1] && col[1] < col[2] && col[2] < col[4] && col[4] < col[3]);
        }
    }

    #[test]
    fn test_source_not_mutated() {
        let ds = dataset();
        let before = ds.features().clone();
        let _ = TransformBank::default().apply(&ds).unwrap();
        assert!(ds
            .features()
            .iter()
            .zip(before.iter())
            .all(|(a, b)| a == b || (a.is_nan() && b.is_nan())));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let bank = TransformBank::new(vec![
            NamedTransform::new("x", TransformSpec::Standard),
            NamedTransform::new("x", TransformSpec::Standard),
        ]);
        assert!(bank.validate().is_err());
        let bank = TransformBank::new(vec![NamedTransform::new(
            IDENTITY_VARIANT,
            TransformSpec::Standard,
        )]);
        assert!(bank.validate().is_err());
    }
}
