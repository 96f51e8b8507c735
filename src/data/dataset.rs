//! Normalized datasets and the NUMERIC / CATEGORICAL / target partition

use crate::data::AttributeSchema;
use crate::error::{CkdError, Result};
use crate::imputation::is_missing;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Absent-cell count for one attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingSummary {
    pub attribute: String,
    pub missing: usize,
    pub fraction: f64,
}

fn summarize_missing(names: &[String], values: ArrayView2<'_, f64>) -> Vec<MissingSummary> {
    let n_rows = values.nrows().max(1) as f64;
    names
        .iter()
        .zip(values.axis_iter(Axis(1)))
        .map(|(name, col)| {
            let missing = col.iter().filter(|&&v| is_missing(v)).count();
            MissingSummary {
                attribute: name.clone(),
                missing,
                fraction: missing as f64 / n_rows,
            }
        })
        .collect()
}

/// Fully numeric table in raw attribute order, absent cells as NaN
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    attribute_names: Vec<String>,
    values: Array2<f64>,
}

impl Dataset {
    pub fn new(attribute_names: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if attribute_names.len() != values.ncols() {
            return Err(CkdError::ShapeError {
                expected: format!("{} columns", attribute_names.len()),
                actual: format!("{} columns", values.ncols()),
            });
        }
        Ok(Self {
            attribute_names,
            values,
        })
    }

    pub fn attribute_names(&self) -> &[String] {
        &self.attribute_names
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_attributes(&self) -> usize {
        self.values.ncols()
    }

    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        let idx = self
            .attribute_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| CkdError::DataError(format!("unknown attribute '{}'", name)))?;
        Ok(self.values.column(idx))
    }

    /// Per-attribute absent counts in raw order
    pub fn missing_summary(&self) -> Vec<MissingSummary> {
        summarize_missing(&self.attribute_names, self.values.view())
    }

    pub fn total_missing(&self) -> usize {
        self.values.iter().filter(|&&v| is_missing(v)).count()
    }
}

/// Columns reordered to [NUMERIC..., CATEGORICAL...] with the target split off.
///
/// Row order matches the source dataset. The three views share row alignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionedDataset {
    numeric_names: Vec<String>,
    categorical_names: Vec<String>,
    target_name: String,
    features: Array2<f64>,
    target: Array1<f64>,
}

impl PartitionedDataset {
    /// Reorder a normalized dataset according to the schema partition
    pub fn partition(dataset: &Dataset, schema: &AttributeSchema) -> Result<Self> {
        let lookup = |name: &str| -> Result<usize> {
            dataset
                .attribute_names()
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| {
                    CkdError::SchemaError(format!("dataset has no attribute '{}'", name))
                })
        };

        let order: Vec<usize> = schema
            .numeric()
            .iter()
            .chain(schema.categorical().iter())
            .map(|n| lookup(n))
            .collect::<Result<_>>()?;
        let target_idx = lookup(schema.target())?;

        let features = dataset.values().select(Axis(1), &order);
        let target = dataset.values().column(target_idx).to_owned();

        Self::from_parts(
            schema.numeric().to_vec(),
            schema.categorical().to_vec(),
            schema.target().to_string(),
            features,
            target,
        )
    }

    /// Assemble from an already ordered feature block
    pub fn from_parts(
        numeric_names: Vec<String>,
        categorical_names: Vec<String>,
        target_name: String,
        features: Array2<f64>,
        target: Array1<f64>,
    ) -> Result<Self> {
        let n_features = numeric_names.len() + categorical_names.len();
        if features.ncols() != n_features {
            return Err(CkdError::ShapeError {
                expected: format!("{} feature columns", n_features),
                actual: format!("{} feature columns", features.ncols()),
            });
        }
        if features.nrows() != target.len() {
            return Err(CkdError::ShapeError {
                expected: format!("target length = {}", features.nrows()),
                actual: format!("target length = {}", target.len()),
            });
        }
        if let Some(row) = target.iter().position(|&v| is_missing(v)) {
            return Err(CkdError::MissingTarget { row });
        }
        Ok(Self {
            numeric_names,
            categorical_names,
            target_name,
            features,
            target,
        })
    }

    /// Copy with the NUMERIC block replaced; CATEGORICAL and target carried over
    pub fn with_numeric(&self, numeric: Array2<f64>) -> Result<Self> {
        if numeric.dim() != (self.n_rows(), self.n_numeric()) {
            return Err(CkdError::ShapeError {
                expected: format!("({}, {})", self.n_rows(), self.n_numeric()),
                actual: format!("{:?}", numeric.dim()),
            });
        }
        let mut features = self.features.clone();
        features
            .slice_mut(s![.., ..self.n_numeric()])
            .assign(&numeric);
        Ok(Self {
            features,
            ..self.clone()
        })
    }

    /// Copy with the whole feature block replaced
    pub fn with_features(&self, features: Array2<f64>) -> Result<Self> {
        Self::from_parts(
            self.numeric_names.clone(),
            self.categorical_names.clone(),
            self.target_name.clone(),
            features,
            self.target.clone(),
        )
    }

    pub fn numeric(&self) -> ArrayView2<'_, f64> {
        self.features.slice(s![.., ..self.n_numeric()])
    }

    pub fn categorical(&self) -> ArrayView2<'_, f64> {
        self.features.slice(s![.., self.n_numeric()..])
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn target(&self) -> &Array1<f64> {
        &self.target
    }

    pub fn numeric_names(&self) -> &[String] {
        &self.numeric_names
    }

    pub fn categorical_names(&self) -> &[String] {
        &self.categorical_names
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Feature names in column order
    pub fn feature_names(&self) -> Vec<String> {
        self.numeric_names
            .iter()
            .chain(self.categorical_names.iter())
            .cloned()
            .collect()
    }

    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_numeric(&self) -> usize {
        self.numeric_names.len()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn missing_summary(&self) -> Vec<MissingSummary> {
        summarize_missing(&self.feature_names(), self.features.view())
    }

    pub fn total_missing(&self) -> usize {
        self.features.iter().filter(|&&v| is_missing(v)).count()
    }
}
