//! Classifier evaluation over the fixed split
//!
//! - [`DimensionalitySweep`]: PCA component sweep over the whole roster
//! - [`EnsembleBooster`]: boosted variants of the non-ensemble families
//! - [`EvaluationTable`]: the typed accuracy table both stages write into

mod booster;
mod sweep;
mod table;

pub use booster::{EnsembleBooster, BOOSTED_PREFIX};
pub use sweep::DimensionalitySweep;
pub use table::{
    EvaluationFailure, EvaluationKey, EvaluationRecord, EvaluationTable, MonotonicityFlag,
    Reduction, SplitKind,
};

use crate::error::Result;
use crate::training::{accuracy_score, ClassifierSpec};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Records, failures and flags produced by one evaluation stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub table: EvaluationTable,
    pub failures: Vec<EvaluationFailure>,
    pub flags: Vec<MonotonicityFlag>,
}

impl EvaluationOutcome {
    pub fn merge(&mut self, other: EvaluationOutcome) -> Result<()> {
        self.table.merge(other.table)?;
        self.failures.extend(other.failures);
        self.flags.extend(other.flags);
        Ok(())
    }
}

/// Fit a fresh instance of `spec` and score it on both sides of the split
pub(crate) fn fit_and_score(
    spec: &ClassifierSpec,
    seed: u64,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
) -> Result<(f64, f64)> {
    let mut model = spec.build(seed);
    model.fit(x_train, y_train)?;
    let train = accuracy_score(y_train, &model.predict(x_train)?)?;
    let test = accuracy_score(y_test, &model.predict(x_test)?)?;
    Ok((train, test))
}
