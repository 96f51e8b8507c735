//! PCA component sweep over the classifier roster

use super::{
    fit_and_score, EvaluationFailure, EvaluationKey, EvaluationOutcome, EvaluationTable,
    MonotonicityFlag, Reduction, SplitKind,
};
use crate::decomposition::Pca;
use crate::error::{CkdError, Result};
use crate::training::{validate_roster, RosterEntry, TrainTestSplit};
use ndarray::Array2;
use rayon::prelude::*;
use std::ops::RangeInclusive;
use tracing::{debug, info, warn};

/// Per component count, the projected splits or the reason projection failed
type Projection = std::result::Result<(Array2<f64>, Array2<f64>), String>;

/// (train, test) accuracy or the fit error
type Score = std::result::Result<(f64, f64), String>;

/// Scores every roster family at every retained component count.
///
/// PCA is fit once on the training split with all components kept; each
/// count `c` uses the leading `c` of them, which is the same projection a
/// fresh `c`-component fit would give. Every family is rebuilt from its spec
/// for every count, so no fitted state carries between counts.
#[derive(Debug, Clone)]
pub struct DimensionalitySweep {
    roster: Vec<RosterEntry>,
    min_components: usize,
    /// `None` sweeps up to the feature count
    max_components: Option<usize>,
    seed: u64,
}

impl DimensionalitySweep {
    pub fn new(roster: Vec<RosterEntry>) -> Self {
        Self {
            roster,
            min_components: 1,
            max_components: None,
            seed: 12,
        }
    }

    pub fn with_bounds(mut self, min_components: usize, max_components: Option<usize>) -> Self {
        self.min_components = min_components;
        self.max_components = max_components;
        self
    }

    /// Seed handed to every classifier built during the sweep
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    /// Component counts to evaluate for a matrix with `n_features` columns
    pub fn component_range(&self, n_features: usize) -> Result<RangeInclusive<usize>> {
        let max = self.max_components.unwrap_or(n_features);
        if self.min_components == 0 || self.min_components > max {
            return Err(CkdError::ConfigError(format!(
                "component bounds {}..={} are empty",
                self.min_components, max
            )));
        }
        if max > n_features {
            return Err(CkdError::ConfigError(format!(
                "cannot retain {} components from {} features",
                max, n_features
            )));
        }
        Ok(self.min_components..=max)
    }

    /// Run the sweep for one variant's split.
    ///
    /// Fit failures become [`EvaluationFailure`]s and the sweep carries on;
    /// only an invalid roster, empty bounds or a PCA that cannot be fit at all
    /// fail the whole run.
    pub fn run(&self, variant: &str, split: &TrainTestSplit) -> Result<EvaluationOutcome> {
        validate_roster(&self.roster)?;
        let n_features = split.x_train.ncols();
        let range = self.component_range(n_features)?;
        let full_pca = Pca::full().fit(&split.x_train)?;

        info!(
            variant,
            components = ?range,
            classifiers = self.roster.len(),
            "Starting dimensionality sweep"
        );

        let per_count: Vec<(usize, Vec<(String, Score)>)> = range
            .clone()
            .into_par_iter()
            .map(|c| {
                let projection: Projection = full_pca
                    .truncated(c)
                    .and_then(|pca| -> Result<(Array2<f64>, Array2<f64>)> {
                        Ok((pca.transform(&split.x_train)?, pca.transform(&split.x_test)?))
                    })
                    .map_err(|e| e.to_string());

                let scores: Vec<(String, Score)> = self
                    .roster
                    .par_iter()
                    .map(|entry| {
                        let score = match &projection {
                            Ok((x_train, x_test)) => fit_and_score(
                                &entry.spec,
                                self.seed,
                                x_train,
                                &split.y_train,
                                x_test,
                                &split.y_test,
                            )
                            .map_err(|e| e.to_string()),
                            Err(message) => Err(message.clone()),
                        };
                        (entry.id.clone(), score)
                    })
                    .collect();
                debug!(variant, components = c, "Evaluated component count");
                (c, scores)
            })
            .collect();

        let mut outcome = EvaluationOutcome::default();
        for (c, scores) in per_count {
            for (classifier, score) in scores {
                match score {
                    Ok((train, test)) => {
                        let reduction = Reduction::Pca(c);
                        outcome.table.insert(
                            EvaluationKey::new(variant, &classifier, reduction, SplitKind::Train),
                            train,
                        )?;
                        outcome.table.insert(
                            EvaluationKey::new(variant, &classifier, reduction, SplitKind::Test),
                            test,
                        )?;
                    }
                    Err(message) => {
                        warn!(variant, classifier = %classifier, components = c, error = %message, "Fit failed");
                        outcome.failures.push(EvaluationFailure {
                            variant: variant.to_string(),
                            classifier,
                            reduction: Reduction::Pca(c),
                            message,
                        });
                    }
                }
            }
        }

        if *range.end() == n_features {
            outcome.flags = flag_non_monotonic(&outcome.table, variant, n_features);
        }

        info!(
            variant,
            records = outcome.table.len(),
            failures = outcome.failures.len(),
            "Dimensionality sweep finished"
        );
        Ok(outcome)
    }
}

fn flag_non_monotonic(
    table: &EvaluationTable,
    variant: &str,
    n_features: usize,
) -> Vec<MonotonicityFlag> {
    let flags = table.monotonicity_flags(variant, n_features);
    for flag in &flags {
        warn!(
            variant,
            classifier = %flag.classifier,
            full = flag.full_accuracy,
            best = flag.best_accuracy,
            best_components = flag.best_components,
            "Training accuracy drops with every component kept"
        );
    }
    flags
}
