//! Boosted variants of the base classifier families

use super::{
    fit_and_score, EvaluationFailure, EvaluationKey, EvaluationOutcome, Reduction, SplitKind,
};
use crate::error::{CkdError, Result};
use crate::training::{ClassifierSpec, RosterEntry, TrainTestSplit};
use rayon::prelude::*;
use tracing::{info, warn};

/// Prefix of the classifier id a boosted family is recorded under
pub const BOOSTED_PREFIX: &str = "adaboost/";

/// Wraps each non-ensemble family in SAMME boosting and scores it on the
/// held-out side of the split, without any projection.
#[derive(Debug, Clone)]
pub struct EnsembleBooster {
    n_estimators: usize,
    learning_rate: f64,
    seed: u64,
    /// Roster ids to boost; `None` boosts every non-ensemble family
    families: Option<Vec<String>>,
}

impl Default for EnsembleBooster {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl EnsembleBooster {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            seed: 12,
            families: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_families(mut self, families: Option<Vec<String>>) -> Self {
        self.families = families;
        self
    }

    /// Boosted roster entries, ids prefixed with `adaboost/`.
    ///
    /// Naming an unknown id or an ensemble family is a configuration error.
    pub fn boosted_roster(&self, roster: &[RosterEntry]) -> Result<Vec<RosterEntry>> {
        let selected: Vec<&RosterEntry> = match &self.families {
            None => roster.iter().filter(|e| !e.spec.is_ensemble()).collect(),
            Some(ids) => ids
                .iter()
                .map(|id| {
                    let entry = roster.iter().find(|e| &e.id == id).ok_or_else(|| {
                        CkdError::ConfigError(format!("cannot boost unknown classifier '{}'", id))
                    })?;
                    if entry.spec.is_ensemble() {
                        return Err(CkdError::ConfigError(format!(
                            "'{}' is already an ensemble and cannot be boosted",
                            id
                        )));
                    }
                    Ok(entry)
                })
                .collect::<Result<_>>()?,
        };

        let boosted: Vec<RosterEntry> = selected
            .into_iter()
            .map(|entry| {
                RosterEntry::new(
                    &format!("{}{}", BOOSTED_PREFIX, entry.id),
                    ClassifierSpec::AdaBoost {
                        base: Box::new(entry.spec.clone()),
                        n_estimators: self.n_estimators,
                        learning_rate: self.learning_rate,
                    },
                )
            })
            .collect();
        for entry in &boosted {
            entry.spec.validate()?;
        }
        Ok(boosted)
    }

    /// One held-out accuracy per boosted family; failures are collected
    pub fn run(
        &self,
        variant: &str,
        roster: &[RosterEntry],
        split: &TrainTestSplit,
    ) -> Result<EvaluationOutcome> {
        let boosted = self.boosted_roster(roster)?;
        info!(variant, families = boosted.len(), rounds = self.n_estimators, "Boosting base families");

        let scores: Vec<(String, Result<(f64, f64)>)> = boosted
            .par_iter()
            .map(|entry| {
                let score = fit_and_score(
                    &entry.spec,
                    self.seed,
                    &split.x_train,
                    &split.y_train,
                    &split.x_test,
                    &split.y_test,
                );
                (entry.id.clone(), score)
            })
            .collect();

        let mut outcome = EvaluationOutcome::default();
        for (classifier, score) in scores {
            match score {
                Ok((_, test)) => outcome.table.insert(
                    EvaluationKey::new(variant, &classifier, Reduction::Unreduced, SplitKind::Test),
                    test,
                )?,
                Err(e) => {
                    warn!(variant, classifier = %classifier, error = %e, "Boosted fit failed");
                    outcome.failures.push(EvaluationFailure {
                        variant: variant.to_string(),
                        classifier,
                        reduction: Reduction::Unreduced,
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(outcome)
    }
}
