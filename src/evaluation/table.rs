//! Accuracy bookkeeping keyed by (variant, classifier, reduction, split)

use crate::error::{CkdError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which side of the fixed split an accuracy was measured on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitKind {
    Train,
    Test,
}

/// Projection applied before fitting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "components", rename_all = "snake_case")]
pub enum Reduction {
    /// Leading principal components fit on the training split
    Pca(usize),
    /// Raw scaled features, used by the boosting stage
    Unreduced,
}

impl Reduction {
    pub fn components(&self) -> Option<usize> {
        match self {
            Reduction::Pca(c) => Some(*c),
            Reduction::Unreduced => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EvaluationKey {
    pub variant: String,
    pub classifier: String,
    pub reduction: Reduction,
    pub split: SplitKind,
}

impl EvaluationKey {
    pub fn new(variant: &str, classifier: &str, reduction: Reduction, split: SplitKind) -> Self {
        Self {
            variant: variant.to_string(),
            classifier: classifier.to_string(),
            reduction,
            split,
        }
    }
}

/// One row of the exported table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    #[serde(flatten)]
    pub key: EvaluationKey,
    pub accuracy: f64,
}

/// A (variant, classifier, reduction) combination that produced no record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationFailure {
    pub variant: String,
    pub classifier: String,
    pub reduction: Reduction,
    pub message: String,
}

/// Training accuracy with every component kept fell below the best training
/// accuracy reached with fewer components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonotonicityFlag {
    pub variant: String,
    pub classifier: String,
    pub full_components: usize,
    pub full_accuracy: f64,
    pub best_components: usize,
    pub best_accuracy: f64,
}

/// Write-once accuracy table.
///
/// Ordered by key, so a curve reads out by increasing component count and the
/// exported table does not depend on the order fits finished in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<EvaluationRecord>", from = "Vec<EvaluationRecord>")]
pub struct EvaluationTable {
    entries: BTreeMap<EvaluationKey, f64>,
}

impl EvaluationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accuracy; a key can only be recorded once
    pub fn insert(&mut self, key: EvaluationKey, accuracy: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&accuracy) {
            return Err(CkdError::ValidationError(format!(
                "accuracy {} for {:?} is outside [0, 1]",
                accuracy, key
            )));
        }
        if self.entries.contains_key(&key) {
            return Err(CkdError::ValidationError(format!(
                "evaluation {:?} already recorded",
                key
            )));
        }
        self.entries.insert(key, accuracy);
        Ok(())
    }

    /// Move every record of `other` into this table
    pub fn merge(&mut self, other: EvaluationTable) -> Result<()> {
        for (key, accuracy) in other.entries {
            self.insert(key, accuracy)?;
        }
        Ok(())
    }

    pub fn get(&self, key: &EvaluationKey) -> Option<f64> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EvaluationKey, f64)> {
        self.entries.iter().map(|(k, &v)| (k, v))
    }

    pub fn records(&self) -> Vec<EvaluationRecord> {
        self.iter()
            .map(|(key, accuracy)| EvaluationRecord {
                key: key.clone(),
                accuracy,
            })
            .collect()
    }

    /// Distinct classifier ids, sorted
    pub fn classifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().map(|k| k.classifier.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// `(component count, accuracy)` pairs of one family, by increasing count
    pub fn curve(&self, variant: &str, classifier: &str, split: SplitKind) -> Vec<(usize, f64)> {
        self.iter()
            .filter(|(k, _)| k.variant == variant && k.classifier == classifier && k.split == split)
            .filter_map(|(k, acc)| k.reduction.components().map(|c| (c, acc)))
            .collect()
    }

    /// Highest accuracy on `split`; ties keep the smallest key
    pub fn best(&self, split: SplitKind) -> Option<(&EvaluationKey, f64)> {
        self.iter()
            .filter(|(k, _)| k.split == split)
            .fold(None, |best, (k, acc)| match best {
                Some((_, b)) if b >= acc => best,
                _ => Some((k, acc)),
            })
    }

    /// Families of `variant` whose training accuracy at `full_components`
    /// is below what they reach with fewer components
    pub fn monotonicity_flags(&self, variant: &str, full_components: usize) -> Vec<MonotonicityFlag> {
        let mut flags = Vec::new();
        for classifier in self.classifiers() {
            let curve = self.curve(variant, &classifier, SplitKind::Train);
            let Some(&(_, full_accuracy)) = curve.iter().find(|(c, _)| *c == full_components) else {
                continue;
            };
            let best_smaller = curve
                .iter()
                .filter(|(c, _)| *c < full_components)
                .fold(None, |best: Option<(usize, f64)>, &(c, acc)| match best {
                    Some((_, b)) if b >= acc => best,
                    _ => Some((c, acc)),
                });
            if let Some((best_components, best_accuracy)) = best_smaller {
                if full_accuracy < best_accuracy {
                    flags.push(MonotonicityFlag {
                        variant: variant.to_string(),
                        classifier,
                        full_components,
                        full_accuracy,
                        best_components,
                        best_accuracy,
                    });
                }
            }
        }
        flags
    }
}

impl From<EvaluationTable> for Vec<EvaluationRecord> {
    fn from(table: EvaluationTable) -> Self {
        table
            .entries
            .into_iter()
            .map(|(key, accuracy)| EvaluationRecord { key, accuracy })
            .collect()
    }
}

impl From<Vec<EvaluationRecord>> for EvaluationTable {
    /// Later duplicates overwrite earlier ones
    fn from(records: Vec<EvaluationRecord>) -> Self {
        Self {
            entries: records.into_iter().map(|r| (r.key, r.accuracy)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(classifier: &str, c: usize, split: SplitKind) -> EvaluationKey {
        EvaluationKey::new("identity", classifier, Reduction::Pca(c), split)
    }

    #[test]
    fn test_records_are_write_once() {
        let mut table = EvaluationTable::new();
        table.insert(key("knn-3", 1, SplitKind::Test), 0.9).unwrap();
        assert!(table.insert(key("knn-3", 1, SplitKind::Test), 0.8).is_err());
        assert!(table.insert(key("knn-3", 2, SplitKind::Test), 1.5).is_err());
        assert_eq!(table.get(&key("knn-3", 1, SplitKind::Test)), Some(0.9));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_curve_is_ordered_by_components() {
        let mut table = EvaluationTable::new();
        for c in [10, 2, 1, 3] {
            table
                .insert(key("svm-linear", c, SplitKind::Train), c as f64 / 10.0)
                .unwrap();
        }
        table.insert(key("svm-linear", 1, SplitKind::Test), 0.5).unwrap();
        let curve = table.curve("identity", "svm-linear", SplitKind::Train);
        assert_eq!(curve, vec![(1, 0.1), (2, 0.2), (3, 0.3), (10, 1.0)]);
    }

    #[test]
    fn test_best_prefers_smallest_key_on_ties() {
        let mut table = EvaluationTable::new();
        table.insert(key("b", 1, SplitKind::Test), 0.9).unwrap();
        table.insert(key("a", 2, SplitKind::Test), 0.9).unwrap();
        table.insert(key("a", 1, SplitKind::Train), 1.0).unwrap();
        let (best, acc) = table.best(SplitKind::Test).unwrap();
        assert_eq!(best.classifier, "a");
        assert_eq!(acc, 0.9);
    }

    #[test]
    fn test_monotonicity_flag_raised_on_drop() {
        let mut table = EvaluationTable::new();
        table.insert(key("tree", 1, SplitKind::Train), 0.8).unwrap();
        table.insert(key("tree", 2, SplitKind::Train), 0.95).unwrap();
        table.insert(key("tree", 3, SplitKind::Train), 0.9).unwrap();
        table.insert(key("nb", 1, SplitKind::Train), 0.7).unwrap();
        table.insert(key("nb", 3, SplitKind::Train), 0.7).unwrap();

        let flags = table.monotonicity_flags("identity", 3);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].classifier, "tree");
        assert_eq!(flags[0].best_components, 2);
    }

    #[test]
    fn test_json_is_a_list_of_records() {
        let mut table = EvaluationTable::new();
        table.insert(key("knn-8", 4, SplitKind::Test), 0.75).unwrap();
        table
            .insert(
                EvaluationKey::new("identity", "adaboost/knn-8", Reduction::Unreduced, SplitKind::Test),
                0.8,
            )
            .unwrap();
        let json = serde_json::to_value(&table).unwrap();
        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["classifier"], "adaboost/knn-8");
        assert_eq!(rows[0]["reduction"]["kind"], "unreduced");
        assert_eq!(rows[1]["reduction"]["components"], 4);
        assert_eq!(rows[1]["split"], "test");

        let back: EvaluationTable = serde_json::from_value(json).unwrap();
        assert_eq!(back, table);
    }
}
