//! Serializable classifier descriptions and the default roster

use super::{
    AdaBoostClassifier, Classifier, DecisionTree, GaussianNaiveBayes, KNNClassifier,
    LogisticRegression, MLPClassifier, MLPConfig, RandomForest, SVMClassifier, SVMConfig,
};
use super::svm::{Gamma, KernelType};
use crate::error::{CkdError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

fn default_c() -> f64 {
    1.0
}

fn default_epochs() -> usize {
    200
}

/// One classifier family with its hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ClassifierSpec {
    Svm {
        kernel: KernelType,
        #[serde(default = "default_c")]
        c: f64,
    },
    /// Inverse-distance weighted neighbours
    Knn { k: usize },
    GaussianNb,
    LogisticRegression {
        #[serde(default = "default_c")]
        c: f64,
    },
    DecisionTree {
        #[serde(default)]
        max_depth: Option<usize>,
    },
    RandomForest {
        n_estimators: usize,
        #[serde(default)]
        max_depth: Option<usize>,
    },
    Mlp {
        hidden_layers: Vec<usize>,
        #[serde(default = "default_epochs")]
        max_epochs: usize,
    },
    /// SAMME boosting with `base` as the weak learner
    AdaBoost {
        base: Box<ClassifierSpec>,
        n_estimators: usize,
        learning_rate: f64,
    },
}

impl ClassifierSpec {
    /// Fresh, unfitted instance; `seed` drives every random choice it makes
    pub fn build(&self, seed: u64) -> Box<dyn Classifier> {
        match self {
            ClassifierSpec::Svm { kernel, c } => Box::new(SVMClassifier::new(
                SVMConfig::default()
                    .with_kernel(*kernel)
                    .with_c(*c)
                    .with_random_state(seed),
            )),
            ClassifierSpec::Knn { k } => Box::new(KNNClassifier::new(*k)),
            ClassifierSpec::GaussianNb => Box::new(GaussianNaiveBayes::new()),
            ClassifierSpec::LogisticRegression { c } => {
                Box::new(LogisticRegression::new().with_c(*c))
            }
            ClassifierSpec::DecisionTree { max_depth } => Box::new(
                DecisionTree::new()
                    .with_max_depth(*max_depth)
                    .with_random_state(seed),
            ),
            ClassifierSpec::RandomForest {
                n_estimators,
                max_depth,
            } => Box::new(
                RandomForest::new(*n_estimators)
                    .with_max_depth(*max_depth)
                    .with_random_state(seed),
            ),
            ClassifierSpec::Mlp {
                hidden_layers,
                max_epochs,
            } => Box::new(MLPClassifier::new(
                MLPConfig::default()
                    .with_hidden_layers(hidden_layers.clone())
                    .with_max_epochs(*max_epochs)
                    .with_random_state(seed),
            )),
            ClassifierSpec::AdaBoost {
                base,
                n_estimators,
                learning_rate,
            } => Box::new(
                AdaBoostClassifier::new((**base).clone(), *n_estimators, *learning_rate)
                    .with_random_state(seed),
            ),
        }
    }

    pub fn family(&self) -> &'static str {
        match self {
            ClassifierSpec::Svm { .. } => "svm",
            ClassifierSpec::Knn { .. } => "knn",
            ClassifierSpec::GaussianNb => "gaussian_nb",
            ClassifierSpec::LogisticRegression { .. } => "logistic_regression",
            ClassifierSpec::DecisionTree { .. } => "decision_tree",
            ClassifierSpec::RandomForest { .. } => "random_forest",
            ClassifierSpec::Mlp { .. } => "mlp",
            ClassifierSpec::AdaBoost { .. } => "adaboost",
        }
    }

    /// Forests and boosters are ensembles and never boosted themselves
    pub fn is_ensemble(&self) -> bool {
        matches!(
            self,
            ClassifierSpec::RandomForest { .. } | ClassifierSpec::AdaBoost { .. }
        )
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, value: String, reason: &str| {
            Err(CkdError::InvalidParameter {
                name: name.to_string(),
                value,
                reason: reason.to_string(),
            })
        };
        match self {
            ClassifierSpec::Svm { kernel, c } => {
                if *c <= 0.0 {
                    return invalid("c", c.to_string(), "must be positive");
                }
                let gamma = match kernel {
                    KernelType::Linear => None,
                    KernelType::Polynomial { degree, gamma, .. } => {
                        if *degree == 0 {
                            return invalid("degree", degree.to_string(), "must be at least 1");
                        }
                        Some(gamma)
                    }
                    KernelType::Rbf { gamma } => Some(gamma),
                };
                if let Some(Gamma::Value(g)) = gamma {
                    if *g <= 0.0 {
                        return invalid("gamma", g.to_string(), "must be positive");
                    }
                }
                Ok(())
            }
            ClassifierSpec::Knn { k } if *k == 0 => invalid("k", k.to_string(), "must be at least 1"),
            ClassifierSpec::LogisticRegression { c } if *c <= 0.0 => {
                invalid("c", c.to_string(), "must be positive")
            }
            ClassifierSpec::RandomForest { n_estimators, .. } if *n_estimators == 0 => invalid(
                "n_estimators",
                n_estimators.to_string(),
                "must be at least 1",
            ),
            ClassifierSpec::Mlp { hidden_layers, .. }
                if hidden_layers.is_empty() || hidden_layers.contains(&0) =>
            {
                invalid(
                    "hidden_layers",
                    format!("{:?}", hidden_layers),
                    "needs at least one layer, all of positive width",
                )
            }
            ClassifierSpec::AdaBoost {
                base,
                n_estimators,
                learning_rate,
            } => {
                if *n_estimators == 0 {
                    return invalid("n_estimators", n_estimators.to_string(), "must be at least 1");
                }
                if *learning_rate <= 0.0 {
                    return invalid("learning_rate", learning_rate.to_string(), "must be positive");
                }
                if base.is_ensemble() {
                    return invalid("base", format!("{:?}", base), "must not be an ensemble");
                }
                base.validate()
            }
            _ => Ok(()),
        }
    }
}

/// A classifier registered under a stable id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: String,
    pub spec: ClassifierSpec,
}

impl RosterEntry {
    pub fn new(id: &str, spec: ClassifierSpec) -> Self {
        Self {
            id: id.to_string(),
            spec,
        }
    }
}

/// The eleven families compared by the dimensionality sweep
pub fn default_roster() -> Vec<RosterEntry> {
    let poly = |degree| KernelType::Polynomial {
        degree,
        gamma: Gamma::Scale,
        coef0: 0.0,
    };
    let svm = |kernel| ClassifierSpec::Svm { kernel, c: 1.0 };
    vec![
        RosterEntry::new("svm-linear", svm(KernelType::Linear)),
        RosterEntry::new("svm-rbf", svm(KernelType::Rbf { gamma: Gamma::Scale })),
        RosterEntry::new("svm-poly2", svm(poly(2))),
        RosterEntry::new("svm-poly3", svm(poly(3))),
        RosterEntry::new("knn-3", ClassifierSpec::Knn { k: 3 }),
        RosterEntry::new("knn-8", ClassifierSpec::Knn { k: 8 }),
        RosterEntry::new("knn-15", ClassifierSpec::Knn { k: 15 }),
        RosterEntry::new("gaussian-nb", ClassifierSpec::GaussianNb),
        RosterEntry::new(
            "logistic-regression",
            ClassifierSpec::LogisticRegression { c: 1.0 },
        ),
        RosterEntry::new("decision-tree", ClassifierSpec::DecisionTree { max_depth: None }),
        RosterEntry::new(
            "random-forest",
            ClassifierSpec::RandomForest {
                n_estimators: 100,
                max_depth: None,
            },
        ),
    ]
}

/// A small and a deeper perceptron, for opt-in neural comparisons
pub fn neural_roster() -> Vec<RosterEntry> {
    vec![
        RosterEntry::new(
            "mlp-little",
            ClassifierSpec::Mlp {
                hidden_layers: vec![4],
                max_epochs: default_epochs(),
            },
        ),
        RosterEntry::new(
            "mlp-bigger",
            ClassifierSpec::Mlp {
                hidden_layers: vec![50, 30, 20, 10],
                max_epochs: default_epochs(),
            },
        ),
    ]
}

/// Non-empty, unique ids, valid hyperparameters
pub fn validate_roster(roster: &[RosterEntry]) -> Result<()> {
    if roster.is_empty() {
        return Err(CkdError::ConfigError("classifier roster is empty".to_string()));
    }
    let mut ids = HashSet::new();
    for entry in roster {
        if !ids.insert(entry.id.as_str()) {
            return Err(CkdError::ConfigError(format!(
                "duplicate classifier id '{}'",
                entry.id
            )));
        }
        entry.spec.validate()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_roster_shape() {
        let roster = default_roster();
        assert_eq!(roster.len(), 11);
        validate_roster(&roster).unwrap();
        assert_eq!(roster.iter().filter(|e| e.spec.is_ensemble()).count(), 1);
        validate_roster(&neural_roster()).unwrap();
    }

    #[test]
    fn test_spec_json_round_trip() {
        let json = r#"{"family":"svm","kernel":{"type":"polynomial","degree":2,"gamma":"scale","coef0":0.0}}"#;
        let spec: ClassifierSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec, default_roster()[2].spec);
        let knn: ClassifierSpec = serde_json::from_str(r#"{"family":"knn","k":8}"#).unwrap();
        assert_eq!(knn, ClassifierSpec::Knn { k: 8 });
    }

    #[test]
    fn test_invalid_specs_rejected() {
        assert!(ClassifierSpec::Knn { k: 0 }.validate().is_err());
        let nested = ClassifierSpec::AdaBoost {
            base: Box::new(ClassifierSpec::RandomForest {
                n_estimators: 10,
                max_depth: None,
            }),
            n_estimators: 50,
            learning_rate: 1.0,
        };
        assert!(nested.validate().is_err());
        let dup = vec![
            RosterEntry::new("a", ClassifierSpec::GaussianNb),
            RosterEntry::new("a", ClassifierSpec::GaussianNb),
        ];
        assert!(validate_roster(&dup).is_err());
    }

    #[test]
    fn test_built_model_matches_family() {
        for entry in default_roster().into_iter().chain(neural_roster()) {
            let model = entry.spec.build(12);
            assert_eq!(model.name(), entry.spec.family());
        }
    }
}
