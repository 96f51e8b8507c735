//! Pipeline configuration

use crate::error::{CkdError, Result};
use crate::preprocessing::{NamedTransform, TransformBank, IDENTITY_VARIANT};
use crate::training::{default_roster, validate_roster, RosterEntry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Distance-weighted imputation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImputationConfig {
    /// Neighbours averaged per absent cell
    pub n_neighbors: usize,
    /// Use the outcome column as a distance coordinate
    pub include_target_in_distance: bool,
}

impl Default for ImputationConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 8,
            include_target_in_distance: true,
        }
    }
}

/// Percentile ranges of the two robust scalers in the transform bank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub robust_range: (f64, f64),
    pub wide_robust_range: (f64, f64),
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            robust_range: (25.0, 75.0),
            wide_robust_range: (15.0, 85.0),
        }
    }
}

impl TransformConfig {
    pub fn strategies(&self) -> Vec<NamedTransform> {
        TransformBank::default_strategies(self.robust_range, self.wide_robust_range)
    }

    pub fn bank(&self) -> TransformBank {
        TransformBank::new(self.strategies())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Held-out share of the rows, rounded up
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 12,
        }
    }
}

/// Component count bounds; `max_components: None` sweeps to the feature count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub min_components: usize,
    pub max_components: Option<usize>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            min_components: 1,
            max_components: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Transform variants the classifiers are evaluated on
    pub variants: Vec<String>,
    /// Bank strategy applied to the imputed features before splitting;
    /// `None` leaves them unscaled
    pub scaler: Option<String>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            variants: vec![IDENTITY_VARIANT.to_string()],
            scaler: Some("wide-robust".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingConfig {
    pub enabled: bool,
    pub n_estimators: usize,
    pub learning_rate: f64,
    /// Roster ids to boost; `None` boosts every non-ensemble family
    pub families: Option<Vec<String>>,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            n_estimators: 50,
            learning_rate: 1.0,
            families: None,
        }
    }
}

/// Configuration for a full pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub imputation: ImputationConfig,
    pub transforms: TransformConfig,
    pub split: SplitConfig,
    pub sweep: SweepConfig,
    pub evaluation: EvaluationConfig,
    pub boosting: BoostingConfig,
    pub roster: Vec<RosterEntry>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            imputation: ImputationConfig::default(),
            transforms: TransformConfig::default(),
            split: SplitConfig::default(),
            sweep: SweepConfig::default(),
            evaluation: EvaluationConfig::default(),
            boosting: BoostingConfig::default(),
            roster: default_roster(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON file; omitted sections take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_n_neighbors(mut self, k: usize) -> Self {
        self.imputation.n_neighbors = k;
        self
    }

    pub fn with_target_in_distance(mut self, include: bool) -> Self {
        self.imputation.include_target_in_distance = include;
        self
    }

    pub fn with_robust_ranges(mut self, robust: (f64, f64), wide_robust: (f64, f64)) -> Self {
        self.transforms.robust_range = robust;
        self.transforms.wide_robust_range = wide_robust;
        self
    }

    pub fn with_split(mut self, test_fraction: f64, seed: u64) -> Self {
        self.split = SplitConfig {
            test_fraction,
            seed,
        };
        self
    }

    pub fn with_component_bounds(mut self, min: usize, max: Option<usize>) -> Self {
        self.sweep = SweepConfig {
            min_components: min,
            max_components: max,
        };
        self
    }

    pub fn with_variants(mut self, variants: Vec<String>) -> Self {
        self.evaluation.variants = variants;
        self
    }

    pub fn with_scaler(mut self, scaler: Option<String>) -> Self {
        self.evaluation.scaler = scaler;
        self
    }

    pub fn with_boosting(mut self, enabled: bool) -> Self {
        self.boosting.enabled = enabled;
        self
    }

    pub fn with_roster(mut self, roster: Vec<RosterEntry>) -> Self {
        self.roster = roster;
        self
    }

    /// Checks every setting that does not depend on the data
    pub fn validate(&self) -> Result<()> {
        if self.imputation.n_neighbors == 0 {
            return Err(CkdError::ConfigError(
                "imputation needs at least one neighbour".to_string(),
            ));
        }

        let bank = self.transforms.bank();
        bank.validate()?;

        let split = &self.split;
        if !(split.test_fraction > 0.0 && split.test_fraction < 1.0) {
            return Err(CkdError::ConfigError(format!(
                "test fraction {} must be strictly between 0 and 1",
                split.test_fraction
            )));
        }

        let sweep = &self.sweep;
        if sweep.min_components == 0 || sweep.max_components.is_some_and(|m| m < sweep.min_components) {
            return Err(CkdError::ConfigError(format!(
                "component bounds {}..={:?} are empty",
                sweep.min_components, sweep.max_components
            )));
        }

        if self.evaluation.variants.is_empty() {
            return Err(CkdError::ConfigError(
                "no transform variant selected for evaluation".to_string(),
            ));
        }
        let known: HashSet<String> = bank.variant_ids().into_iter().collect();
        for variant in &self.evaluation.variants {
            if !known.contains(variant) {
                return Err(CkdError::ConfigError(format!(
                    "unknown transform variant '{}'",
                    variant
                )));
            }
        }
        if let Some(scaler) = &self.evaluation.scaler {
            if bank.get(scaler).is_none() {
                return Err(CkdError::ConfigError(format!("unknown scaler '{}'", scaler)));
            }
        }

        if self.boosting.enabled
            && (self.boosting.n_estimators == 0 || self.boosting.learning_rate <= 0.0)
        {
            return Err(CkdError::ConfigError(
                "boosting needs a positive round count and learning rate".to_string(),
            ));
        }

        validate_roster(&self.roster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.imputation.n_neighbors, 8);
        assert_eq!(config.split.seed, 12);
        assert_eq!(config.roster.len(), 11);
        assert_eq!(config.evaluation.variants, vec!["identity".to_string()]);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        assert!(PipelineConfig::new().with_n_neighbors(0).validate().is_err());
        assert!(PipelineConfig::new().with_split(1.0, 1).validate().is_err());
        assert!(PipelineConfig::new()
            .with_component_bounds(3, Some(2))
            .validate()
            .is_err());
        assert!(PipelineConfig::new()
            .with_variants(vec!["log".to_string()])
            .validate()
            .is_err());
        assert!(PipelineConfig::new()
            .with_scaler(Some("minmax".to_string()))
            .validate()
            .is_err());
        assert!(PipelineConfig::new()
            .with_robust_ranges((75.0, 25.0), (15.0, 85.0))
            .validate()
            .is_err());
        assert!(PipelineConfig::new().with_roster(Vec::new()).validate().is_err());
    }

    #[test]
    fn test_partial_json_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"imputation": {{"n_neighbors": 5}}, "boosting": {{"enabled": false}},
                "roster": [{{"id": "nb", "spec": {{"family": "gaussian_nb"}}}}]}}"#
        )
        .unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.imputation.n_neighbors, 5);
        assert!(config.imputation.include_target_in_distance);
        assert!(!config.boosting.enabled);
        assert_eq!(config.boosting.n_estimators, 50);
        assert_eq!(config.roster.len(), 1);
        assert_eq!(config.transforms, TransformConfig::default());
    }

    #[test]
    fn test_json_round_trip() {
        let config = PipelineConfig::new().with_split(0.3, 7).with_scaler(None);
        let back: PipelineConfig = serde_json::from_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }
}
