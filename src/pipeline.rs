//! End-to-end run: load, partition, transform, impute, scale, split, evaluate

use crate::config::PipelineConfig;
use crate::data::{AttributeSchema, MissingSummary, PartitionedDataset, TableLoader};
use crate::error::{CkdError, Result};
use crate::evaluation::{
    DimensionalitySweep, EnsembleBooster, EvaluationFailure, EvaluationKey, EvaluationOutcome,
    EvaluationTable, MonotonicityFlag, SplitKind,
};
use crate::imputation::{DistanceWeightedImputer, ImputedDataset};
use crate::preprocessing::TransformVariant;
use crate::training::{train_test_split, TrainTestSplit};
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Absent cell whose row shares no observed coordinate with any donor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncomparableCell {
    pub row: usize,
    pub attribute: String,
}

/// Imputation result of one transform variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSummary {
    pub variant: String,
    pub imputed_cells: usize,
    /// Attributes with no observed value, left absent
    pub unresolved: Vec<String>,
    /// Set when imputation stopped on a cell with no comparable donor
    #[serde(default)]
    pub uncomparable: Option<UncomparableCell>,
    /// Set when the variant could not be imputed or evaluated
    pub error: Option<String>,
    pub evaluated: bool,
}

impl VariantSummary {
    fn record_imputation_error(&mut self, e: &CkdError) {
        warn!(variant = %self.variant, error = %e, "Imputation failed");
        if let CkdError::NoComparableRows { row, attribute } = e {
            self.uncomparable = Some(UncomparableCell {
                row: *row,
                attribute: attribute.clone(),
            });
        }
        self.error = Some(e.to_string());
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub n_rows: usize,
    pub n_features: usize,
    pub missing: Vec<MissingSummary>,
    pub variants: Vec<VariantSummary>,
    pub table: EvaluationTable,
    pub failures: Vec<EvaluationFailure>,
    pub flags: Vec<MonotonicityFlag>,
    pub elapsed_secs: f64,
}

impl PipelineReport {
    /// Best held-out accuracy across every variant, classifier and reduction
    pub fn best_held_out(&self) -> Option<(&EvaluationKey, f64)> {
        self.table.best(SplitKind::Test)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// The transform-compare-impute-evaluate pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    schema: AttributeSchema,
}

impl Pipeline {
    /// Pipeline over the chronic kidney disease schema
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_schema(config, AttributeSchema::chronic_kidney_disease()?)
    }

    pub fn with_schema(config: PipelineConfig, schema: AttributeSchema) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, schema })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    /// Read, normalize and partition the raw table
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<PartitionedDataset> {
        let loader = TableLoader::new(self.schema.clone());
        let dataset = loader.load_csv(path)?;
        let partitioned = PartitionedDataset::partition(&dataset, &self.schema)?;
        info!(
            rows = partitioned.n_rows(),
            numeric = partitioned.n_numeric(),
            features = partitioned.n_features(),
            missing = partitioned.total_missing(),
            "Loaded dataset"
        );
        Ok(partitioned)
    }

    pub fn imputer(&self) -> DistanceWeightedImputer {
        DistanceWeightedImputer::new(self.config.imputation.n_neighbors)
            .with_target_in_distance(self.config.imputation.include_target_in_distance)
    }

    /// Build every transform variant and impute each one independently.
    ///
    /// A variant that cannot be imputed yields an `Err` in its slot; the other
    /// variants are unaffected.
    pub fn transform_and_impute(
        &self,
        data: &PartitionedDataset,
    ) -> Result<Vec<(TransformVariant, Result<ImputedDataset>)>> {
        let variants = self.config.transforms.bank().apply(data)?;
        let imputer = self.imputer();
        Ok(variants
            .into_par_iter()
            .map(|variant| {
                let imputed = imputer.impute_variant(&variant);
                (variant, imputed)
            })
            .collect())
    }

    /// Scale the complete feature block with the configured bank strategy
    pub fn scale_features(&self, data: &PartitionedDataset) -> Result<Array2<f64>> {
        let Some(id) = &self.config.evaluation.scaler else {
            return Ok(data.features().clone());
        };
        let spec = self
            .config
            .transforms
            .bank()
            .get(id)
            .ok_or_else(|| CkdError::ConfigError(format!("unknown scaler '{}'", id)))?;
        spec.build().fit_transform(data.features())
    }

    /// The fixed split every classifier of a variant is evaluated on
    pub fn split(&self, data: &PartitionedDataset) -> Result<TrainTestSplit> {
        let x = self.scale_features(data)?;
        train_test_split(
            &x,
            data.target(),
            self.config.split.test_fraction,
            self.config.split.seed,
        )
    }

    /// Sweep and, when enabled, boost one imputed variant
    pub fn evaluate(&self, imputed: &ImputedDataset) -> Result<EvaluationOutcome> {
        let variant = imputed.variant.as_str();
        let data = imputed.clone().into_complete()?;
        let split = self.split(&data)?;

        let seed = self.config.split.seed;
        let mut outcome = DimensionalitySweep::new(self.config.roster.clone())
            .with_bounds(
                self.config.sweep.min_components,
                self.config.sweep.max_components,
            )
            .with_seed(seed)
            .run(variant, &split)?;

        let boosting = &self.config.boosting;
        if boosting.enabled {
            let boosted = EnsembleBooster::new(boosting.n_estimators, boosting.learning_rate)
                .with_seed(seed)
                .with_families(boosting.families.clone())
                .run(variant, &self.config.roster, &split)?;
            outcome.merge(boosted)?;
        }
        Ok(outcome)
    }

    /// Run every stage on an already partitioned dataset
    pub fn run_dataset(&self, data: &PartitionedDataset) -> Result<PipelineReport> {
        let start = Instant::now();
        let imputed = self.transform_and_impute(data)?;

        let mut report = PipelineReport {
            n_rows: data.n_rows(),
            n_features: data.n_features(),
            missing: data.missing_summary(),
            variants: Vec::with_capacity(imputed.len()),
            table: EvaluationTable::new(),
            failures: Vec::new(),
            flags: Vec::new(),
            elapsed_secs: 0.0,
        };

        for (variant, result) in imputed {
            let mut summary = VariantSummary {
                variant: variant.id.clone(),
                imputed_cells: 0,
                unresolved: Vec::new(),
                uncomparable: None,
                error: None,
                evaluated: false,
            };
            match result {
                Err(e) => summary.record_imputation_error(&e),
                Ok(imputed) => {
                    summary.imputed_cells = imputed.imputed_cells;
                    summary.unresolved = imputed.unresolved.clone();
                    if self.config.evaluation.variants.contains(&variant.id) {
                        match self.evaluate(&imputed) {
                            Ok(outcome) => {
                                report.table.merge(outcome.table)?;
                                report.failures.extend(outcome.failures);
                                report.flags.extend(outcome.flags);
                                summary.evaluated = true;
                            }
                            Err(e) => {
                                warn!(variant = %variant.id, error = %e, "Variant not evaluated");
                                summary.error = Some(e.to_string());
                            }
                        }
                    }
                }
            }
            report.variants.push(summary);
        }

        report.elapsed_secs = start.elapsed().as_secs_f64();
        info!(
            records = report.table.len(),
            failures = report.failures.len(),
            flags = report.flags.len(),
            elapsed_secs = report.elapsed_secs,
            "Pipeline finished"
        );
        Ok(report)
    }

    pub fn run<P: AsRef<Path>>(&self, path: P) -> Result<PipelineReport> {
        let data = self.load(path)?;
        self.run_dataset(&data)
    }
}
