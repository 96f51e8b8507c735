//! CKD AutoML - transform, impute and evaluate pipeline for the chronic
//! kidney disease table
//!
//! # Modules
//!
//! ## Data
//! - [`data`] - Raw token repair, vocabulary encoding, feature partition
//! - [`preprocessing`] - Transform bank of numeric strategies
//! - [`imputation`] - Distance-weighted nearest-neighbour imputation
//!
//! ## Modelling
//! - [`decomposition`] - Principal component analysis
//! - [`training`] - Classifier families, roster and the fixed split
//! - [`evaluation`] - Component sweep, boosting stage, accuracy table
//!
//! ## Orchestration
//! - [`config`] - Pipeline configuration
//! - [`pipeline`] - End-to-end run and report
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data
pub mod data;
pub mod imputation;
pub mod preprocessing;

// Modelling
pub mod decomposition;
pub mod evaluation;
pub mod training;

// Orchestration
pub mod cli;
pub mod config;
pub mod pipeline;

pub mod utils;

pub use error::{CkdError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{CkdError, Result};

    // Data
    pub use crate::data::{AttributeSchema, Dataset, PartitionedDataset, TableLoader, Vocabulary};

    // Transforms and imputation
    pub use crate::imputation::{DistanceWeightedImputer, ImputedDataset, Imputer};
    pub use crate::preprocessing::{TransformBank, TransformSpec, TransformVariant, Transformer};

    // Modelling
    pub use crate::decomposition::{FittedPca, Pca};
    pub use crate::training::{
        accuracy_score, default_roster, train_test_split, Classifier, ClassifierSpec, RosterEntry,
    };

    // Evaluation
    pub use crate::evaluation::{
        DimensionalitySweep, EnsembleBooster, EvaluationKey, EvaluationTable, Reduction, SplitKind,
    };

    // Orchestration
    pub use crate::config::PipelineConfig;
    pub use crate::pipeline::{Pipeline, PipelineReport};
}
