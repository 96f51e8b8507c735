//! Raw table ingestion
//!
//! - [`AttributeSchema`]: ordered attributes, their partition and repair table
//! - [`TableLoader`]: token repair, vocabulary encoding and numeric casting
//! - [`Dataset`] / [`PartitionedDataset`]: the normalized table and its
//!   [NUMERIC | CATEGORICAL | target] view

mod dataset;
mod loader;
mod schema;
mod vocabulary;

pub use dataset::{Dataset, MissingSummary, PartitionedDataset};
pub use loader::{TableLoader, UNKNOWN_TOKEN};
pub use schema::{Attribute, AttributeKind, AttributeSchema, TokenRepair};
pub use vocabulary::Vocabulary;
