//! Dimensionality reduction

mod pca;

pub use pca::{FittedPca, Pca};
