//! Utility functions and types

pub mod stats;

pub use stats::{handle_zero_scale, nan_mean_std, observed_sorted, percentile_sorted};
