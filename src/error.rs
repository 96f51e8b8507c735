//! Error types for the CKD pipeline

use thiserror::Error;

/// Result type alias using CkdError
pub type Result<T> = std::result::Result<T, CkdError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum CkdError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Unrecognized token {token:?} for categorical attribute '{attribute}'")]
    VocabularyError { attribute: String, token: String },

    #[error("Cannot cast token {token:?} in attribute '{attribute}' (row {row}) to a number")]
    CastError {
        attribute: String,
        row: usize,
        token: String,
    },

    #[error("Outcome label is absent in row {row}")]
    MissingTarget { row: usize },

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("No observed value to impute from for attribute(s): {}", attributes.join(", "))]
    ImputationUnderflow { attributes: Vec<String> },

    #[error("Row {row} shares no observed attribute with any donor for '{attribute}'")]
    NoComparableRows { row: usize, attribute: String },

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter '{name}' = {value}: {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<polars::error::PolarsError> for CkdError {
    fn from(err: polars::error::PolarsError) -> Self {
        CkdError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for CkdError {
    fn from(err: serde_json::Error) -> Self {
        CkdError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for CkdError {
    fn from(err: ndarray::ShapeError) -> Self {
        CkdError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CkdError::VocabularyError {
            attribute: "Appetite".to_string(),
            token: "fair".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unrecognized token \"fair\" for categorical attribute 'Appetite'"
        );
    }

    #[test]
    fn test_underflow_lists_attributes() {
        let err = CkdError::ImputationUnderflow {
            attributes: vec!["Sodium".to_string(), "Potassium".to_string()],
        };
        assert!(err.to_string().ends_with("Sodium, Potassium"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CkdError = io_err.into();
        assert!(matches!(err, CkdError::IoError(_)));
    }
}
