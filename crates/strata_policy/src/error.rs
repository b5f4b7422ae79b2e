//! Error types for policy module.

use thiserror::Error;

/// Result type alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors that can occur during validation.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Validation failed with {errors} error(s):\n{report}")]
    ValidationFailed { errors: usize, report: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
