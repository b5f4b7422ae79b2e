//! Error types for synthesis.

use strata_core::CoreError;
use strata_graph::GraphError;
use strata_policy::{PolicyError, ValidationReport};
use thiserror::Error;

/// Result type alias for synthesis operations.
pub type SynthResult<T> = Result<T, SynthError>;

/// Errors that can occur while synthesizing or writing templates.
#[derive(Error, Debug)]
pub enum SynthError {
    #[error("Validation failed with {} error(s)", .0.summary.errors)]
    ValidationFailed(Box<ValidationReport>),

    #[error("Failed to serialize {logical_id}: {message}")]
    Serialization { logical_id: String, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl SynthError {
    /// The validation report, when synthesis was blocked by validation.
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            SynthError::ValidationFailed(report) => Some(report),
            _ => None,
        }
    }
}
