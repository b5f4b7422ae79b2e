//! Error types for the graph module.

use strata_core::CoreError;
use thiserror::Error;

/// Result type alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors that can occur while ordering declarations or assigning logical IDs.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Logical ID collision: '{logical_id}' assigned to {}", paths.join(", "))]
    LogicalIdCollision {
        logical_id: String,
        paths: Vec<String>,
    },

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}
