//! Error types for the core module.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while building a construct tree or resolving tokens.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Duplicate child name '{name}' under {parent}")]
    DuplicateChildName { parent: String, name: String },

    #[error("Invalid construct name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Unknown construct node: {0}")]
    UnknownNode(String),

    #[error("Unknown resource declaration: {0}")]
    UnknownDeclaration(String),

    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("Duplicate {section} entry: {name}")]
    DuplicateSectionEntry { section: String, name: String },

    #[error("Token resolution failed for {token}: {message}")]
    TokenResolution { token: String, message: String },

    #[error("Circular token resolution: {}", chain.join(" -> "))]
    CircularTokenResolution { chain: Vec<String> },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
