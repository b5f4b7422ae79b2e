//! Error types for resources and app definitions.

use std::path::PathBuf;

use strata_core::CoreError;
use thiserror::Error;

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Errors raised while building constructs or loading definitions.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Invalid options for {construct}: {message}")]
    InvalidOptions { construct: String, message: String },

    #[error("Invalid CIDR block '{0}'")]
    InvalidCidr(String),

    #[error("CIDR block {block} cannot hold {requested} more subnet(s) of /{prefix}")]
    CidrExhausted {
        block: String,
        prefix: u8,
        requested: usize,
    },

    #[error("Cannot add VPN connection '{connection}': {vpc} has no VPN gateway")]
    VpnGatewayRequired { vpc: String, connection: String },

    #[error("Construct '{0}' is not defined")]
    UnknownConstruct(String),

    #[error("Invalid definition {path:?}: {message}")]
    InvalidDefinition { path: PathBuf, message: String },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ResourceError {
    pub(crate) fn invalid(construct: impl Into<String>, message: impl Into<String>) -> Self {
        ResourceError::InvalidOptions {
            construct: construct.into(),
            message: message.into(),
        }
    }
}
