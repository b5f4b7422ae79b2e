//! Validation configuration.

use serde::{Deserialize, Serialize};

use crate::violation::Severity;

/// Knobs for the standard validation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Severity of references to declarations that do not exist.
    pub dangling_references: Severity,
    /// Names of checks to skip.
    pub disabled_checks: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            dangling_references: Severity::Warning,
            disabled_checks: Vec::new(),
        }
    }
}

impl ValidationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dangling_references(mut self, severity: Severity) -> Self {
        self.dangling_references = severity;
        self
    }

    pub fn disable_check(mut self, name: impl Into<String>) -> Self {
        self.disabled_checks.push(name.into());
        self
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        !self.disabled_checks.iter().any(|disabled| disabled == name)
    }
}
