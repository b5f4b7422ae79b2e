//! Validation findings.

use serde::{Deserialize, Serialize};
use strata_core::ConstructPath;

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Reported, does not block emission.
    #[default]
    Warning,
    /// Blocks emission.
    Error,
}

impl Severity {
    pub fn blocks(&self) -> bool {
        matches!(self, Severity::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// Category of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    RequiredPropertyMissing,
    InvalidProperty,
    CyclicDependency,
    LogicalIdCollision,
    DanglingReference,
    UnknownMarker,
    UnknownAttribute,
    UnknownParameter,
    UnknownMapping,
    ScopeViolation,
    InvalidSectionName,
    NameClash,
}

/// One problem found by a check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Name of the check that produced it
    pub check: String,
    pub kind: ViolationKind,
    pub severity: Severity,
    /// Construct path the finding is attached to
    pub path: ConstructPath,
    pub message: String,
    /// Closed cycle for cyclic dependencies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle: Option<Vec<ConstructPath>>,
}

impl Violation {
    pub fn new(
        check: impl Into<String>,
        kind: ViolationKind,
        severity: Severity,
        path: ConstructPath,
        message: impl Into<String>,
    ) -> Self {
        Self {
            check: check.into(),
            kind,
            severity,
            path,
            message: message.into(),
            cycle: None,
        }
    }

    pub fn error(
        check: impl Into<String>,
        kind: ViolationKind,
        path: ConstructPath,
        message: impl Into<String>,
    ) -> Self {
        Self::new(check, kind, Severity::Error, path, message)
    }

    pub fn with_cycle(mut self, cycle: Vec<ConstructPath>) -> Self {
        self.cycle = Some(cycle);
        self
    }

    pub fn blocks(&self) -> bool {
        self.severity.blocks()
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.path, self.message)
    }
}
