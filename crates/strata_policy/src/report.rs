//! Aggregated validation results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, PolicyResult};
use crate::violation::{Severity, Violation, ViolationKind};

/// Counts over a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub checks_run: usize,
    pub errors: usize,
    pub warnings: usize,
}

/// Every violation found for one stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub stack: String,
    pub violations: Vec<Violation>,
    pub checks_run: Vec<String>,
    pub summary: ValidationSummary,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ValidationReport {
    pub fn new(stack: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            stack: stack.into(),
            violations: Vec::new(),
            checks_run: Vec::new(),
            summary: ValidationSummary::default(),
            started_at: now,
            completed_at: now,
        }
    }

    pub fn add(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn record_check(&mut self, name: impl Into<String>) {
        self.checks_run.push(name.into());
    }

    /// Merge another report's findings into this one.
    pub fn merge(&mut self, other: ValidationReport) {
        self.violations.extend(other.violations);
        self.checks_run.extend(other.checks_run);
    }

    /// Stamp completion time and compute the summary.
    pub fn finalize(&mut self) {
        self.completed_at = Utc::now();
        self.summary = ValidationSummary {
            checks_run: self.checks_run.len(),
            errors: self.errors().len(),
            warnings: self.warnings().len(),
        };
    }

    /// No blocking violations.
    pub fn passed(&self) -> bool {
        !self.violations.iter().any(Violation::blocks)
    }

    pub fn errors(&self) -> Vec<&Violation> {
        self.violations.iter().filter(|v| v.blocks()).collect()
    }

    pub fn warnings(&self) -> Vec<&Violation> {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Warning)
            .collect()
    }

    pub fn of_kind(&self, kind: ViolationKind) -> Vec<&Violation> {
        self.violations.iter().filter(|v| v.kind == kind).collect()
    }

    /// Generate a human-readable report.
    pub fn report(&self) -> String {
        let mut report = String::new();

        report.push_str(&format!("Stack: {}\n", self.stack));
        report.push_str(&format!(
            "Status: {}\n",
            if self.passed() { "✅ PASSED" } else { "❌ FAILED" }
        ));
        report.push_str(&format!(
            "Checks: {}, errors: {}, warnings: {}\n",
            self.checks_run.len(),
            self.errors().len(),
            self.warnings().len()
        ));

        if !self.violations.is_empty() {
            report.push_str("\nViolations:\n");
            for violation in &self.violations {
                let status = if violation.blocks() { "❌" } else { "⚠️" };
                report.push_str(&format!(
                    "  {} {} [{}] {}\n",
                    status, violation.path, violation.check, violation.message
                ));
                if let Some(cycle) = &violation.cycle {
                    let cycle: Vec<String> = cycle.iter().map(ToString::to_string).collect();
                    report.push_str(&format!("      cycle: {}\n", cycle.join(" -> ")));
                }
            }
        }

        report
    }

    pub fn to_json(&self) -> PolicyResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// `Ok(self)` when nothing blocks, otherwise an error carrying the report.
    pub fn into_result(self) -> PolicyResult<Self> {
        if self.passed() {
            Ok(self)
        } else {
            Err(PolicyError::ValidationFailed {
                errors: self.errors().len(),
                report: self.report(),
            })
        }
    }
}
