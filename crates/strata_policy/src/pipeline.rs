//! Validation pipeline.

use strata_core::Stack;
use strata_graph::{DependencyGraph, LogicalIdRegistry};
use tracing::{debug, info, warn};

use crate::checks::{standard_checks, ValidationCheck, ValidationInput};
use crate::config::ValidationConfig;
use crate::report::ValidationReport;

/// Runs every enabled check over a stack and aggregates the findings.
pub struct ValidationPipeline {
    config: ValidationConfig,
    checks: Vec<Box<dyn ValidationCheck>>,
}

impl ValidationPipeline {
    /// A pipeline with no checks.
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            config,
            checks: Vec::new(),
        }
    }

    /// A pipeline with the built-in checks.
    pub fn standard(config: ValidationConfig) -> Self {
        Self {
            config,
            checks: standard_checks(),
        }
    }

    pub fn with_check(mut self, check: Box<dyn ValidationCheck>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Names of the checks that will run.
    pub fn check_names(&self) -> Vec<&str> {
        self.checks
            .iter()
            .map(|check| check.name())
            .filter(|name| self.config.is_enabled(name))
            .collect()
    }

    /// Run every enabled check to completion.
    pub fn validate(&self, stack: &Stack, graph: &DependencyGraph) -> ValidationReport {
        let logical_ids = LogicalIdRegistry::assign(stack);
        let input = ValidationInput {
            stack,
            graph,
            logical_ids: &logical_ids,
            config: &self.config,
        };

        let mut report = ValidationReport::new(stack.name());
        for check in &self.checks {
            if !self.config.is_enabled(check.name()) {
                debug!(check = check.name(), "Skipping disabled check");
                continue;
            }
            let mut violations = Vec::new();
            check.run(&input, &mut violations);
            debug!(check = check.name(), found = violations.len(), "Check complete");
            report.record_check(check.name());
            for violation in violations {
                report.add(violation);
            }
        }
        report.finalize();

        for violation in report.warnings() {
            warn!("{}", violation);
        }
        info!(
            stack = stack.name(),
            errors = report.summary.errors,
            warnings = report.summary.warnings,
            "Validation complete"
        );
        report
    }

    /// Build the dependency graph and validate.
    pub fn validate_stack(&self, stack: &Stack) -> ValidationReport {
        let graph = DependencyGraph::build(stack);
        self.validate(stack, &graph)
    }
}

impl Default for ValidationPipeline {
    fn default() -> Self {
        Self::standard(ValidationConfig::default())
    }
}
