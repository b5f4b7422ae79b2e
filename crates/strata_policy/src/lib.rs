//! # strata_policy
//!
//! Validation pipeline for Strata stacks.
//!
//! Checks never stop at the first problem: every enabled check runs to
//! completion and the report aggregates all violations. Only
//! `error`-severity violations block emission.

pub mod checks;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod violation;

pub use checks::{
    standard_checks, AttributeNameCheck, CyclicDependencyCheck, DanglingReferenceCheck,
    LogicalIdCheck, ReferenceScopeCheck, RequiredPropertiesCheck, ResourceTypeCheck,
    SectionNameCheck, SectionReferenceCheck, UnknownMarkerCheck, ValidationCheck,
    ValidationInput,
};
pub use config::ValidationConfig;
pub use error::{PolicyError, PolicyResult};
pub use pipeline::ValidationPipeline;
pub use report::{ValidationReport, ValidationSummary};
pub use violation::{Severity, Violation, ViolationKind};
