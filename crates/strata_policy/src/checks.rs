//! Built-in validation checks.
//!
//! Each check appends every problem it finds; none of them stops at the
//! first one.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use strata_core::{ConstructPath, Stack};
use strata_graph::{DependencyGraph, GraphError, GraphResult, LogicalIdRegistry, ReferenceTarget};

use crate::config::ValidationConfig;
use crate::violation::{Violation, ViolationKind};

static SECTION_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{1,255}$").expect("valid section name pattern"));

/// Everything a check may look at.
pub struct ValidationInput<'a> {
    pub stack: &'a Stack,
    pub graph: &'a DependencyGraph,
    pub logical_ids: &'a GraphResult<LogicalIdRegistry>,
    pub config: &'a ValidationConfig,
}

/// A single validation check.
pub trait ValidationCheck: Send + Sync {
    /// Stable identifier, used in reports and to disable the check.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn run(&self, input: &ValidationInput<'_>, violations: &mut Vec<Violation>);
}

/// The checks run by the standard pipeline, in order.
pub fn standard_checks() -> Vec<Box<dyn ValidationCheck>> {
    vec![
        Box::new(RequiredPropertiesCheck),
        Box::new(ResourceTypeCheck),
        Box::new(CyclicDependencyCheck),
        Box::new(LogicalIdCheck),
        Box::new(DanglingReferenceCheck),
        Box::new(UnknownMarkerCheck),
        Box::new(AttributeNameCheck),
        Box::new(SectionReferenceCheck),
        Box::new(ReferenceScopeCheck),
        Box::new(SectionNameCheck),
    ]
}

/// Required properties declared by each resource type are present.
pub struct RequiredPropertiesCheck;

impl ValidationCheck for RequiredPropertiesCheck {
    fn name(&self) -> &str {
        "required-properties"
    }

    fn description(&self) -> &str {
        "Every required property of a resource type is set"
    }

    fn run(&self, input: &ValidationInput<'_>, violations: &mut Vec<Violation>) {
        for declaration in input.stack.tree().declarations() {
            for required in declaration.resource_type().required_properties() {
                let present = declaration
                    .property(&required)
                    .is_some_and(|value| !value.is_null());
                if !present {
                    violations.push(Violation::error(
                        self.name(),
                        ViolationKind::RequiredPropertyMissing,
                        declaration.path().clone(),
                        format!(
                            "Missing required property '{}' for {}",
                            required,
                            declaration.type_name()
                        ),
                    ));
                }
            }
        }
    }
}

/// Type-specific semantic checks.
pub struct ResourceTypeCheck;

impl ValidationCheck for ResourceTypeCheck {
    fn name(&self) -> &str {
        "resource-types"
    }

    fn description(&self) -> &str {
        "Resource types accept the values they were given"
    }

    fn run(&self, input: &ValidationInput<'_>, violations: &mut Vec<Violation>) {
        for declaration in input.stack.tree().declarations() {
            for message in declaration.resource_type().validate(declaration) {
                violations.push(Violation::error(
                    self.name(),
                    ViolationKind::InvalidProperty,
                    declaration.path().clone(),
                    message,
                ));
            }
        }
    }
}

/// The dependency graph has a topological order.
pub struct CyclicDependencyCheck;

impl ValidationCheck for CyclicDependencyCheck {
    fn name(&self) -> &str {
        "cyclic-dependencies"
    }

    fn description(&self) -> &str {
        "Resource dependencies do not form a cycle"
    }

    fn run(&self, input: &ValidationInput<'_>, violations: &mut Vec<Violation>) {
        if let Err(err) = input.graph.topological_order() {
            let path = err.cycle.first().cloned().unwrap_or_default();
            violations.push(
                Violation::error(
                    self.name(),
                    ViolationKind::CyclicDependency,
                    path,
                    format!(
                        "Cyclic dependency between {} declaration(s): {}",
                        err.len(),
                        err.describe()
                    ),
                )
                .with_cycle(err.cycle),
            );
        }
    }
}

/// Logical IDs could be assigned without collisions.
pub struct LogicalIdCheck;

impl ValidationCheck for LogicalIdCheck {
    fn name(&self) -> &str {
        "logical-ids"
    }

    fn description(&self) -> &str {
        "Every declaration has a distinct logical ID"
    }

    fn run(&self, input: &ValidationInput<'_>, violations: &mut Vec<Violation>) {
        let Err(err) = input.logical_ids else {
            return;
        };
        let path = match err {
            GraphError::LogicalIdCollision { paths, .. } => paths
                .last()
                .map(|p| ConstructPath::parse(p))
                .unwrap_or_default(),
            _ => ConstructPath::root(),
        };
        violations.push(Violation::error(
            self.name(),
            ViolationKind::LogicalIdCollision,
            path,
            err.to_string(),
        ));
    }
}

/// References to declarations that are not part of the stack.
pub struct DanglingReferenceCheck;

impl ValidationCheck for DanglingReferenceCheck {
    fn name(&self) -> &str {
        "dangling-references"
    }

    fn description(&self) -> &str {
        "References point at declarations of this stack"
    }

    fn run(&self, input: &ValidationInput<'_>, violations: &mut Vec<Violation>) {
        for dangling in input.graph.dangling() {
            let via = match &dangling.token {
                Some(token) => format!("token {}", token),
                None => "explicit dependency".to_string(),
            };
            violations.push(Violation::new(
                self.name(),
                ViolationKind::DanglingReference,
                input.config.dangling_references,
                dangling.source.path(),
                format!(
                    "{} references {} through {}, which is not declared in this stack",
                    dangling.source, dangling.target, via
                ),
            ));
        }
    }
}

/// String markers that no token of this stack produced.
pub struct UnknownMarkerCheck;

impl ValidationCheck for UnknownMarkerCheck {
    fn name(&self) -> &str {
        "unknown-markers"
    }

    fn description(&self) -> &str {
        "Embedded token markers belong to this stack"
    }

    fn run(&self, input: &ValidationInput<'_>, violations: &mut Vec<Violation>) {
        for unknown in input.graph.unknown_markers() {
            violations.push(Violation::error(
                self.name(),
                ViolationKind::UnknownMarker,
                unknown.source.path(),
                format!(
                    "{} embeds {}, which was not created by this stack",
                    unknown.source, unknown.marker
                ),
            ));
        }
    }
}

/// Attribute references name an attribute the target type provides.
pub struct AttributeNameCheck;

impl ValidationCheck for AttributeNameCheck {
    fn name(&self) -> &str {
        "attribute-names"
    }

    fn description(&self) -> &str {
        "Attribute references use attributes the target advertises"
    }

    fn run(&self, input: &ValidationInput<'_>, violations: &mut Vec<Violation>) {
        for reference in input.graph.references() {
            let ReferenceTarget::Declaration {
                target,
                attribute: Some(attribute),
            } = &reference.target
            else {
                continue;
            };
            let Some(declaration) = input.stack.tree().declaration(target) else {
                continue;
            };
            let attributes = declaration.resource_type().attributes();
            if !attributes.is_empty() && !attributes.contains(attribute) {
                violations.push(Violation::error(
                    self.name(),
                    ViolationKind::UnknownAttribute,
                    reference.source.path(),
                    format!(
                        "{} has no attribute '{}' (available: {})",
                        declaration.type_name(),
                        attribute,
                        attributes.into_iter().collect::<Vec<_>>().join(", ")
                    ),
                ));
            }
        }
    }
}

/// Parameter and mapping references name entries that exist.
pub struct SectionReferenceCheck;

impl ValidationCheck for SectionReferenceCheck {
    fn name(&self) -> &str {
        "section-references"
    }

    fn description(&self) -> &str {
        "Referenced parameters and mappings are declared"
    }

    fn run(&self, input: &ValidationInput<'_>, violations: &mut Vec<Violation>) {
        for reference in input.graph.references() {
            match &reference.target {
                ReferenceTarget::Parameter { name } if !input.stack.parameters().contains_key(name) => {
                    violations.push(Violation::error(
                        self.name(),
                        ViolationKind::UnknownParameter,
                        reference.source.path(),
                        format!("{} references unknown parameter '{}'", reference.source, name),
                    ));
                }
                ReferenceTarget::Mapping { name } if !input.stack.mappings().contains_key(name) => {
                    violations.push(Violation::error(
                        self.name(),
                        ViolationKind::UnknownMapping,
                        reference.source.path(),
                        format!("{} references unknown mapping '{}'", reference.source, name),
                    ));
                }
                _ => {}
            }
        }
    }
}

/// Private declarations are only referenced from inside their construct.
pub struct ReferenceScopeCheck;

impl ValidationCheck for ReferenceScopeCheck {
    fn name(&self) -> &str {
        "reference-scope"
    }

    fn description(&self) -> &str {
        "Private declarations are not referenced from outside their construct"
    }

    fn run(&self, input: &ValidationInput<'_>, violations: &mut Vec<Violation>) {
        for reference in input.graph.references() {
            let ReferenceTarget::Declaration { target, .. } = &reference.target else {
                continue;
            };
            let Some(declaration) = input.stack.tree().declaration(target) else {
                continue;
            };
            if !declaration.is_private() {
                continue;
            }
            let owner = target.parent().unwrap_or_default();
            let source = reference.source.path();
            if !source.starts_with(&owner) {
                violations.push(Violation::error(
                    self.name(),
                    ViolationKind::ScopeViolation,
                    source,
                    format!(
                        "{} references {}, which is private to {}",
                        reference.source, target, owner
                    ),
                ));
            }
        }
    }
}

/// Parameter, mapping and output names are valid and unique, also with
/// respect to resource logical IDs.
pub struct SectionNameCheck;

impl ValidationCheck for SectionNameCheck {
    fn name(&self) -> &str {
        "section-names"
    }

    fn description(&self) -> &str {
        "Section entry names are alphanumeric and do not clash"
    }

    fn run(&self, input: &ValidationInput<'_>, violations: &mut Vec<Violation>) {
        let stack = input.stack;
        let mut owners: BTreeMap<&str, Vec<String>> = BTreeMap::new();

        let sections = [
            ("parameter", stack.parameters().keys().collect::<Vec<_>>()),
            ("mapping", stack.mappings().keys().collect()),
            ("output", stack.outputs().keys().collect()),
        ];
        for (section, names) in sections {
            for name in names {
                if !SECTION_NAME_RE.is_match(name) {
                    violations.push(Violation::error(
                        self.name(),
                        ViolationKind::InvalidSectionName,
                        ConstructPath::root(),
                        format!(
                            "Invalid {} name '{}': names must be 1-255 alphanumeric characters",
                            section, name
                        ),
                    ));
                }
                owners.entry(name.as_str()).or_default().push(section.to_string());
            }
        }

        if let Ok(ids) = input.logical_ids {
            for (path, id) in ids.iter() {
                if let Some(entry) = owners.get_mut(id) {
                    entry.push(format!("resource {}", path));
                }
            }
        }

        for (name, owners) in owners {
            if owners.len() > 1 {
                violations.push(Violation::error(
                    self.name(),
                    ViolationKind::NameClash,
                    ConstructPath::root(),
                    format!("Name '{}' is used by more than one entry: {}", name, owners.join(", ")),
                ));
            }
        }
    }
}
