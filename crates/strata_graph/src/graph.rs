//! Dependency graph builder.
//!
//! Nodes are resource declarations, keyed by address. An edge `A -> B` means
//! A depends on B, so B must be emitted first. Edges come from explicit
//! dependencies, construct-level dependencies, and reference/attribute
//! tokens found anywhere in A's properties.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use strata_core::{ConstructPath, Stack, Token, TokenKind, TokenRegistry, Value};
use tracing::{debug, info};

use crate::order::{self, CycleError};

/// Why an edge exists. Both flags may be set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EdgeKind {
    pub explicit: bool,
    pub inferred: bool,
}

/// Where a scanned reference was found.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceSource {
    Declaration { path: ConstructPath, property: String },
    Output { name: String },
}

impl ReferenceSource {
    /// Construct path used for diagnostics. Outputs report the root.
    pub fn path(&self) -> ConstructPath {
        match self {
            ReferenceSource::Declaration { path, .. } => path.clone(),
            ReferenceSource::Output { .. } => ConstructPath::root(),
        }
    }
}

impl std::fmt::Display for ReferenceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceSource::Declaration { path, property } => write!(f, "{} ({})", path, property),
            ReferenceSource::Output { name } => write!(f, "output {}", name),
        }
    }
}

/// What a scanned token points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceTarget {
    Declaration {
        target: ConstructPath,
        attribute: Option<String>,
    },
    Parameter { name: String },
    Mapping { name: String },
}

/// A token found while scanning, with its origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannedReference {
    pub source: ReferenceSource,
    pub token: String,
    pub target: ReferenceTarget,
}

/// A reference whose target declaration does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingReference {
    pub source: ReferenceSource,
    pub target: ConstructPath,
    /// Token display name, or `None` for explicit dependencies.
    pub token: Option<String>,
}

/// A string marker that no token of the session produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnknownMarker {
    pub source: ReferenceSource,
    pub marker: String,
}

/// Directed graph over resource declarations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DependencyGraph {
    nodes: BTreeSet<ConstructPath>,
    edges: BTreeMap<ConstructPath, BTreeMap<ConstructPath, EdgeKind>>,
    references: Vec<ScannedReference>,
    dangling: Vec<DanglingReference>,
    unknown_markers: Vec<UnknownMarker>,
}

impl DependencyGraph {
    /// An empty graph over the given declarations.
    pub fn with_nodes<I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = ConstructPath>,
    {
        Self {
            nodes: nodes.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Scan every declaration of `stack` and build its dependency graph.
    ///
    /// Never fails: dangling references and unknown markers are recorded
    /// for validation to report.
    pub fn build(stack: &Stack) -> Self {
        let tree = stack.tree();
        let tokens = stack.tokens();
        let mut graph = Self::with_nodes(tree.declarations().map(|d| d.path().clone()));

        for declaration in tree.declarations() {
            let path = declaration.path();
            for (property, value) in declaration.properties() {
                let source = ReferenceSource::Declaration {
                    path: path.clone(),
                    property: property.clone(),
                };
                graph.scan(tokens, &source, value, Some(path));
            }
            for (key, value) in declaration.metadata() {
                let source = ReferenceSource::Declaration {
                    path: path.clone(),
                    property: format!("Metadata.{}", key),
                };
                graph.scan(tokens, &source, value, Some(path));
            }

            for target in declaration.dependencies() {
                if graph.nodes.contains(target) {
                    graph.add_edge(path.clone(), target.clone(), true);
                } else {
                    graph.dangling.push(DanglingReference {
                        source: ReferenceSource::Declaration {
                            path: path.clone(),
                            property: "DependsOn".to_string(),
                        },
                        target: target.clone(),
                        token: None,
                    });
                }
            }
        }

        for (from, to) in tree.node_dependencies() {
            let sources = tree.subtree_declarations(from);
            let targets = tree.subtree_declarations(to);
            for source in &sources {
                for target in &targets {
                    if source != target {
                        graph.add_edge(source.clone(), target.clone(), true);
                    }
                }
            }
        }

        for (name, output) in stack.outputs() {
            let source = ReferenceSource::Output { name: name.clone() };
            graph.scan(tokens, &source, &output.value, None);
            if let Some(export_name) = &output.export_name {
                graph.scan(tokens, &source, export_name, None);
            }
        }

        info!(
            declarations = graph.nodes.len(),
            edges = graph.edge_count(),
            dangling = graph.dangling.len(),
            "Built dependency graph"
        );
        graph
    }

    fn scan(
        &mut self,
        tokens: &TokenRegistry,
        source: &ReferenceSource,
        value: &Value,
        from: Option<&ConstructPath>,
    ) {
        let scan = value.scan_tokens(tokens);
        for token in &scan.tokens {
            self.record(source, token, from);
        }
        for marker in scan.unknown_markers {
            self.unknown_markers.push(UnknownMarker {
                source: source.clone(),
                marker,
            });
        }
    }

    fn record(&mut self, source: &ReferenceSource, token: &Token, from: Option<&ConstructPath>) {
        let target = match token.kind() {
            TokenKind::Reference { target } => ReferenceTarget::Declaration {
                target: target.clone(),
                attribute: None,
            },
            TokenKind::Attribute { target, attribute } => ReferenceTarget::Declaration {
                target: target.clone(),
                attribute: Some(attribute.clone()),
            },
            TokenKind::Parameter { name } => ReferenceTarget::Parameter { name: name.clone() },
            TokenKind::FindInMap { mapping, .. } => ReferenceTarget::Mapping {
                name: mapping.clone(),
            },
            TokenKind::Pseudo(_) | TokenKind::Lazy(_) => return,
        };

        if let ReferenceTarget::Declaration { target, .. } = &target {
            if !self.nodes.contains(target) {
                debug!(source = %source, target = %target, "Dangling reference");
                self.dangling.push(DanglingReference {
                    source: source.clone(),
                    target: target.clone(),
                    token: Some(token.display_name()),
                });
            } else if let Some(from) = from {
                self.add_edge(from.clone(), target.clone(), false);
            }
        }

        self.references.push(ScannedReference {
            source: source.clone(),
            token: token.display_name(),
            target,
        });
    }

    /// Add `from -> to`. Repeated edges collapse into one.
    pub fn add_edge(&mut self, from: ConstructPath, to: ConstructPath, explicit: bool) {
        let kind = self.edges.entry(from).or_default().entry(to).or_default();
        if explicit {
            kind.explicit = true;
        } else {
            kind.inferred = true;
        }
    }

    pub fn nodes(&self) -> &BTreeSet<ConstructPath> {
        &self.nodes
    }

    pub fn contains(&self, path: &ConstructPath) -> bool {
        self.nodes.contains(path)
    }

    /// All edges in sorted order.
    pub fn edges(&self) -> impl Iterator<Item = (&ConstructPath, &ConstructPath, EdgeKind)> {
        self.edges
            .iter()
            .flat_map(|(from, targets)| targets.iter().map(move |(to, kind)| (from, to, *kind)))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeMap::len).sum()
    }

    pub fn has_edge(&self, from: &ConstructPath, to: &ConstructPath) -> bool {
        self.edge(from, to).is_some()
    }

    pub fn edge(&self, from: &ConstructPath, to: &ConstructPath) -> Option<EdgeKind> {
        self.edges.get(from)?.get(to).copied()
    }

    /// Declarations `path` depends on, sorted.
    pub fn dependencies_of(&self, path: &ConstructPath) -> Vec<&ConstructPath> {
        self.edges
            .get(path)
            .map(|targets| targets.keys().collect())
            .unwrap_or_default()
    }

    /// Declarations `path` explicitly depends on, sorted.
    pub fn explicit_dependencies_of(&self, path: &ConstructPath) -> Vec<&ConstructPath> {
        self.edges
            .get(path)
            .map(|targets| {
                targets
                    .iter()
                    .filter(|(_, kind)| kind.explicit)
                    .map(|(to, _)| to)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn references(&self) -> &[ScannedReference] {
        &self.references
    }

    pub fn dangling(&self) -> &[DanglingReference] {
        &self.dangling
    }

    pub fn unknown_markers(&self) -> &[UnknownMarker] {
        &self.unknown_markers
    }

    /// Emission order, or the shortest cycle if there is none.
    pub fn topological_order(&self) -> Result<Vec<ConstructPath>, CycleError> {
        order::topological_order(self)
    }

    pub(crate) fn successors(&self, path: &ConstructPath) -> impl Iterator<Item = &ConstructPath> {
        self.edges.get(path).into_iter().flat_map(|targets| targets.keys())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use strata_core::{GenericResourceType, Output, PseudoParameter, ResourceType};

    use super::*;

    fn generic() -> Arc<dyn ResourceType> {
        Arc::new(GenericResourceType::new("Custom::Thing"))
    }

    fn path(s: &str) -> ConstructPath {
        ConstructPath::parse(s)
    }

    #[test]
    fn test_inferred_and_explicit_edges() {
        let mut stack = Stack::new("app");
        let mut scope = stack.scope();
        let a = scope.declare("A", generic(), Vec::<(String, Value)>::new()).unwrap();
        let b = scope.declare("B", generic(), Vec::<(String, Value)>::new()).unwrap();

        let a_ref = stack.reference(&a);
        let a_arn = stack.attribute(&a, "Arn");
        let marker = stack.token_as_string(&a_arn);
        stack
            .declaration_mut(&b)
            .unwrap()
            .set_property("Target", &a_ref)
            .set_property("Policy", format!("allow {}", marker))
            .add_dependency(a.clone());

        let graph = DependencyGraph::build(&stack);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(
            graph.edge(&b, &a),
            Some(EdgeKind {
                explicit: true,
                inferred: true
            })
        );
        assert_eq!(graph.references().len(), 2);
        assert!(graph.dangling().is_empty());
    }

    #[test]
    fn test_metadata_is_scanned() {
        let mut stack = Stack::new("app");
        let mut scope = stack.scope();
        let a = scope.declare("A", generic(), Vec::<(String, Value)>::new()).unwrap();
        let b = scope.declare("B", generic(), Vec::<(String, Value)>::new()).unwrap();

        let a_ref = stack.reference(&a);
        let ghost = stack.reference(&path("/Ghost/Resource"));
        stack
            .declaration_mut(&b)
            .unwrap()
            .add_metadata("Peer", &a_ref)
            .add_metadata("Remote", ghost)
            .add_metadata("Note", "see ${Token[Stray.999]}");

        let graph = DependencyGraph::build(&stack);
        assert_eq!(
            graph.edge(&b, &a),
            Some(EdgeKind {
                explicit: false,
                inferred: true
            })
        );
        assert_eq!(graph.dangling().len(), 1);
        assert_eq!(graph.dangling()[0].source.to_string(), "/B (Metadata.Remote)");
        assert_eq!(graph.unknown_markers().len(), 1);
    }

    #[test]
    fn test_dangling_references_are_recorded() {
        let mut stack = Stack::new("app");
        let a = stack
            .scope()
            .declare("A", generic(), Vec::<(String, Value)>::new())
            .unwrap();
        let ghost = stack.reference(&path("/Ghost/Resource"));
        stack
            .declaration_mut(&a)
            .unwrap()
            .set_property("Target", ghost)
            .add_dependency(path("/Other"));

        let graph = DependencyGraph::build(&stack);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.dangling().len(), 2);
        assert!(graph.dangling().iter().any(|d| d.token.is_none()));
    }

    #[test]
    fn test_node_dependencies_expand_over_subtrees() {
        let mut stack = Stack::new("app");
        let mut scope = stack.scope();
        let mut db = scope.child("Db").unwrap();
        db.declare("Instance", generic(), Vec::<(String, Value)>::new()).unwrap();
        db.declare("SubnetGroup", generic(), Vec::<(String, Value)>::new()).unwrap();
        let db_node = db.node();
        let mut app = scope.child("App").unwrap();
        app.declare("Service", generic(), Vec::<(String, Value)>::new()).unwrap();
        app.depend_on(db_node).unwrap();

        let graph = DependencyGraph::build(&stack);
        assert!(graph.has_edge(&path("/App/Service"), &path("/Db/Instance")));
        assert!(graph.has_edge(&path("/App/Service"), &path("/Db/SubnetGroup")));
        assert_eq!(graph.explicit_dependencies_of(&path("/App/Service")).len(), 2);
    }

    #[test]
    fn test_outputs_are_scanned_without_edges() {
        let mut stack = Stack::new("app");
        let a = stack
            .scope()
            .declare("A", generic(), Vec::<(String, Value)>::new())
            .unwrap();
        let a_ref = stack.reference(&a);
        let region = stack.pseudo(PseudoParameter::Region);
        stack.add_output("AId", Output::new(a_ref)).unwrap();
        stack.add_output("Region", Output::new(region)).unwrap();

        let graph = DependencyGraph::build(&stack);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.references().len(), 1);
        assert_eq!(
            graph.references()[0].source,
            ReferenceSource::Output {
                name: "AId".to_string()
            }
        );
    }
}
