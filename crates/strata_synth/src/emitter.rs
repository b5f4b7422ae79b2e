//! Topological emitter.
//!
//! Turns declarations into template fragments in dependency order. The
//! order comes from the graph, the identifiers from the logical ID
//! registry, and the fragment body from each declaration's resource type.

use std::collections::BTreeMap;

use serde_json::{json, Map as JsonMap, Value as Json};
use strata_core::{
    ConstructPath, CoreError, LogicalIdLookup, ResolveContext, ResolvedDeclaration,
    ResourceDeclaration, Stack, DEFAULT_MAX_TOKEN_DEPTH,
};
use strata_graph::{DependencyGraph, GraphError, LogicalIdRegistry};
use tracing::debug;

use crate::error::{SynthError, SynthResult};

/// Metadata key carrying a resource's construct path.
pub const PATH_METADATA_KEY: &str = "strata:path";

/// Logical IDs used while resolving tokens during emission.
///
/// Dangling targets are not part of the stack, so they resolve to an
/// external ID that no declaration of the stack uses and are expected to
/// exist at deploy time.
pub struct EmissionIds<'a> {
    registry: &'a LogicalIdRegistry,
    external: BTreeMap<ConstructPath, String>,
}

impl<'a> EmissionIds<'a> {
    pub fn new(registry: &'a LogicalIdRegistry, graph: &DependencyGraph) -> SynthResult<Self> {
        let external =
            registry.external_ids(graph.dangling().iter().map(|dangling| &dangling.target))?;
        Ok(Self { registry, external })
    }

    /// The external ID given to a target outside the stack.
    pub fn external_id(&self, path: &ConstructPath) -> Option<&str> {
        self.external.get(path).map(String::as_str)
    }
}

impl LogicalIdLookup for EmissionIds<'_> {
    fn logical_id(&self, path: &ConstructPath) -> Option<&str> {
        self.registry
            .get(path)
            .or_else(|| self.external.get(path).map(String::as_str))
    }
}

/// One serialized declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedResource {
    pub logical_id: String,
    pub path: ConstructPath,
    pub fragment: Json,
}

/// Serializes the declarations of one stack.
pub struct Emitter<'a> {
    stack: &'a Stack,
    graph: &'a DependencyGraph,
    logical_ids: &'a LogicalIdRegistry,
    max_depth: usize,
    path_metadata: bool,
}

impl<'a> Emitter<'a> {
    pub fn new(
        stack: &'a Stack,
        graph: &'a DependencyGraph,
        logical_ids: &'a LogicalIdRegistry,
    ) -> Self {
        Self {
            stack,
            graph,
            logical_ids,
            max_depth: DEFAULT_MAX_TOKEN_DEPTH,
            path_metadata: true,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_path_metadata(mut self, enabled: bool) -> Self {
        self.path_metadata = enabled;
        self
    }

    /// Emit every declaration, dependencies first.
    pub fn emit(&self) -> SynthResult<Vec<EmittedResource>> {
        let order = self
            .graph
            .topological_order()
            .map_err(GraphError::from)?;
        let ids = EmissionIds::new(self.logical_ids, self.graph)?;
        let context = self.stack.resolve_context(&ids).with_max_depth(self.max_depth);

        let mut emitted = Vec::with_capacity(order.len());
        for path in order {
            let declaration = self.stack.declaration(&path)?;
            let resource = self.emit_one(declaration, &context)?;
            debug!(
                path = %resource.path,
                logical_id = %resource.logical_id,
                "Emitted resource"
            );
            emitted.push(resource);
        }
        Ok(emitted)
    }

    fn emit_one(
        &self,
        declaration: &ResourceDeclaration,
        context: &ResolveContext<'_>,
    ) -> SynthResult<EmittedResource> {
        let path = declaration.path().clone();
        let logical_id = self.logical_id(&path)?;

        let mut properties = JsonMap::new();
        for (name, value) in declaration.properties() {
            if value.is_null() {
                continue;
            }
            properties.insert(name.clone(), context.resolve(value)?);
        }

        let resolved = ResolvedDeclaration {
            path: path.clone(),
            logical_id: logical_id.clone(),
            type_name: declaration.type_name().to_string(),
            properties,
        };
        let fragment = declaration
            .resource_type()
            .serialize(&resolved)
            .map_err(|message| SynthError::Serialization {
                logical_id: logical_id.clone(),
                message,
            })?;
        let Json::Object(mut fragment) = fragment else {
            return Err(SynthError::Serialization {
                logical_id,
                message: "resource type produced a non-object fragment".to_string(),
            });
        };

        let mut depends_on: Vec<String> = Vec::new();
        for target in self.graph.explicit_dependencies_of(&path) {
            depends_on.push(self.logical_id(target)?);
        }
        depends_on.sort();
        depends_on.dedup();
        if !depends_on.is_empty() {
            fragment.insert("DependsOn".to_string(), json!(depends_on));
        }

        if let Some(condition) = declaration.condition() {
            fragment.insert("Condition".to_string(), json!(condition));
        }

        if let Some(policy) = declaration.removal_policy().policy_value() {
            fragment.insert("DeletionPolicy".to_string(), json!(policy));
            fragment.insert("UpdateReplacePolicy".to_string(), json!(policy));
        }

        let mut metadata = JsonMap::new();
        for (key, value) in declaration.metadata() {
            metadata.insert(key.clone(), context.resolve(value)?);
        }
        if self.path_metadata {
            metadata.insert(
                PATH_METADATA_KEY.to_string(),
                json!(format!("{}{}", self.stack.name(), path)),
            );
        }
        if !metadata.is_empty() {
            fragment.insert("Metadata".to_string(), Json::Object(metadata));
        }

        Ok(EmittedResource {
            logical_id,
            path,
            fragment: Json::Object(fragment),
        })
    }

    fn logical_id(&self, path: &ConstructPath) -> SynthResult<String> {
        self.logical_ids
            .get(path)
            .map(str::to_string)
            .ok_or_else(|| CoreError::UnknownDeclaration(path.to_string()).into())
    }
}
