//! Resource declarations.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::path::ConstructPath;
use crate::resource_type::ResourceType;
use crate::tree::NodeId;
use crate::value::Value;

/// What happens to the physical resource when it leaves the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    /// Delete the resource. This is the platform default and is not emitted.
    #[default]
    Destroy,
    Retain,
    Snapshot,
}

impl RemovalPolicy {
    /// Value for `DeletionPolicy` / `UpdateReplacePolicy`, if one is emitted.
    pub fn policy_value(&self) -> Option<&'static str> {
        match self {
            RemovalPolicy::Destroy => None,
            RemovalPolicy::Retain => Some("Retain"),
            RemovalPolicy::Snapshot => Some("Snapshot"),
        }
    }
}

/// A named, typed bag of properties owned by exactly one construct node.
#[derive(Debug, Clone)]
pub struct ResourceDeclaration {
    name: String,
    path: ConstructPath,
    node: NodeId,
    resource_type: Arc<dyn ResourceType>,
    properties: BTreeMap<String, Value>,
    dependencies: BTreeSet<ConstructPath>,
    removal_policy: RemovalPolicy,
    logical_id_override: Option<String>,
    condition: Option<String>,
    metadata: BTreeMap<String, Value>,
    private: bool,
}

impl ResourceDeclaration {
    pub(crate) fn new(
        name: impl Into<String>,
        path: ConstructPath,
        node: NodeId,
        resource_type: Arc<dyn ResourceType>,
    ) -> Self {
        Self {
            name: name.into(),
            path,
            node,
            resource_type,
            properties: BTreeMap::new(),
            dependencies: BTreeSet::new(),
            removal_policy: RemovalPolicy::default(),
            logical_id_override: None,
            condition: None,
            metadata: BTreeMap::new(),
            private: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address of the declaration: the owning node's path plus its name.
    pub fn path(&self) -> &ConstructPath {
        &self.path
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn resource_type(&self) -> &Arc<dyn ResourceType> {
        &self.resource_type
    }

    pub fn type_name(&self) -> &str {
        self.resource_type.type_name()
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn remove_property(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    /// Set a nested property through a dotted path such as `Tags.Name`.
    ///
    /// Intermediate maps are created as needed.
    pub fn add_property_override(&mut self, path: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        match path.split_once('.') {
            None => {
                self.properties.insert(path.to_string(), value);
            }
            Some((head, rest)) => {
                self.properties
                    .entry(head.to_string())
                    .or_default()
                    .set_path(rest, value);
            }
        }
        self
    }

    /// Explicit dependencies on other declarations.
    pub fn dependencies(&self) -> &BTreeSet<ConstructPath> {
        &self.dependencies
    }

    pub fn add_dependency(&mut self, target: ConstructPath) -> &mut Self {
        self.dependencies.insert(target);
        self
    }

    pub fn removal_policy(&self) -> RemovalPolicy {
        self.removal_policy
    }

    pub fn set_removal_policy(&mut self, policy: RemovalPolicy) -> &mut Self {
        self.removal_policy = policy;
        self
    }

    /// Replace the generated logical ID.
    pub fn override_logical_id(&mut self, logical_id: impl Into<String>) -> &mut Self {
        self.logical_id_override = Some(logical_id.into());
        self
    }

    pub fn logical_id_override(&self) -> Option<&str> {
        self.logical_id_override.as_deref()
    }

    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    pub fn set_condition(&mut self, condition: impl Into<String>) -> &mut Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Private declarations may only be referenced from inside the subtree
    /// of the node that owns them.
    pub fn is_private(&self) -> bool {
        self.private
    }

    pub fn set_private(&mut self, private: bool) -> &mut Self {
        self.private = private;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_type::GenericResourceType;

    fn declaration() -> ResourceDeclaration {
        ResourceDeclaration::new(
            "Resource",
            ConstructPath::parse("/Bucket/Resource"),
            NodeId::new(1),
            Arc::new(GenericResourceType::new("AWS::S3::Bucket")),
        )
    }

    #[test]
    fn test_property_override_creates_nested_maps() {
        let mut decl = declaration();
        decl.set_property("BucketName", "logs")
            .add_property_override("VersioningConfiguration.Status", "Enabled")
            .add_property_override("BucketName", "archive");

        assert_eq!(decl.property("BucketName"), Some(&Value::from("archive")));
        let versioning = decl.property("VersioningConfiguration").unwrap();
        assert_eq!(
            versioning.as_map().unwrap().get("Status"),
            Some(&Value::from("Enabled"))
        );
    }

    #[test]
    fn test_dependencies_collapse() {
        let mut decl = declaration();
        decl.add_dependency(ConstructPath::parse("/Role/Resource"))
            .add_dependency(ConstructPath::parse("/Role/Resource"));
        assert_eq!(decl.dependencies().len(), 1);
    }

    #[test]
    fn test_removal_policy_values() {
        assert_eq!(RemovalPolicy::Destroy.policy_value(), None);
        assert_eq!(RemovalPolicy::Retain.policy_value(), Some("Retain"));
        assert_eq!(RemovalPolicy::Snapshot.policy_value(), Some("Snapshot"));
    }
}
