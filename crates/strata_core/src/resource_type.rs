//! Resource-type capability interface.
//!
//! The core never branches on concrete type names. Everything it needs to
//! know about a kind of resource goes through [`ResourceType`].

use std::collections::BTreeSet;
use std::fmt;

use serde_json::{json, Map as JsonMap, Value as Json};

use crate::declaration::ResourceDeclaration;
use crate::path::ConstructPath;

/// A declaration whose properties have been fully resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDeclaration {
    pub path: ConstructPath,
    pub logical_id: String,
    pub type_name: String,
    pub properties: JsonMap<String, Json>,
}

/// A pluggable kind of resource.
pub trait ResourceType: Send + Sync {
    /// Platform type name, e.g. `AWS::EC2::VPC`.
    fn type_name(&self) -> &str;

    /// Properties that must be present on every declaration of this type.
    fn required_properties(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Attribute names that `Fn::GetAtt` may target.
    ///
    /// An empty set means the type does not advertise its attributes and
    /// any name is accepted.
    fn attributes(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Type-specific semantic checks. Each returned string is one problem.
    fn validate(&self, _declaration: &ResourceDeclaration) -> Vec<String> {
        Vec::new()
    }

    /// Serialize a resolved declaration into its template fragment.
    fn serialize(&self, declaration: &ResolvedDeclaration) -> Result<Json, String> {
        Ok(default_fragment(self.type_name(), &declaration.properties))
    }
}

impl fmt::Debug for dyn ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceType({})", self.type_name())
    }
}

/// `{"Type": ..., "Properties": {...}}`, without `Properties` when empty.
pub fn default_fragment(type_name: &str, properties: &JsonMap<String, Json>) -> Json {
    if properties.is_empty() {
        json!({ "Type": type_name })
    } else {
        json!({ "Type": type_name, "Properties": properties })
    }
}

/// Passthrough type with no required properties or checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericResourceType {
    type_name: String,
}

impl GenericResourceType {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
        }
    }
}

impl ResourceType for GenericResourceType {
    fn type_name(&self) -> &str {
        &self.type_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fragment_omits_empty_properties() {
        let generic = GenericResourceType::new("Custom::Thing");
        let mut resolved = ResolvedDeclaration {
            path: ConstructPath::parse("/Thing/Resource"),
            logical_id: "Thing".to_string(),
            type_name: "Custom::Thing".to_string(),
            properties: JsonMap::new(),
        };
        assert_eq!(
            generic.serialize(&resolved).unwrap(),
            json!({ "Type": "Custom::Thing" })
        );

        resolved
            .properties
            .insert("Size".to_string(), json!(3));
        assert_eq!(
            generic.serialize(&resolved).unwrap(),
            json!({ "Type": "Custom::Thing", "Properties": { "Size": 3 } })
        );
    }
}
