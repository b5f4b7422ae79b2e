//! Stacks and construct scopes.
//!
//! A [`Stack`] is the root scope of one synthesis run. It owns the construct
//! tree, the token registry and the template sections, so that two stacks
//! never share identity counters.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::declaration::ResourceDeclaration;
use crate::error::{CoreError, CoreResult};
use crate::path::ConstructPath;
use crate::resolve::{LogicalIdLookup, ResolveContext};
use crate::resource_type::ResourceType;
use crate::token::{PseudoParameter, Token, TokenKind, TokenRegistry};
use crate::tree::{ConstructTree, NodeId};
use crate::value::Value;

/// Deployment target. Unknown fields are resolved at deploy time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Neither account nor region is known.
    pub fn is_agnostic(&self) -> bool {
        self.account.is_none() && self.region.is_none()
    }
}

/// A template parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    #[serde(rename = "Type")]
    pub param_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_echo: bool,
}

impl Parameter {
    pub fn new(param_type: impl Into<String>) -> Self {
        Self {
            param_type: param_type.into(),
            default: None,
            description: None,
            allowed_values: Vec::new(),
            no_echo: false,
        }
    }

    pub fn string() -> Self {
        Self::new("String")
    }

    pub fn with_default(mut self, default: impl Into<serde_json::Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_allowed_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<serde_json::Value>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_no_echo(mut self) -> Self {
        self.no_echo = true;
        self
    }
}

/// Two-level lookup table: top key, then second key.
pub type Mapping = BTreeMap<String, BTreeMap<String, serde_json::Value>>;

/// A template output. The value may contain tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub value: Value,
    pub description: Option<String>,
    pub export_name: Option<Value>,
    pub condition: Option<String>,
}

impl Output {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            description: None,
            export_name: None,
            condition: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_export_name(mut self, export_name: impl Into<Value>) -> Self {
        self.export_name = Some(export_name.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

/// Root scope of a synthesis run.
#[derive(Debug)]
pub struct Stack {
    session_id: Uuid,
    name: String,
    description: Option<String>,
    environment: Environment,
    tree: ConstructTree,
    tokens: TokenRegistry,
    parameters: BTreeMap<String, Parameter>,
    mappings: BTreeMap<String, Mapping>,
    outputs: BTreeMap<String, Output>,
}

impl Stack {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let session_id = Uuid::new_v4();
        debug!(stack = %name, session = %session_id, "Creating stack");
        Self {
            session_id,
            tree: ConstructTree::new(name.clone()),
            name,
            description: None,
            environment: Environment::default(),
            tokens: TokenRegistry::new(),
            parameters: BTreeMap::new(),
            mappings: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn set_environment(&mut self, environment: Environment) {
        self.environment = environment;
    }

    pub fn tree(&self) -> &ConstructTree {
        &self.tree
    }

    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// A scope positioned at the root of the stack.
    pub fn scope(&mut self) -> Scope<'_> {
        let node = self.tree.root();
        Scope { stack: self, node }
    }

    pub fn scope_at(&mut self, node: NodeId) -> CoreResult<Scope<'_>> {
        self.tree.node(node)?;
        Ok(Scope { stack: self, node })
    }

    /// Create a child node under `parent` and populate it with `factory`.
    pub fn add_child<T, E, F>(&mut self, parent: NodeId, name: &str, factory: F) -> Result<T, E>
    where
        E: From<CoreError>,
        F: FnOnce(&mut Scope<'_>) -> Result<T, E>,
    {
        let node = self.tree.add_child(parent, name)?;
        let mut scope = Scope { stack: self, node };
        factory(&mut scope)
    }

    pub fn declaration(&self, path: &ConstructPath) -> CoreResult<&ResourceDeclaration> {
        self.tree
            .declaration(path)
            .ok_or_else(|| CoreError::UnknownDeclaration(path.to_string()))
    }

    pub fn declaration_mut(&mut self, path: &ConstructPath) -> CoreResult<&mut ResourceDeclaration> {
        self.tree
            .declaration_mut(path)
            .ok_or_else(|| CoreError::UnknownDeclaration(path.to_string()))
    }

    /// Record that `from` explicitly depends on `to`.
    ///
    /// The target does not have to exist yet; dangling targets are reported
    /// by validation.
    pub fn add_dependency(&mut self, from: &ConstructPath, to: &ConstructPath) -> CoreResult<()> {
        self.declaration_mut(from)?.add_dependency(to.clone());
        Ok(())
    }

    /// Token for the logical ID of the declaration at `target`.
    pub fn reference(&mut self, target: &ConstructPath) -> Token {
        self.tokens.create(
            format!("{}.Ref", target.joined()),
            TokenKind::Reference {
                target: target.clone(),
            },
        )
    }

    /// Token for a runtime attribute of the declaration at `target`.
    pub fn attribute(&mut self, target: &ConstructPath, attribute: impl Into<String>) -> Token {
        let attribute = attribute.into();
        self.tokens.create(
            format!("{}.{}", target.joined(), attribute),
            TokenKind::Attribute {
                target: target.clone(),
                attribute,
            },
        )
    }

    pub fn pseudo(&mut self, pseudo: PseudoParameter) -> Token {
        self.tokens.create(pseudo.platform_name(), TokenKind::Pseudo(pseudo))
    }

    /// Token computed by an arbitrary resolver.
    pub fn lazy<F>(&mut self, label: impl Into<String>, resolver: F) -> Token
    where
        F: Fn(&ResolveContext<'_>) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.tokens.create(label, TokenKind::lazy(resolver))
    }

    /// Encode a token so it can be embedded in a plain string.
    pub fn token_as_string(&self, token: &Token) -> String {
        self.tokens.encode(token)
    }

    /// Declare a template parameter and return a token referencing it.
    pub fn add_parameter(&mut self, name: impl Into<String>, parameter: Parameter) -> CoreResult<Token> {
        let name = name.into();
        if self.parameters.contains_key(&name) {
            return Err(CoreError::DuplicateSectionEntry {
                section: "Parameters".to_string(),
                name,
            });
        }
        self.parameters.insert(name.clone(), parameter);
        Ok(self.parameter_ref(name))
    }

    /// Token referencing a parameter by name.
    pub fn parameter_ref(&mut self, name: impl Into<String>) -> Token {
        let name = name.into();
        self.tokens
            .create(format!("Param.{}", name), TokenKind::Parameter { name })
    }

    pub fn add_mapping(&mut self, name: impl Into<String>, mapping: Mapping) -> CoreResult<()> {
        let name = name.into();
        if self.mappings.contains_key(&name) {
            return Err(CoreError::DuplicateSectionEntry {
                section: "Mappings".to_string(),
                name,
            });
        }
        self.mappings.insert(name, mapping);
        Ok(())
    }

    /// Token for a two-level lookup in a mapping.
    pub fn find_in_map(
        &mut self,
        mapping: impl Into<String>,
        top_key: impl Into<Value>,
        second_key: impl Into<Value>,
    ) -> Token {
        let mapping = mapping.into();
        self.tokens.create(
            format!("Map.{}", mapping),
            TokenKind::FindInMap {
                mapping,
                top_key: top_key.into(),
                second_key: second_key.into(),
            },
        )
    }

    pub fn add_output(&mut self, name: impl Into<String>, output: Output) -> CoreResult<()> {
        let name = name.into();
        if self.outputs.contains_key(&name) {
            return Err(CoreError::DuplicateSectionEntry {
                section: "Outputs".to_string(),
                name,
            });
        }
        self.outputs.insert(name, output);
        Ok(())
    }

    pub fn parameters(&self) -> &BTreeMap<String, Parameter> {
        &self.parameters
    }

    pub fn mappings(&self) -> &BTreeMap<String, Mapping> {
        &self.mappings
    }

    pub fn outputs(&self) -> &BTreeMap<String, Output> {
        &self.outputs
    }

    /// Resolution context for this stack.
    pub fn resolve_context<'a>(&'a self, logical_ids: &'a dyn LogicalIdLookup) -> ResolveContext<'a> {
        ResolveContext::new(&self.name, &self.environment, &self.tokens, logical_ids)
    }
}

/// A composable unit of infrastructure.
///
/// Constructs are built by composition: `build` receives a scope for the
/// node created for the construct and adds children and declarations to
/// it. Whatever the construct wants to expose to its caller is returned as
/// `Output`.
pub trait Construct {
    type Output;
    type Error: From<CoreError>;

    fn build(self, scope: &mut Scope<'_>) -> Result<Self::Output, Self::Error>;
}

/// Mutable handle on one node of a stack.
#[derive(Debug)]
pub struct Scope<'s> {
    stack: &'s mut Stack,
    node: NodeId,
}

impl<'s> Scope<'s> {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn path(&self) -> CoreResult<ConstructPath> {
        self.stack.tree.path(self.node).cloned()
    }

    pub fn stack(&self) -> &Stack {
        &*self.stack
    }

    pub fn stack_mut(&mut self) -> &mut Stack {
        &mut *self.stack
    }

    /// Create a plain child scope.
    pub fn child(&mut self, name: &str) -> CoreResult<Scope<'_>> {
        let node = self.stack.tree.add_child(self.node, name)?;
        Ok(Scope {
            stack: &mut *self.stack,
            node,
        })
    }

    /// Add a construct as a new child named `name`.
    pub fn add<C: Construct>(&mut self, name: &str, construct: C) -> Result<C::Output, C::Error> {
        let node = self.stack.tree.add_child(self.node, name)?;
        let mut child = Scope {
            stack: &mut *self.stack,
            node,
        };
        construct.build(&mut child)
    }

    /// Declare a resource on this node and return its address.
    pub fn declare<I, K, V>(
        &mut self,
        name: &str,
        resource_type: Arc<dyn ResourceType>,
        properties: I,
    ) -> CoreResult<ConstructPath>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let path = self.stack.tree.add_declaration(self.node, name, resource_type)?;
        let declaration = self.stack.declaration_mut(&path)?;
        for (key, value) in properties {
            declaration.set_property(key, value);
        }
        Ok(path)
    }

    pub fn declaration_mut(&mut self, path: &ConstructPath) -> CoreResult<&mut ResourceDeclaration> {
        self.stack.declaration_mut(path)
    }

    pub fn reference(&mut self, target: &ConstructPath) -> Token {
        self.stack.reference(target)
    }

    pub fn attribute(&mut self, target: &ConstructPath, attribute: impl Into<String>) -> Token {
        self.stack.attribute(target, attribute)
    }

    pub fn pseudo(&mut self, pseudo: PseudoParameter) -> Token {
        self.stack.pseudo(pseudo)
    }

    pub fn token_as_string(&self, token: &Token) -> String {
        self.stack.token_as_string(token)
    }

    /// Make every declaration under this node depend on every declaration
    /// under `other`.
    pub fn depend_on(&mut self, other: NodeId) -> CoreResult<()> {
        self.stack.tree.add_node_dependency(self.node, other)
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) -> CoreResult<()> {
        self.stack.tree.add_metadata(self.node, key, value)
    }
}
