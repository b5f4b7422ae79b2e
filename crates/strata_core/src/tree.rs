//! Construct tree.
//!
//! The tree is append-only: nodes are never removed or renamed, and a node's
//! path is computed once when it is inserted. Nodes live in an arena and
//! refer to each other by [`NodeId`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::declaration::ResourceDeclaration;
use crate::error::{CoreError, CoreResult};
use crate::path::{ConstructPath, PATH_SEPARATOR};
use crate::resource_type::ResourceType;

/// Arena index of a construct node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// A named scope in the tree.
#[derive(Debug, Clone)]
pub struct ConstructNode {
    id: NodeId,
    name: String,
    path: ConstructPath,
    parent: Option<NodeId>,
    children: IndexMap<String, NodeId>,
    declarations: IndexMap<String, ResourceDeclaration>,
    dependencies: BTreeSet<NodeId>,
    metadata: BTreeMap<String, serde_json::Value>,
}

impl ConstructNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &ConstructPath {
        &self.path
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes in insertion order.
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.values().copied()
    }

    pub fn child(&self, name: &str) -> Option<NodeId> {
        self.children.get(name).copied()
    }

    /// Declarations in insertion order.
    pub fn declarations(&self) -> impl Iterator<Item = &ResourceDeclaration> {
        self.declarations.values()
    }

    /// Nodes this node depends on as a whole.
    pub fn dependencies(&self) -> &BTreeSet<NodeId> {
        &self.dependencies
    }

    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }

    fn name_taken(&self, name: &str) -> bool {
        self.children.contains_key(name) || self.declarations.contains_key(name)
    }
}

/// Arena-backed tree of construct nodes.
#[derive(Debug, Clone)]
pub struct ConstructTree {
    nodes: Vec<ConstructNode>,
}

impl ConstructTree {
    /// Create a tree whose root is named `root_name`.
    ///
    /// The root's path is empty; its name only labels the tree.
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            nodes: vec![ConstructNode {
                id: NodeId(0),
                name: root_name.into(),
                path: ConstructPath::root(),
                parent: None,
                children: IndexMap::new(),
                declarations: IndexMap::new(),
                dependencies: BTreeSet::new(),
                metadata: BTreeMap::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> CoreResult<&ConstructNode> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| CoreError::UnknownNode(format!("#{}", id.0)))
    }

    fn node_mut(&mut self, id: NodeId) -> CoreResult<&mut ConstructNode> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| CoreError::UnknownNode(format!("#{}", id.0)))
    }

    /// Ordered names from the root to `id`.
    pub fn path(&self, id: NodeId) -> CoreResult<&ConstructPath> {
        Ok(&self.node(id)?.path)
    }

    /// Insert a child under `parent`.
    pub fn add_child(&mut self, parent: NodeId, name: &str) -> CoreResult<NodeId> {
        validate_name(name)?;
        let id = NodeId(self.nodes.len());
        let parent_node = self.node_mut(parent)?;
        if parent_node.name_taken(name) {
            return Err(CoreError::DuplicateChildName {
                parent: parent_node.path.to_string(),
                name: name.to_string(),
            });
        }
        let path = parent_node.path.child(name);
        parent_node.children.insert(name.to_string(), id);

        debug!(path = %path, "Adding construct");
        self.nodes.push(ConstructNode {
            id,
            name: name.to_string(),
            path,
            parent: Some(parent),
            children: IndexMap::new(),
            declarations: IndexMap::new(),
            dependencies: BTreeSet::new(),
            metadata: BTreeMap::new(),
        });
        Ok(id)
    }

    /// Add a resource declaration to `node` and return its address.
    ///
    /// Declarations share the child namespace of their node.
    pub fn add_declaration(
        &mut self,
        node: NodeId,
        name: &str,
        resource_type: Arc<dyn ResourceType>,
    ) -> CoreResult<ConstructPath> {
        validate_name(name)?;
        let owner = self.node_mut(node)?;
        if owner.name_taken(name) {
            return Err(CoreError::DuplicateChildName {
                parent: owner.path.to_string(),
                name: name.to_string(),
            });
        }
        let path = owner.path.child(name);
        debug!(path = %path, resource_type = resource_type.type_name(), "Declaring resource");
        owner.declarations.insert(
            name.to_string(),
            ResourceDeclaration::new(name, path.clone(), node, resource_type),
        );
        Ok(path)
    }

    /// Find the node at `path`.
    pub fn find(&self, path: &ConstructPath) -> Option<NodeId> {
        let mut current = self.root();
        for segment in path.segments() {
            current = self.nodes[current.0].child(segment)?;
        }
        Some(current)
    }

    pub fn declaration(&self, path: &ConstructPath) -> Option<&ResourceDeclaration> {
        let (owner, name) = self.declaration_owner(path)?;
        self.nodes[owner.0].declarations.get(name)
    }

    pub fn declaration_mut(&mut self, path: &ConstructPath) -> Option<&mut ResourceDeclaration> {
        let (owner, name) = self.declaration_owner(path)?;
        self.nodes[owner.0].declarations.get_mut(name)
    }

    fn declaration_owner<'p>(&self, path: &'p ConstructPath) -> Option<(NodeId, &'p str)> {
        let name = path.last()?;
        let owner = self.find(&path.parent()?)?;
        Some((owner, name))
    }

    /// Lazy pre-order traversal starting at `start`.
    ///
    /// Parents come before children, children in insertion order. Calling
    /// `walk` again yields the same sequence.
    pub fn walk(&self, start: NodeId) -> Walk<'_> {
        let stack = if start.0 < self.nodes.len() {
            vec![start]
        } else {
            Vec::new()
        };
        Walk { tree: self, stack }
    }

    /// Every declaration in walk order.
    pub fn declarations(&self) -> impl Iterator<Item = &ResourceDeclaration> {
        self.walk(self.root()).flat_map(|node| node.declarations())
    }

    /// Addresses of every declaration at or below `node`.
    pub fn subtree_declarations(&self, node: NodeId) -> Vec<ConstructPath> {
        self.walk(node)
            .flat_map(|n| n.declarations().map(|d| d.path().clone()))
            .collect()
    }

    /// Make every declaration under `from` depend on every declaration
    /// under `to`.
    pub fn add_node_dependency(&mut self, from: NodeId, to: NodeId) -> CoreResult<()> {
        self.node(to)?;
        self.node_mut(from)?.dependencies.insert(to);
        Ok(())
    }

    /// All construct-level dependencies as `(from, to)` pairs.
    pub fn node_dependencies(&self) -> Vec<(NodeId, NodeId)> {
        self.nodes
            .iter()
            .flat_map(|n| n.dependencies.iter().map(move |to| (n.id, *to)))
            .collect()
    }

    pub fn add_metadata(
        &mut self,
        node: NodeId,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> CoreResult<()> {
        self.node_mut(node)?.metadata.insert(key.into(), value);
        Ok(())
    }
}

/// Iterator returned by [`ConstructTree::walk`].
pub struct Walk<'t> {
    tree: &'t ConstructTree,
    stack: Vec<NodeId>,
}

impl<'t> Iterator for Walk<'t> {
    type Item = &'t ConstructNode;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        let id = self.stack.pop()?;
        let node = &tree.nodes[id.0];
        self.stack.extend(node.children.values().rev().copied());
        Some(node)
    }
}

fn validate_name(name: &str) -> CoreResult<()> {
    if name.is_empty() {
        return Err(CoreError::InvalidName {
            name: name.to_string(),
            reason: "name must not be empty".to_string(),
        });
    }
    if name.contains(PATH_SEPARATOR) {
        return Err(CoreError::InvalidName {
            name: name.to_string(),
            reason: format!("name must not contain '{}'", PATH_SEPARATOR),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_type::GenericResourceType;

    fn generic() -> Arc<dyn ResourceType> {
        Arc::new(GenericResourceType::new("Custom::Thing"))
    }

    #[test]
    fn test_duplicate_child_name() {
        let mut tree = ConstructTree::new("app");
        let root = tree.root();
        tree.add_child(root, "Vpc").unwrap();
        let err = tree.add_child(root, "Vpc").unwrap_err();
        assert!(matches!(err, CoreError::DuplicateChildName { .. }));

        tree.add_declaration(root, "Topic", generic()).unwrap();
        assert!(matches!(
            tree.add_child(root, "Topic"),
            Err(CoreError::DuplicateChildName { .. })
        ));
    }

    #[test]
    fn test_invalid_names() {
        let mut tree = ConstructTree::new("app");
        let root = tree.root();
        assert!(matches!(tree.add_child(root, ""), Err(CoreError::InvalidName { .. })));
        assert!(matches!(tree.add_child(root, "a/b"), Err(CoreError::InvalidName { .. })));
    }

    #[test]
    fn test_paths_are_assigned_on_insert() {
        let mut tree = ConstructTree::new("app");
        let vpc = tree.add_child(tree.root(), "Vpc").unwrap();
        let subnet = tree.add_child(vpc, "PublicSubnet1").unwrap();
        let first = tree.path(subnet).unwrap().clone();
        tree.add_child(vpc, "PublicSubnet2").unwrap();
        assert_eq!(tree.path(subnet).unwrap(), &first);
        assert_eq!(first.to_string(), "/Vpc/PublicSubnet1");
        assert_eq!(tree.find(&first), Some(subnet));
    }

    #[test]
    fn test_walk_is_preorder_in_insertion_order() {
        let mut tree = ConstructTree::new("app");
        let root = tree.root();
        let b = tree.add_child(root, "B").unwrap();
        let a = tree.add_child(root, "A").unwrap();
        tree.add_child(b, "Z").unwrap();
        tree.add_child(b, "Y").unwrap();
        tree.add_child(a, "X").unwrap();

        let order: Vec<String> = tree.walk(root).map(|n| n.path().to_string()).collect();
        assert_eq!(order, vec!["/", "/B", "/B/Z", "/B/Y", "/A", "/A/X"]);

        let again: Vec<String> = tree.walk(root).map(|n| n.path().to_string()).collect();
        assert_eq!(order, again);
    }

    #[test]
    fn test_declaration_lookup_by_address() {
        let mut tree = ConstructTree::new("app");
        let vpc = tree.add_child(tree.root(), "Vpc").unwrap();
        let path = tree.add_declaration(vpc, "Resource", generic()).unwrap();
        assert_eq!(path.to_string(), "/Vpc/Resource");
        assert_eq!(tree.declaration(&path).unwrap().node(), vpc);
        assert!(tree.declaration(&ConstructPath::parse("/Vpc/Other")).is_none());

        tree.declaration_mut(&path).unwrap().set_property("CidrBlock", "10.0.0.0/16");
        assert_eq!(tree.declarations().count(), 1);
        assert_eq!(tree.subtree_declarations(vpc), vec![path]);
    }
}
