//! Resource type registry.
//!
//! Maps platform type names to their [`ResourceType`] implementations so
//! that definitions loaded from files can look types up by name.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::resource_type::ResourceType;

/// Registry of resource type implementations.
#[derive(Default)]
pub struct ResourceTypeRegistry {
    types: BTreeMap<String, Arc<dyn ResourceType>>,
}

impl ResourceTypeRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type under its `type_name()`.
    ///
    /// A type already registered under the same name is replaced.
    pub fn register(&mut self, resource_type: Arc<dyn ResourceType>) {
        let name = resource_type.type_name().to_string();
        debug!("Registering resource type: {}", name);
        self.types.insert(name, resource_type);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ResourceType>> {
        self.types.get(name).cloned()
    }

    /// Get a type by name, returning an error if not found.
    pub fn get_required(&self, name: &str) -> CoreResult<Arc<dyn ResourceType>> {
        self.get(name)
            .ok_or_else(|| CoreError::UnknownResourceType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered type names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.types.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl std::fmt::Debug for ResourceTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceTypeRegistry")
            .field("types", &self.names())
            .finish()
    }
}
