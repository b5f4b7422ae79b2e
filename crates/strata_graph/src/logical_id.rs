//! Logical ID assignment.
//!
//! A declaration's logical ID is its path in short form: `Default` segments
//! and a trailing `Resource` segment are dropped, each remaining segment is
//! reduced to its alphanumeric characters, and the result is concatenated.
//! Paths whose short forms collide get a suffix taken from the SHA-256 of
//! the full path, so every path keeps a distinct and stable ID.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use strata_core::{ConstructPath, LogicalIdLookup, Stack};
use tracing::debug;

use crate::error::{GraphError, GraphResult};

const DEFAULT_SEGMENT: &str = "Default";
const RESOURCE_SEGMENT: &str = "Resource";
const MAX_HUMAN_LENGTH: usize = 200;
const SUFFIX_LENGTHS: [usize; 3] = [8, 16, 64];

/// Injective mapping from declaration address to logical ID.
#[derive(Debug, Clone, Default)]
pub struct LogicalIdRegistry {
    by_path: BTreeMap<ConstructPath, String>,
    by_id: BTreeMap<String, ConstructPath>,
}

impl LogicalIdRegistry {
    /// Assign IDs to every declaration of `stack`.
    pub fn assign(stack: &Stack) -> GraphResult<Self> {
        let mut overrides = Vec::new();
        let mut generated = Vec::new();
        for declaration in stack.tree().declarations() {
            match declaration.logical_id_override() {
                Some(id) => overrides.push((declaration.path().clone(), id.to_string())),
                None => generated.push(declaration.path().clone()),
            }
        }
        Self::from_paths(overrides, generated)
    }

    /// Assign IDs from explicit overrides plus paths that need generated IDs.
    pub fn from_paths<O, G>(overrides: O, generated: G) -> GraphResult<Self>
    where
        O: IntoIterator<Item = (ConstructPath, String)>,
        G: IntoIterator<Item = ConstructPath>,
    {
        let mut registry = Self::default();

        for (path, id) in overrides {
            registry.insert(path, id)?;
        }

        let mut groups: BTreeMap<String, Vec<ConstructPath>> = BTreeMap::new();
        for path in generated {
            groups.entry(short_form(&path)).or_default().push(path);
        }

        for (short, mut paths) in groups {
            paths.sort();
            if paths.len() == 1 && !short.is_empty() && !registry.by_id.contains_key(&short) {
                let path = paths.remove(0);
                registry.insert(path, short)?;
                continue;
            }

            let human = if short.is_empty() {
                RESOURCE_SEGMENT.to_string()
            } else {
                short
            };
            for path in paths {
                let id = suffixed(&human, &path, |candidate| registry.by_id.contains_key(candidate))?;
                debug!(path = %path, logical_id = %id, "Disambiguated logical ID");
                registry.insert(path, id)?;
            }
        }

        Ok(registry)
    }

    /// IDs for targets outside the stack, expected to exist at deploy time.
    ///
    /// A target keeps its short form unless a declaration of this stack or
    /// another external target already needs it; then it gets the same hash
    /// suffix as a colliding declaration would.
    pub fn external_ids<'p, I>(&self, targets: I) -> GraphResult<BTreeMap<ConstructPath, String>>
    where
        I: IntoIterator<Item = &'p ConstructPath>,
    {
        let mut groups: BTreeMap<String, Vec<ConstructPath>> = BTreeMap::new();
        for target in targets {
            if self.by_path.contains_key(target) {
                continue;
            }
            let paths = groups.entry(short_form(target)).or_default();
            if !paths.contains(target) {
                paths.push(target.clone());
            }
        }

        let mut external: BTreeMap<ConstructPath, String> = BTreeMap::new();
        let mut taken: BTreeMap<String, ConstructPath> = BTreeMap::new();
        for (short, mut paths) in groups {
            paths.sort();
            if paths.len() == 1
                && !short.is_empty()
                && !self.by_id.contains_key(&short)
                && !taken.contains_key(&short)
            {
                let path = paths.remove(0);
                taken.insert(short.clone(), path.clone());
                external.insert(path, short);
                continue;
            }

            let human = if short.is_empty() {
                RESOURCE_SEGMENT.to_string()
            } else {
                short
            };
            for path in paths {
                let id = suffixed(&human, &path, |candidate| {
                    self.by_id.contains_key(candidate) || taken.contains_key(candidate)
                })?;
                debug!(path = %path, logical_id = %id, "Disambiguated external ID");
                taken.insert(id.clone(), path.clone());
                external.insert(path, id);
            }
        }
        Ok(external)
    }

    fn insert(&mut self, path: ConstructPath, id: String) -> GraphResult<()> {
        if let Some(existing) = self.by_id.get(&id) {
            if existing != &path {
                return Err(GraphError::LogicalIdCollision {
                    logical_id: id,
                    paths: vec![existing.to_string(), path.to_string()],
                });
            }
        }
        self.by_id.insert(id.clone(), path.clone());
        self.by_path.insert(path, id);
        Ok(())
    }

    pub fn get(&self, path: &ConstructPath) -> Option<&str> {
        self.by_path.get(path).map(String::as_str)
    }

    /// The declaration that owns `logical_id`.
    pub fn path_of(&self, logical_id: &str) -> Option<&ConstructPath> {
        self.by_id.get(logical_id)
    }

    pub fn contains_id(&self, logical_id: &str) -> bool {
        self.by_id.contains_key(logical_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConstructPath, &str)> {
        self.by_path.iter().map(|(path, id)| (path, id.as_str()))
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

impl LogicalIdLookup for LogicalIdRegistry {
    fn logical_id(&self, path: &ConstructPath) -> Option<&str> {
        self.get(path)
    }
}

/// Human-readable part of a logical ID.
pub fn short_form(path: &ConstructPath) -> String {
    let mut segments: Vec<&str> = path
        .segments()
        .iter()
        .map(String::as_str)
        .filter(|segment| *segment != DEFAULT_SEGMENT)
        .collect();
    if segments.len() > 1 && segments.last() == Some(&RESOURCE_SEGMENT) {
        segments.pop();
    }

    let mut parts: Vec<String> = Vec::with_capacity(segments.len());
    for segment in segments {
        let cleaned: String = segment.chars().filter(char::is_ascii_alphanumeric).collect();
        if cleaned.is_empty() || parts.last() == Some(&cleaned) {
            continue;
        }
        parts.push(cleaned);
    }

    let mut short = parts.concat();
    short.truncate(MAX_HUMAN_LENGTH);
    short
}

fn path_digest(path: &ConstructPath) -> String {
    format!("{:X}", Sha256::digest(path.joined().as_bytes()))
}

fn suffixed(
    human: &str,
    path: &ConstructPath,
    taken: impl Fn(&str) -> bool,
) -> GraphResult<String> {
    let digest = path_digest(path);
    SUFFIX_LENGTHS
        .iter()
        .map(|len| format!("{}{}", human, &digest[..*len]))
        .find(|candidate| !taken(candidate))
        .ok_or_else(|| GraphError::LogicalIdCollision {
            logical_id: human.to_string(),
            paths: vec![path.to_string()],
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> ConstructPath {
        ConstructPath::parse(s)
    }

    #[test]
    fn test_short_form() {
        assert_eq!(short_form(&path("/Vpc/Resource")), "Vpc");
        assert_eq!(short_form(&path("/Vpc/Default/PublicSubnet1/Subnet")), "VpcPublicSubnet1Subnet");
        assert_eq!(short_form(&path("/my-bucket/Policy")), "mybucketPolicy");
        assert_eq!(short_form(&path("/Topic/Topic")), "Topic");
        assert_eq!(short_form(&path("/Resource")), "Resource");
    }

    #[test]
    fn test_colliding_short_forms_get_distinct_ids() {
        let registry =
            LogicalIdRegistry::from_paths(Vec::new(), vec![path("/x/y"), path("/x-y")]).unwrap();
        let a = registry.get(&path("/x/y")).unwrap();
        let b = registry.get(&path("/x-y")).unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("xy"));
        assert!(b.starts_with("xy"));
        assert_eq!(a.len(), 10);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_external_ids_avoid_local_ids() {
        let registry = LogicalIdRegistry::from_paths(Vec::new(), vec![path("/xVpc")]).unwrap();
        let foreign = path("/x/Vpc");
        let other = path("/Other/Resource");
        let external = registry.external_ids([&foreign, &other, &path("/xVpc")]).unwrap();

        assert_eq!(external.len(), 2);
        assert_eq!(external[&other], "Other");
        let id = &external[&foreign];
        assert_ne!(id, "xVpc");
        assert!(id.starts_with("xVpc"));
        assert!(!registry.contains_id(id));
    }

    #[test]
    fn test_external_ids_do_not_share_a_short_form() {
        let registry = LogicalIdRegistry::default();
        let external = registry
            .external_ids([&path("/a/b/Resource"), &path("/a-b")])
            .unwrap();
        assert_eq!(external.len(), 2);
        assert_ne!(external[&path("/a/b/Resource")], external[&path("/a-b")]);
    }

    #[test]
    fn test_ids_are_stable() {
        let paths = vec![path("/x/y"), path("/x-y"), path("/Vpc/Resource")];
        let first = LogicalIdRegistry::from_paths(Vec::new(), paths.clone()).unwrap();
        let second =
            LogicalIdRegistry::from_paths(Vec::new(), paths.into_iter().rev()).unwrap();
        let first: Vec<_> = first.iter().map(|(p, id)| (p.clone(), id.to_string())).collect();
        let second: Vec<_> = second.iter().map(|(p, id)| (p.clone(), id.to_string())).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_override_wins_and_generated_id_moves_aside() {
        let registry = LogicalIdRegistry::from_paths(
            vec![(path("/Legacy/Resource"), "Vpc".to_string())],
            vec![path("/Vpc/Resource")],
        )
        .unwrap();
        assert_eq!(registry.get(&path("/Legacy/Resource")), Some("Vpc"));
        let generated = registry.get(&path("/Vpc/Resource")).unwrap();
        assert_ne!(generated, "Vpc");
        assert!(generated.starts_with("Vpc"));
        assert_eq!(registry.path_of("Vpc"), Some(&path("/Legacy/Resource")));
    }

    #[test]
    fn test_duplicate_overrides_collide() {
        let result = LogicalIdRegistry::from_paths(
            vec![
                (path("/A/Resource"), "Shared".to_string()),
                (path("/B/Resource"), "Shared".to_string()),
            ],
            Vec::new(),
        );
        assert!(matches!(result, Err(GraphError::LogicalIdCollision { .. })));
    }
}
