//! App definition discovery.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::definition::AppDefinition;
use crate::error::ResourceResult;

/// Prefix of integration definition files.
pub const INTEG_PREFIX: &str = "integ.";

/// Finds app definitions under a directory.
pub struct DefinitionLoader {
    root: PathBuf,
    prefix: Option<String>,
}

impl DefinitionLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            prefix: None,
        }
    }

    /// Only consider files whose name starts with `prefix`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Loader for `integ.*.yaml` files.
    pub fn integ(root: impl Into<PathBuf>) -> Self {
        Self::new(root).with_prefix(INTEG_PREFIX)
    }

    /// Definition files, sorted by path.
    pub fn discover(&self) -> Vec<PathBuf> {
        if !self.root.exists() {
            warn!("Definitions directory does not exist: {:?}", self.root);
            return Vec::new();
        }

        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|path| self.matches(path))
            .collect();
        files.sort();
        debug!("Found {} definition file(s) under {:?}", files.len(), self.root);
        files
    }

    /// Load every discovered definition, stopping at the first invalid one.
    pub fn load_all(&self) -> ResourceResult<Vec<(PathBuf, AppDefinition)>> {
        self.discover()
            .into_iter()
            .map(|path| {
                let definition = AppDefinition::from_file(&path)?;
                Ok((path, definition))
            })
            .collect()
    }

    fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        let yaml = name.ends_with(".yaml") || name.ends_with(".yml");
        let prefixed = self
            .prefix
            .as_deref()
            .map_or(true, |prefix| name.starts_with(prefix));
        yaml && prefixed
    }
}

/// Snapshot file stored next to a definition: `integ.vpn.yaml` maps to
/// `integ.vpn.snapshot.json`.
pub fn snapshot_path(definition: &Path) -> PathBuf {
    let stem = definition
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("definition");
    definition.with_file_name(format!("{}.snapshot.json", stem))
}
