//! Construct paths.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '/';

/// Ordered list of construct names from the root of a stack.
///
/// The root itself has the empty path. Ordering is segment-wise
/// lexicographic, which is the tie-break used for emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ConstructPath(Vec<String>);

impl ConstructPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Parse a `/`-separated path. Leading and trailing separators are ignored.
    pub fn parse(s: &str) -> Self {
        Self(
            s.split(PATH_SEPARATOR)
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.into());
        Self(segments)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `self` equals `ancestor` or lies beneath it.
    pub fn starts_with(&self, ancestor: &ConstructPath) -> bool {
        self.0.starts_with(&ancestor.0)
    }

    /// Path joined with `/` and no leading separator.
    pub fn joined(&self) -> String {
        self.0.join("/")
    }
}

impl fmt::Display for ConstructPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.joined())
    }
}

impl From<String> for ConstructPath {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<&str> for ConstructPath {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<ConstructPath> for String {
    fn from(value: ConstructPath) -> Self {
        value.to_string()
    }
}
