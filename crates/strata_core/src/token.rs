//! Deferred values.
//!
//! A [`Token`] stands in for a value that is only known once synthesis has
//! assigned logical IDs, or at deploy time (account, region, parameter
//! values). Tokens are embedded directly in [`Value`] trees, or inside plain
//! strings through [`TokenRegistry::encode`] markers, and are replaced during
//! the final resolution pass.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::path::ConstructPath;
use crate::resolve::ResolveContext;
use crate::value::Value;

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{Token\[([A-Za-z0-9_.:\-]*)\.(\d+)\]\}").expect("valid token marker pattern")
});

/// Session-unique token identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenId(u64);

impl TokenId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Produces the concrete value of a lazy token.
///
/// Resolvers must be pure with respect to the context they are given: the
/// same context always yields the same value.
pub trait Resolver: Send + Sync {
    fn resolve(&self, context: &ResolveContext<'_>) -> Result<Value, String>;
}

impl<F> Resolver for F
where
    F: Fn(&ResolveContext<'_>) -> Result<Value, String> + Send + Sync,
{
    fn resolve(&self, context: &ResolveContext<'_>) -> Result<Value, String> {
        self(context)
    }
}

/// Deploy-time values provided by the target platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PseudoParameter {
    AccountId,
    Region,
    Partition,
    StackName,
    UrlSuffix,
}

impl PseudoParameter {
    /// Name of the platform parameter used when the value is not known.
    pub fn platform_name(&self) -> &'static str {
        match self {
            PseudoParameter::AccountId => "AWS::AccountId",
            PseudoParameter::Region => "AWS::Region",
            PseudoParameter::Partition => "AWS::Partition",
            PseudoParameter::StackName => "AWS::StackName",
            PseudoParameter::UrlSuffix => "AWS::URLSuffix",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "account" | "accountid" => Some(Self::AccountId),
            "region" => Some(Self::Region),
            "partition" => Some(Self::Partition),
            "stackname" => Some(Self::StackName),
            "urlsuffix" => Some(Self::UrlSuffix),
            _ => None,
        }
    }
}

/// What a token stands for.
#[derive(Clone)]
pub enum TokenKind {
    /// The logical ID of a resource declaration.
    Reference { target: ConstructPath },
    /// A runtime attribute of a resource declaration.
    Attribute { target: ConstructPath, attribute: String },
    /// A template parameter.
    Parameter { name: String },
    /// A platform pseudo parameter.
    Pseudo(PseudoParameter),
    /// A two-level lookup in a template mapping.
    FindInMap {
        mapping: String,
        top_key: Value,
        second_key: Value,
    },
    /// Anything else, computed by a resolver.
    Lazy(Arc<dyn Resolver>),
}

impl TokenKind {
    /// A lazy token computed by `resolver`.
    pub fn lazy<F>(resolver: F) -> Self
    where
        F: Fn(&ResolveContext<'_>) -> Result<Value, String> + Send + Sync + 'static,
    {
        TokenKind::Lazy(Arc::new(resolver))
    }
}

impl fmt::Debug for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Reference { target } => write!(f, "Reference({})", target),
            TokenKind::Attribute { target, attribute } => {
                write!(f, "Attribute({}.{})", target, attribute)
            }
            TokenKind::Parameter { name } => write!(f, "Parameter({})", name),
            TokenKind::Pseudo(p) => write!(f, "Pseudo({})", p.platform_name()),
            TokenKind::FindInMap { mapping, .. } => write!(f, "FindInMap({})", mapping),
            TokenKind::Lazy(_) => write!(f, "Lazy"),
        }
    }
}

struct TokenData {
    id: TokenId,
    label: String,
    kind: TokenKind,
}

/// Placeholder for a value resolved at synthesis time.
///
/// Cloning a token is cheap and preserves its identity.
#[derive(Clone)]
pub struct Token {
    inner: Arc<TokenData>,
}

impl Token {
    pub fn id(&self) -> TokenId {
        self.inner.id
    }

    /// Creation-site label used in diagnostics.
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn kind(&self) -> &TokenKind {
        &self.inner.kind
    }

    /// The declaration this token points at, if any.
    pub fn target(&self) -> Option<&ConstructPath> {
        match &self.inner.kind {
            TokenKind::Reference { target } | TokenKind::Attribute { target, .. } => Some(target),
            _ => None,
        }
    }

    /// `label#id`, the form used in error messages.
    pub fn display_name(&self) -> String {
        format!("{}#{}", self.inner.label, self.inner.id)
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Token {}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({} {:?})", self.display_name(), self.inner.kind)
    }
}

/// A piece of a string that embeds token markers.
#[derive(Debug, Clone, PartialEq)]
pub enum StringFragment {
    Literal(String),
    Token(Token),
}

/// Issues token identities for one synthesis session and maps string
/// markers back to the tokens they encode.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    next_id: u64,
    tokens: BTreeMap<TokenId, Token>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a token with a fresh identity.
    pub fn create(&mut self, label: impl Into<String>, kind: TokenKind) -> Token {
        let id = TokenId(self.next_id);
        self.next_id += 1;
        let token = Token {
            inner: Arc::new(TokenData {
                id,
                label: label.into(),
                kind,
            }),
        };
        self.tokens.insert(id, token.clone());
        token
    }

    pub fn get(&self, id: TokenId) -> Option<&Token> {
        self.tokens.get(&id)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Encode a token as a marker that can be embedded in any string.
    pub fn encode(&self, token: &Token) -> String {
        let label: String = token
            .label()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("${{Token[{}.{}]}}", label, token.id())
    }

    /// Whether the string contains at least one marker.
    pub fn has_markers(s: &str) -> bool {
        MARKER_RE.is_match(s)
    }

    /// Split a string on its token markers.
    ///
    /// Returns `Ok(None)` when the string has no markers. A marker whose id
    /// was not issued by this registry is an error.
    pub fn split(&self, s: &str) -> CoreResult<Option<Vec<StringFragment>>> {
        if !Self::has_markers(s) {
            return Ok(None);
        }

        let mut fragments = Vec::new();
        let mut cursor = 0;
        for captures in MARKER_RE.captures_iter(s) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            if whole.start() > cursor {
                fragments.push(StringFragment::Literal(s[cursor..whole.start()].to_string()));
            }
            let token = captures
                .get(2)
                .and_then(|m| m.as_str().parse::<u64>().ok())
                .and_then(|id| self.get(TokenId(id)))
                .ok_or_else(|| CoreError::TokenResolution {
                    token: whole.as_str().to_string(),
                    message: "marker does not belong to this synthesis session".to_string(),
                })?;
            fragments.push(StringFragment::Token(token.clone()));
            cursor = whole.end();
        }
        if cursor < s.len() {
            fragments.push(StringFragment::Literal(s[cursor..].to_string()));
        }

        Ok(Some(fragments))
    }

    /// All markers in a string, including ones this registry does not know.
    pub fn markers(s: &str) -> Vec<(String, Option<TokenId>)> {
        MARKER_RE
            .captures_iter(s)
            .filter_map(|captures| {
                let whole = captures.get(0)?.as_str().to_string();
                let id = captures
                    .get(2)
                    .and_then(|m| m.as_str().parse::<u64>().ok())
                    .map(TokenId);
                Some((whole, id))
            })
            .collect()
    }
}
