//! Property values that may contain tokens.

use std::collections::BTreeMap;

use crate::token::{Token, TokenKind, TokenRegistry};

/// A structured property value.
///
/// Every position of the tree may hold either a concrete value or a
/// [`Token`]. `Concat` joins its parts into a single string once they are
/// resolved.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Token(Token),
    Concat(Vec<Value>),
}

/// Tokens discovered while walking a value.
#[derive(Debug, Default)]
pub struct TokenScan {
    pub tokens: Vec<Token>,
    /// String markers that do not map to a token of the session.
    pub unknown_markers: Vec<String>,
}

impl Value {
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn concat<I, V>(parts: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::Concat(parts.into_iter().map(Into::into).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_token(&self) -> Option<&Token> {
        match self {
            Value::Token(token) => Some(token),
            _ => None,
        }
    }

    /// A string, number or boolean with no tokens anywhere in it.
    pub fn is_literal(&self) -> bool {
        match self {
            Value::String(s) => !TokenRegistry::has_markers(s),
            Value::Null | Value::Bool(_) | Value::Number(_) => true,
            _ => false,
        }
    }

    /// Collect every token reachable from this value.
    ///
    /// Tokens nested in mapping keys of a `FindInMap` token are included.
    /// Lazy tokens are opaque: their output is not known until resolution.
    pub fn scan_tokens(&self, registry: &TokenRegistry) -> TokenScan {
        let mut scan = TokenScan::default();
        self.collect_tokens(registry, &mut scan);
        scan
    }

    fn collect_tokens(&self, registry: &TokenRegistry, scan: &mut TokenScan) {
        match self {
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
            Value::String(s) => {
                for (marker, id) in TokenRegistry::markers(s) {
                    match id.and_then(|id| registry.get(id)) {
                        Some(token) => collect_token(token, registry, scan),
                        None => scan.unknown_markers.push(marker),
                    }
                }
            }
            Value::List(items) | Value::Concat(items) => {
                for item in items {
                    item.collect_tokens(registry, scan);
                }
            }
            Value::Map(map) => {
                for item in map.values() {
                    item.collect_tokens(registry, scan);
                }
            }
            Value::Token(token) => collect_token(token, registry, scan),
        }
    }

    /// Set a value at a dot-separated path, creating intermediate maps.
    ///
    /// Intermediate values that are not maps are replaced.
    pub fn set_path(&mut self, path: &str, value: Value) {
        let segments: Vec<&str> = path.split('.').collect();
        let Some((last, parents)) = segments.split_last() else {
            return;
        };
        let mut current = self;
        for segment in parents {
            current = ensure_map(current)
                .entry(segment.to_string())
                .or_insert(Value::Null);
        }
        ensure_map(current).insert(last.to_string(), value);
    }
}

fn ensure_map(value: &mut Value) -> &mut BTreeMap<String, Value> {
    if !matches!(value, Value::Map(_)) {
        *value = Value::Map(BTreeMap::new());
    }
    match value {
        Value::Map(map) => map,
        _ => unreachable!("value was just replaced by a map"),
    }
}

fn collect_token(token: &Token, registry: &TokenRegistry, scan: &mut TokenScan) {
    if let TokenKind::FindInMap {
        top_key,
        second_key,
        ..
    } = token.kind()
    {
        top_key.collect_tokens(registry, scan);
        second_key.collect_tokens(registry, scan);
    }
    scan.tokens.push(token.clone());
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::String(value.clone())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value.into())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Number(value.into())
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Number(value.into())
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number((value as u64).into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

impl From<Token> for Value {
    fn from(value: Token) -> Self {
        Value::Token(value)
    }
}

impl From<&Token> for Value {
    fn from(value: &Token) -> Self {
        Value::Token(value.clone())
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Value::Map(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::ConstructPath;
    use crate::token::TokenKind;

    #[test]
    fn test_scan_nested_tokens() {
        let mut registry = TokenRegistry::new();
        let a = registry.create(
            "A.Ref",
            TokenKind::Reference {
                target: ConstructPath::parse("/A/Resource"),
            },
        );
        let b = registry.create(
            "B.Arn",
            TokenKind::Attribute {
                target: ConstructPath::parse("/B/Resource"),
                attribute: "Arn".to_string(),
            },
        );
        let marker = registry.encode(&b);

        let value = Value::map([
            ("VpcId", Value::from(&a)),
            (
                "Tags",
                Value::list([Value::map([("Value", format!("name-{}", marker))])]),
            ),
        ]);

        let scan = value.scan_tokens(&registry);
        assert_eq!(scan.tokens.len(), 2);
        assert!(scan.tokens.contains(&a));
        assert!(scan.tokens.contains(&b));
        assert!(scan.unknown_markers.is_empty());
    }

    #[test]
    fn test_scan_reports_unknown_markers() {
        let registry = TokenRegistry::new();
        let value = Value::from("prefix-${Token[Stray.7]}");
        let scan = value.scan_tokens(&registry);
        assert!(scan.tokens.is_empty());
        assert_eq!(scan.unknown_markers, vec!["${Token[Stray.7]}".to_string()]);
    }

    #[test]
    fn test_set_path_creates_maps() {
        let mut value = Value::map([("Name", "db")]);
        value.set_path("Endpoint.Port", Value::from(5432));
        let endpoint = value.as_map().unwrap().get("Endpoint").unwrap();
        assert_eq!(endpoint.as_map().unwrap().get("Port"), Some(&Value::from(5432)));
        assert_eq!(value.as_map().unwrap().get("Name"), Some(&Value::from("db")));
    }

    #[test]
    fn test_literal_detection() {
        assert!(Value::from("plain").is_literal());
        assert!(!Value::from("${Token[X.1]}").is_literal());
        assert!(!Value::list(["a"]).is_literal());
    }
}
