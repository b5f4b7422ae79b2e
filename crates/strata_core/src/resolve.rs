//! Token resolution.
//!
//! Resolution walks a [`Value`] and replaces every token with the value its
//! kind (or resolver) produces. Produced values may contain further tokens,
//! so resolution recurses until only concrete JSON remains. Re-entering a
//! token that is already being resolved, or exceeding the configured depth,
//! is reported as [`CoreError::CircularTokenResolution`].

use serde_json::{json, Map as JsonMap, Value as Json};
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::path::ConstructPath;
use crate::stack::Environment;
use crate::token::{PseudoParameter, StringFragment, Token, TokenKind, TokenRegistry};
use crate::value::Value;

/// Default bound on nested token resolution.
pub const DEFAULT_MAX_TOKEN_DEPTH: usize = 100;

/// Maps declaration addresses to their assigned logical IDs.
pub trait LogicalIdLookup {
    fn logical_id(&self, path: &ConstructPath) -> Option<&str>;
}

/// Lookup used before logical IDs exist. Every reference fails to resolve.
pub struct NoLogicalIds;

impl LogicalIdLookup for NoLogicalIds {
    fn logical_id(&self, _path: &ConstructPath) -> Option<&str> {
        None
    }
}

impl LogicalIdLookup for std::collections::BTreeMap<ConstructPath, String> {
    fn logical_id(&self, path: &ConstructPath) -> Option<&str> {
        self.get(path).map(String::as_str)
    }
}

/// Provider-specific string concatenation.
///
/// Called when a string contains parts that are only known at deploy time;
/// the template has to carry the join operation itself.
pub trait Joiner: Send + Sync {
    fn join(&self, parts: Vec<Json>) -> Json;
}

/// Concatenation with `Fn::Join` and an empty delimiter.
///
/// Adjacent literals are merged and nested empty-delimiter joins are
/// flattened, so the output is minimal and stable.
pub struct IntrinsicJoin;

impl IntrinsicJoin {
    fn flatten(part: Json, out: &mut Vec<Json>) {
        match part {
            Json::Null => {}
            Json::String(s) => push_literal(out, &s),
            Json::Number(n) => push_literal(out, &n.to_string()),
            Json::Bool(b) => push_literal(out, &b.to_string()),
            Json::Object(map) => match nested_join_parts(&map) {
                Some(parts) => {
                    for nested in parts {
                        Self::flatten(nested, out);
                    }
                }
                None => out.push(Json::Object(map)),
            },
            other => out.push(other),
        }
    }
}

fn push_literal(out: &mut Vec<Json>, s: &str) {
    if s.is_empty() {
        return;
    }
    if let Some(Json::String(previous)) = out.last_mut() {
        previous.push_str(s);
    } else {
        out.push(Json::String(s.to_string()));
    }
}

fn nested_join_parts(map: &JsonMap<String, Json>) -> Option<Vec<Json>> {
    if map.len() != 1 {
        return None;
    }
    let args = map.get("Fn::Join")?.as_array()?;
    match args.as_slice() {
        [Json::String(delimiter), Json::Array(parts)] if delimiter.is_empty() => {
            Some(parts.clone())
        }
        _ => None,
    }
}

impl Joiner for IntrinsicJoin {
    fn join(&self, parts: Vec<Json>) -> Json {
        let mut flat = Vec::new();
        for part in parts {
            Self::flatten(part, &mut flat);
        }
        match flat.len() {
            0 => Json::String(String::new()),
            1 => flat.remove(0),
            _ => json!({ "Fn::Join": ["", flat] }),
        }
    }
}

/// Everything a resolver may consult.
pub struct ResolveContext<'a> {
    pub stack_name: &'a str,
    pub environment: &'a Environment,
    pub tokens: &'a TokenRegistry,
    pub logical_ids: &'a dyn LogicalIdLookup,
    pub joiner: &'a dyn Joiner,
    pub max_depth: usize,
}

impl<'a> ResolveContext<'a> {
    pub fn new(
        stack_name: &'a str,
        environment: &'a Environment,
        tokens: &'a TokenRegistry,
        logical_ids: &'a dyn LogicalIdLookup,
    ) -> Self {
        Self {
            stack_name,
            environment,
            tokens,
            logical_ids,
            joiner: &IntrinsicJoin,
            max_depth: DEFAULT_MAX_TOKEN_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_joiner(mut self, joiner: &'a dyn Joiner) -> Self {
        self.joiner = joiner;
        self
    }

    /// Resolve a value to concrete JSON.
    pub fn resolve(&self, value: &Value) -> CoreResult<Json> {
        Resolution {
            context: self,
            active: Vec::new(),
        }
        .value(value)
    }

    /// Logical ID assigned to a declaration, if any.
    pub fn logical_id(&self, path: &ConstructPath) -> Option<&str> {
        self.logical_ids.logical_id(path)
    }
}

/// Resolve `value` against `context`.
pub fn resolve(value: &Value, context: &ResolveContext<'_>) -> CoreResult<Json> {
    context.resolve(value)
}

struct Resolution<'c, 'a> {
    context: &'c ResolveContext<'a>,
    active: Vec<Token>,
}

impl Resolution<'_, '_> {
    fn value(&mut self, value: &Value) -> CoreResult<Json> {
        match value {
            Value::Null => Ok(Json::Null),
            Value::Bool(b) => Ok(Json::Bool(*b)),
            Value::Number(n) => Ok(Json::Number(n.clone())),
            Value::String(s) => self.string(s),
            Value::List(items) => items
                .iter()
                .map(|item| self.value(item))
                .collect::<CoreResult<Vec<_>>>()
                .map(Json::Array),
            Value::Map(map) => {
                let mut out = JsonMap::new();
                for (key, item) in map {
                    out.insert(key.clone(), self.value(item)?);
                }
                Ok(Json::Object(out))
            }
            Value::Token(token) => self.token(token),
            Value::Concat(parts) => {
                let resolved = parts
                    .iter()
                    .map(|part| self.value(part))
                    .collect::<CoreResult<Vec<_>>>()?;
                Ok(self.context.joiner.join(resolved))
            }
        }
    }

    fn string(&mut self, s: &str) -> CoreResult<Json> {
        let Some(fragments) = self.context.tokens.split(s)? else {
            return Ok(Json::String(s.to_string()));
        };
        let mut resolved = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            match fragment {
                StringFragment::Literal(literal) => resolved.push(Json::String(literal)),
                StringFragment::Token(token) => resolved.push(self.token(&token)?),
            }
        }
        Ok(self.context.joiner.join(resolved))
    }

    fn token(&mut self, token: &Token) -> CoreResult<Json> {
        if let Some(start) = self.active.iter().position(|t| t.id() == token.id()) {
            let mut chain: Vec<String> =
                self.active[start..].iter().map(Token::display_name).collect();
            chain.push(token.display_name());
            return Err(CoreError::CircularTokenResolution { chain });
        }
        if self.active.len() >= self.context.max_depth {
            let mut chain: Vec<String> = self.active.iter().map(Token::display_name).collect();
            chain.push(token.display_name());
            return Err(CoreError::CircularTokenResolution { chain });
        }

        debug!(token = %token.display_name(), depth = self.active.len(), "Resolving token");
        let produced = self.produce(token)?;
        self.active.push(token.clone());
        let result = self.value(&produced);
        self.active.pop();
        result
    }

    fn produce(&self, token: &Token) -> CoreResult<Value> {
        let context = self.context;
        let failed = |message: String| CoreError::TokenResolution {
            token: token.display_name(),
            message,
        };

        match token.kind() {
            TokenKind::Reference { target } => {
                let id = context
                    .logical_id(target)
                    .ok_or_else(|| failed(format!("no logical ID assigned to {}", target)))?;
                Ok(Value::from(json!({ "Ref": id })))
            }
            TokenKind::Attribute { target, attribute } => {
                let id = context
                    .logical_id(target)
                    .ok_or_else(|| failed(format!("no logical ID assigned to {}", target)))?;
                Ok(Value::from(json!({ "Fn::GetAtt": [id, attribute] })))
            }
            TokenKind::Parameter { name } => Ok(Value::from(json!({ "Ref": name }))),
            TokenKind::Pseudo(pseudo) => Ok(pseudo_value(*pseudo, context)),
            TokenKind::FindInMap {
                mapping,
                top_key,
                second_key,
            } => Ok(Value::map([(
                "Fn::FindInMap",
                Value::list([Value::from(mapping.as_str()), top_key.clone(), second_key.clone()]),
            )])),
            TokenKind::Lazy(resolver) => resolver.resolve(context).map_err(failed),
        }
    }
}

fn pseudo_value(pseudo: PseudoParameter, context: &ResolveContext<'_>) -> Value {
    let environment = context.environment;
    let concrete = match pseudo {
        PseudoParameter::AccountId => environment.account.clone(),
        PseudoParameter::Region => environment.region.clone(),
        PseudoParameter::StackName => Some(context.stack_name.to_string()),
        PseudoParameter::Partition => environment
            .region
            .as_deref()
            .map(|region| partition_for(region).to_string()),
        PseudoParameter::UrlSuffix => environment.region.as_deref().map(|region| {
            if region.starts_with("cn-") {
                "amazonaws.com.cn".to_string()
            } else {
                "amazonaws.com".to_string()
            }
        }),
    };

    match concrete {
        Some(value) => Value::String(value),
        None => Value::from(json!({ "Ref": pseudo.platform_name() })),
    }
}

fn partition_for(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "aws-cn"
    } else if region.starts_with("us-gov-") {
        "aws-us-gov"
    } else {
        "aws"
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::*;

    fn ids() -> BTreeMap<ConstructPath, String> {
        let mut ids = BTreeMap::new();
        ids.insert(ConstructPath::parse("/A/Resource"), "A".to_string());
        ids.insert(ConstructPath::parse("/B/Resource"), "B".to_string());
        ids
    }

    #[test]
    fn test_resolve_reference_and_attribute() {
        let mut tokens = TokenRegistry::new();
        let reference = tokens.create(
            "A.Ref",
            TokenKind::Reference {
                target: ConstructPath::parse("/A/Resource"),
            },
        );
        let attribute = tokens.create(
            "B.Arn",
            TokenKind::Attribute {
                target: ConstructPath::parse("/B/Resource"),
                attribute: "Arn".to_string(),
            },
        );
        let env = Environment::default();
        let ids = ids();
        let context = ResolveContext::new("stack", &env, &tokens, &ids);

        let value = Value::map([("Ref", Value::from(&reference)), ("Att", Value::from(&attribute))]);
        let resolved = context.resolve(&value).unwrap();
        assert_eq!(
            resolved,
            json!({ "Ref": { "Ref": "A" }, "Att": { "Fn::GetAtt": ["B", "Arn"] } })
        );
    }

    #[test]
    fn test_unknown_reference_fails_with_origin() {
        let mut tokens = TokenRegistry::new();
        let reference = tokens.create(
            "Missing.Ref",
            TokenKind::Reference {
                target: ConstructPath::parse("/Missing/Resource"),
            },
        );
        let env = Environment::default();
        let context = ResolveContext::new("stack", &env, &tokens, &NoLogicalIds);
        match context.resolve(&Value::from(reference)) {
            Err(CoreError::TokenResolution { token, .. }) => assert!(token.starts_with("Missing.Ref#")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_string_interpolation_produces_join() {
        let mut tokens = TokenRegistry::new();
        let account = tokens.create("Account", TokenKind::Pseudo(PseudoParameter::AccountId));
        let region = tokens.create("Region", TokenKind::Pseudo(PseudoParameter::Region));
        let s = format!(
            "bucket-{}-{}",
            tokens.encode(&account),
            tokens.encode(&region)
        );

        let agnostic = Environment::default();
        let context = ResolveContext::new("stack", &agnostic, &tokens, &NoLogicalIds);
        assert_eq!(
            context.resolve(&Value::from(s.clone())).unwrap(),
            json!({ "Fn::Join": ["", [
                "bucket-",
                { "Ref": "AWS::AccountId" },
                "-",
                { "Ref": "AWS::Region" }
            ]] })
        );

        let concrete = Environment::new()
            .with_account("123456789012")
            .with_region("eu-west-1");
        let context = ResolveContext::new("stack", &concrete, &tokens, &NoLogicalIds);
        assert_eq!(
            context.resolve(&Value::from(s)).unwrap(),
            json!("bucket-123456789012-eu-west-1")
        );
    }

    #[test]
    fn test_concat_flattens_nested_joins() {
        let mut tokens = TokenRegistry::new();
        let region = tokens.create("Region", TokenKind::Pseudo(PseudoParameter::Region));
        let inner = Value::concat([Value::from("a-"), Value::from(&region)]);
        let outer = Value::concat([Value::from("x:"), inner, Value::from(":z")]);

        let env = Environment::default();
        let context = ResolveContext::new("stack", &env, &tokens, &NoLogicalIds);
        assert_eq!(
            context.resolve(&outer).unwrap(),
            json!({ "Fn::Join": ["", ["x:a-", { "Ref": "AWS::Region" }, ":z"]] })
        );
    }

    #[test]
    fn test_lazy_tokens_resolve_recursively() {
        let mut tokens = TokenRegistry::new();
        let region = tokens.create("Region", TokenKind::Pseudo(PseudoParameter::Region));
        let region_value = Value::from(&region);
        let lazy = tokens.create(
            "Lazy",
            TokenKind::lazy(move |_| Ok(Value::list([region_value.clone(), Value::from(3)]))),
        );

        let env = Environment::new().with_region("us-east-1");
        let lazy_again = lazy.clone();
        let context = ResolveContext::new("stack", &env, &tokens, &NoLogicalIds);
        let resolved = context.resolve(&Value::map([("Values", lazy)])).unwrap();
        assert_eq!(resolved, json!({ "Values": ["us-east-1", 3] }));
        assert_eq!(
            context.resolve(&Value::map([("Values", lazy_again)])).unwrap(),
            resolved
        );
    }

    #[test]
    fn test_lazy_error_carries_origin() {
        let mut tokens = TokenRegistry::new();
        let lazy = tokens.create(
            "Broken",
            TokenKind::lazy(|_| Err("boom".to_string())),
        );
        let env = Environment::default();
        let context = ResolveContext::new("stack", &env, &tokens, &NoLogicalIds);
        match context.resolve(&Value::from(lazy)) {
            Err(CoreError::TokenResolution { token, message }) => {
                assert!(token.starts_with("Broken#"));
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_self_referencing_token_is_circular() {
        let mut tokens = TokenRegistry::new();
        let slot: Arc<std::sync::OnceLock<Token>> = Arc::new(std::sync::OnceLock::new());
        let captured = slot.clone();
        let lazy = tokens.create(
            "Loop",
            TokenKind::lazy(move |_| {
                let me = captured.get().cloned().ok_or("unset")?;
                Ok(Value::list([Value::from(me)]))
            }),
        );
        slot.set(lazy.clone()).unwrap();

        let env = Environment::default();
        let context = ResolveContext::new("stack", &env, &tokens, &NoLogicalIds);
        match context.resolve(&Value::from(lazy)) {
            Err(CoreError::CircularTokenResolution { chain }) => {
                assert_eq!(chain.len(), 2);
                assert_eq!(chain[0], chain[1]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_depth_limit_is_circular() {
        let mut tokens = TokenRegistry::new();
        let mut current = Value::from("leaf");
        for i in 0..5 {
            let inner = current.clone();
            let token = tokens.create(
                format!("Level{}", i),
                TokenKind::lazy(move |_| Ok(inner.clone())),
            );
            current = Value::from(token);
        }

        let env = Environment::default();
        let context = ResolveContext::new("stack", &env, &tokens, &NoLogicalIds);
        assert_eq!(context.resolve(&current).unwrap(), json!("leaf"));

        let shallow = ResolveContext::new("stack", &env, &tokens, &NoLogicalIds).with_max_depth(3);
        assert!(matches!(
            shallow.resolve(&current),
            Err(CoreError::CircularTokenResolution { .. })
        ));
    }
}
