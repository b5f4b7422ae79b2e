//! Integration tests for the construct tree and token engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use strata_core::{
    ConstructPath, CoreError, Environment, GenericResourceType, PseudoParameter, ResourceType,
    Stack, TokenRegistry, Value,
};

fn generic(type_name: &str) -> Arc<dyn ResourceType> {
    Arc::new(GenericResourceType::new(type_name))
}

fn contains_marker(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::String(s) => TokenRegistry::has_markers(s),
        serde_json::Value::Array(items) => items.iter().any(contains_marker),
        serde_json::Value::Object(map) => map.values().any(contains_marker),
        _ => false,
    }
}

#[test]
fn test_paths_are_stable_across_calls() {
    let mut stack = Stack::new("app");
    let mut scope = stack.scope();
    let mut network = scope.child("Network").unwrap();
    let vpc = network.child("Vpc").unwrap().node();

    let first = stack.tree().path(vpc).unwrap().clone();
    for _ in 0..3 {
        assert_eq!(stack.tree().path(vpc).unwrap(), &first);
    }
    assert_eq!(first, ConstructPath::parse("/Network/Vpc"));
}

#[test]
fn test_nested_tokens_resolve_without_residue() {
    let mut stack = Stack::new("app").with_environment(
        Environment::new()
            .with_account("123456789012")
            .with_region("us-gov-west-1"),
    );

    let mut scope = stack.scope();
    let bucket = scope
        .declare("Bucket", generic("AWS::S3::Bucket"), Vec::<(String, Value)>::new())
        .unwrap();

    let account = stack.pseudo(PseudoParameter::AccountId);
    let partition = stack.pseudo(PseudoParameter::Partition);
    let region = stack.pseudo(PseudoParameter::Region);
    let bucket_ref = stack.reference(&bucket);
    let name = format!(
        "{}-{}",
        stack.token_as_string(&account),
        stack.token_as_string(&region)
    );

    let value = Value::map([
        ("Name", Value::from(name)),
        (
            "Arn",
            Value::concat([
                Value::from("arn:"),
                Value::from(&partition),
                Value::from(":s3:::"),
                Value::from(&bucket_ref),
            ]),
        ),
        ("Nested", Value::list([Value::map([("Region", &region)])])),
    ]);

    let mut ids = BTreeMap::new();
    ids.insert(bucket.clone(), "Bucket".to_string());
    let context = stack.resolve_context(&ids);

    let resolved = context.resolve(&value).unwrap();
    assert!(!contains_marker(&resolved));
    assert_eq!(
        resolved,
        json!({
            "Name": "123456789012-us-gov-west-1",
            "Arn": { "Fn::Join": ["", ["arn:aws-us-gov:s3:::", { "Ref": "Bucket" }]] },
            "Nested": [{ "Region": "us-gov-west-1" }]
        })
    );
    assert_eq!(context.resolve(&value).unwrap(), resolved);
}

#[test]
fn test_foreign_marker_is_a_resolution_error() {
    let mut first = Stack::new("first");
    let mut second = Stack::new("second");
    for _ in 0..3 {
        second.pseudo(PseudoParameter::Region);
    }
    let foreign = second.pseudo(PseudoParameter::Region);
    let marker = second.token_as_string(&foreign);

    first.pseudo(PseudoParameter::Region);
    let context = first.resolve_context(&strata_core::NoLogicalIds);
    let result = context.resolve(&Value::from(format!("x-{}", marker)));
    assert!(matches!(result, Err(CoreError::TokenResolution { .. })));
}

#[test]
fn test_node_dependencies_are_recorded() {
    let mut stack = Stack::new("app");
    let mut scope = stack.scope();
    let db = scope.child("Db").unwrap().node();
    let mut app = scope.child("App").unwrap();
    app.depend_on(db).unwrap();
    let app = app.node();

    assert_eq!(stack.tree().node_dependencies(), vec![(app, db)]);
}
