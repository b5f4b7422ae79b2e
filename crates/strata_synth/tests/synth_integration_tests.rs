//! Integration tests for template synthesis.

use std::fs;
use std::sync::Arc;

use serde_json::{json, Value as Json};
use strata_core::{
    Environment, GenericResourceType, Mapping, Output, Parameter, PseudoParameter, ResourceType, Stack,
    Value,
};
use strata_policy::{Severity, ViolationKind};
use strata_synth::{
    digest, AssemblyManifest, AssemblyWriter, OutputFormat, SynthConfig, SynthError, Synthesizer,
    MANIFEST_FILE_NAME,
};
use tempfile::tempdir;

fn generic(name: &str) -> Arc<dyn ResourceType> {
    Arc::new(GenericResourceType::new(name))
}

/// A network with a subnet and an app that references both.
fn network_stack() -> Stack {
    let mut stack = Stack::new("network").with_description("Test network");
    let mut root = stack.scope();
    let vpc = root
        .declare("Vpc", generic("AWS::EC2::VPC"), [("CidrBlock", Value::from("10.0.0.0/16"))])
        .unwrap();
    let vpc_ref = root.reference(&vpc);
    let mut subnets = root.child("Subnets").unwrap();
    let subnet = subnets
        .declare("Public", generic("AWS::EC2::Subnet"), [("VpcId", Value::from(vpc_ref))])
        .unwrap();

    let region = stack.pseudo(PseudoParameter::Region);
    let subnet_ref = stack.reference(&subnet);
    let name = format!("app-{}", stack.token_as_string(&region));
    let app = stack
        .scope()
        .declare(
            "App",
            generic("Custom::App"),
            [("Name", Value::from(name)), ("SubnetId", Value::from(subnet_ref))],
        )
        .unwrap();
    stack.add_dependency(&app, &vpc).unwrap();

    let vpc_ref = stack.reference(&vpc);
    stack
        .add_output(
            "VpcId",
            Output::new(vpc_ref)
                .with_description("The VPC")
                .with_export_name("shared-vpc"),
        )
        .unwrap();
    stack
}

#[test]
fn test_synthesis_is_byte_identical_across_runs() {
    let synthesizer = Synthesizer::default();
    let first = synthesizer.synthesize(&network_stack()).unwrap();
    let second = synthesizer.synthesize(&network_stack()).unwrap();
    assert_eq!(
        first.template.to_json().unwrap(),
        second.template.to_json().unwrap()
    );
}

#[test]
fn test_template_shape() {
    let output = Synthesizer::default().synthesize(&network_stack()).unwrap();
    let template: Json = serde_json::from_str(&output.template.to_json().unwrap()).unwrap();

    assert_eq!(template["AWSTemplateFormatVersion"], "2010-09-09");
    assert_eq!(template["Description"], "Test network");

    let ids: Vec<&str> = output.template.logical_ids().collect();
    assert_eq!(ids, vec!["Vpc", "SubnetsPublic", "App"]);

    let app = &template["Resources"]["App"];
    assert_eq!(app["DependsOn"], json!(["Vpc"]));
    assert_eq!(app["Properties"]["SubnetId"], json!({"Ref": "SubnetsPublic"}));
    assert_eq!(
        app["Properties"]["Name"],
        json!({"Fn::Join": ["", ["app-", {"Ref": "AWS::Region"}]]})
    );
    assert_eq!(app["Metadata"]["strata:path"], "network/App");
    assert!(template["Resources"]["SubnetsPublic"].get("DependsOn").is_none());

    assert_eq!(
        template["Outputs"]["VpcId"],
        json!({
            "Value": {"Ref": "Vpc"},
            "Description": "The VPC",
            "Export": {"Name": "shared-vpc"}
        })
    );
    assert!(!output.report.checks_run.is_empty());
}

#[test]
fn test_environment_makes_pseudo_values_concrete() {
    let stack = network_stack().with_environment(Environment::new().with_region("eu-west-1"));
    let config = SynthConfig::default().with_path_metadata(false);
    let output = Synthesizer::new(config).synthesize(&stack).unwrap();
    let app = output.template.resource("App").unwrap();
    assert_eq!(app["Properties"]["Name"], "app-eu-west-1");
    assert!(app.get("Metadata").is_none());
}

#[test]
fn test_three_cycle_blocks_emission() {
    let mut stack = Stack::new("cyclic");
    let paths: Vec<_> = ["A", "B", "C"]
        .iter()
        .map(|name| {
            stack
                .scope()
                .declare(name, generic("Custom::Node"), Vec::<(String, Value)>::new())
                .unwrap()
        })
        .collect();
    for i in 0..3 {
        let target = stack.reference(&paths[(i + 1) % 3]);
        stack
            .declaration_mut(&paths[i])
            .unwrap()
            .set_property("Next", target);
    }

    let err = Synthesizer::default().synthesize(&stack).unwrap_err();
    let report = err.report().expect("validation report");
    let cycles = report.of_kind(ViolationKind::CyclicDependency);
    assert_eq!(cycles.len(), 1);
    let cycle: Vec<String> = cycles[0]
        .cycle
        .as_ref()
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(cycle, vec!["/A", "/B", "/C", "/A"]);
}

#[test]
fn test_dangling_reference_severity_follows_config() {
    let build = || {
        let mut stack = Stack::new("dangling");
        let mut other = Stack::new("other");
        let foreign = other
            .scope()
            .declare("Elsewhere", generic("Custom::X"), Vec::<(String, Value)>::new())
            .unwrap();
        let token = stack.reference(&foreign);
        stack
            .scope()
            .declare("A", generic("Custom::A"), [("Target", Value::from(token))])
            .unwrap();
        stack
    };

    let lenient = Synthesizer::default().synthesize(&build());
    assert!(lenient.is_ok());
    assert_eq!(lenient.unwrap().report.summary.warnings, 1);

    let strict = Synthesizer::new(
        SynthConfig::default().with_dangling_references(Severity::Error),
    )
    .synthesize(&build());
    assert!(matches!(strict, Err(SynthError::ValidationFailed(_))));
}

#[test]
fn test_dangling_reference_does_not_alias_local_resource() {
    let mut stack = Stack::new("local");
    stack
        .scope()
        .declare("xVpc", generic("AWS::EC2::VPC"), Vec::<(String, Value)>::new())
        .unwrap();
    let mut other = Stack::new("other");
    let foreign = other
        .scope()
        .child("x")
        .unwrap()
        .declare("Vpc", generic("AWS::EC2::VPC"), Vec::<(String, Value)>::new())
        .unwrap();
    let token = stack.reference(&foreign);
    stack
        .scope()
        .declare("A", generic("Custom::A"), [("Target", Value::from(token))])
        .unwrap();

    let output = Synthesizer::default().synthesize(&stack).unwrap();
    assert_eq!(output.report.summary.warnings, 1);
    let ids: Vec<&str> = output.template.logical_ids().collect();
    assert_eq!(ids, vec!["A", "xVpc"]);

    let target = &output.template.resource("A").unwrap()["Properties"]["Target"]["Ref"];
    let target = target.as_str().unwrap();
    assert_ne!(target, "xVpc");
    assert!(target.starts_with("xVpc"));
    assert!(!ids.contains(&target));
}

#[test]
fn test_metadata_references_are_validated_and_ordered() {
    let build = || {
        let mut stack = Stack::new("meta");
        let mut other = Stack::new("other");
        let foreign = other
            .scope()
            .declare("Elsewhere", generic("Custom::X"), Vec::<(String, Value)>::new())
            .unwrap();
        let a = stack
            .scope()
            .declare("A", generic("Custom::A"), Vec::<(String, Value)>::new())
            .unwrap();
        let b = stack
            .scope()
            .declare("B", generic("Custom::B"), Vec::<(String, Value)>::new())
            .unwrap();
        let peer = stack.reference(&foreign);
        let owner = stack.reference(&b);
        stack
            .declaration_mut(&a)
            .unwrap()
            .add_metadata("Peer", peer)
            .add_metadata("Owner", owner);
        stack
    };

    let output = Synthesizer::default().synthesize(&build()).unwrap();
    let warnings = output.report.of_kind(ViolationKind::DanglingReference);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].severity, Severity::Warning);

    let ids: Vec<&str> = output.template.logical_ids().collect();
    assert_eq!(ids, vec!["B", "A"]);
    let metadata = &output.template.resource("A").unwrap()["Metadata"];
    assert_eq!(metadata["Owner"], json!({"Ref": "B"}));
    assert_eq!(metadata["Peer"], json!({"Ref": "Elsewhere"}));

    let strict = Synthesizer::new(
        SynthConfig::default().with_dangling_references(Severity::Error),
    )
    .synthesize(&build());
    assert!(matches!(strict, Err(SynthError::ValidationFailed(_))));
}

#[test]
fn test_token_depth_comes_from_config() {
    let mut stack = Stack::new("deep");
    let inner = stack.lazy("inner", |_| Ok(Value::from("leaf")));
    let outer = stack.lazy("outer", move |_| Ok(Value::from(inner.clone())));
    stack
        .scope()
        .declare("A", generic("Custom::A"), [("Deep", Value::from(outer))])
        .unwrap();

    let ok = Synthesizer::default().synthesize(&stack).unwrap();
    assert_eq!(ok.template.resource("A").unwrap()["Properties"]["Deep"], "leaf");

    let shallow = Synthesizer::new(SynthConfig::default().with_max_token_depth(1)).synthesize(&stack);
    assert!(matches!(shallow, Err(SynthError::Core(_))));
}

#[test]
fn test_parameters_and_mappings_are_emitted() {
    let mut stack = Stack::new("sections");
    let size = stack
        .add_parameter("Size", Parameter::string().with_default("small"))
        .unwrap();
    let mapping: Mapping = [(
        "us-east-1".to_string(),
        [("Ami".to_string(), json!("ami-123"))].into_iter().collect(),
    )]
    .into_iter()
    .collect();
    stack.add_mapping("Regions", mapping).unwrap();
    let region = stack.pseudo(PseudoParameter::Region);
    let ami = stack.find_in_map("Regions", region, "Ami");
    stack
        .scope()
        .declare(
            "Host",
            generic("Custom::Host"),
            [("Size", Value::from(size)), ("Image", Value::from(ami))],
        )
        .unwrap();

    let output = Synthesizer::default().synthesize(&stack).unwrap();
    let template: Json = serde_json::from_str(&output.template.to_json().unwrap()).unwrap();
    assert_eq!(template["Parameters"]["Size"], json!({"Type": "String", "Default": "small"}));
    assert_eq!(template["Mappings"]["Regions"]["us-east-1"]["Ami"], "ami-123");
    assert_eq!(
        template["Resources"]["Host"]["Properties"]["Image"],
        json!({"Fn::FindInMap": ["Regions", {"Ref": "AWS::Region"}, "Ami"]})
    );
}

#[test]
fn test_assembly_writes_template_and_manifest() {
    let stack = network_stack();
    let output = Synthesizer::default().synthesize(&stack).unwrap();
    let dir = tempdir().unwrap();

    let manifest_path = AssemblyWriter::new(dir.path()).write(&stack, &output).unwrap();
    assert_eq!(manifest_path, dir.path().join(MANIFEST_FILE_NAME));

    let manifest = AssemblyManifest::from_file(&manifest_path).unwrap();
    let artifact = manifest.stack("network").unwrap();
    assert_eq!(artifact.template_file, "network.template.json");
    assert_eq!(artifact.resource_count, 3);
    assert_eq!(artifact.validation, output.report.summary);

    let written = fs::read_to_string(dir.path().join(&artifact.template_file)).unwrap();
    assert_eq!(written, output.template.to_json().unwrap());
    assert_eq!(artifact.sha256, digest(written.as_bytes()));
}

#[test]
fn test_assembly_yaml_format() {
    let stack = network_stack();
    let output = Synthesizer::default().synthesize(&stack).unwrap();
    let dir = tempdir().unwrap();

    let artifact = AssemblyWriter::new(dir.path())
        .with_format(OutputFormat::Yaml)
        .write_stack(&stack, &output)
        .unwrap();
    assert_eq!(artifact.template_file, "network.template.yaml");
    let written = fs::read_to_string(dir.path().join(&artifact.template_file)).unwrap();
    assert!(written.contains("SubnetsPublic"));
}
