//! Output template model.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use strata_core::{Mapping, Parameter};

use crate::config::OutputFormat;
use crate::error::SynthResult;

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// A synthesized deployment template.
///
/// `resources` keeps emission order; every other section is keyed by name
/// and sorted, so equal templates always serialize to equal bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Parameter>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mappings: BTreeMap<String, Mapping>,

    #[serde(default)]
    pub resources: IndexMap<String, Json>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, TemplateOutput>,
}

/// A resolved entry of the `Outputs` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateOutput {
    pub value: Json,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<OutputExport>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OutputExport {
    pub name: Json,
}

impl Default for Template {
    fn default() -> Self {
        Self::new()
    }
}

impl Template {
    pub fn new() -> Self {
        Self {
            format_version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: None,
            parameters: BTreeMap::new(),
            mappings: BTreeMap::new(),
            resources: IndexMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Json> {
        self.resources.get(logical_id)
    }

    /// Logical IDs in emission order.
    pub fn logical_ids(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    /// Pretty-printed JSON with a trailing newline.
    pub fn to_json(&self) -> SynthResult<String> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }

    pub fn to_yaml(&self) -> SynthResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn render(&self, format: OutputFormat) -> SynthResult<String> {
        match format {
            OutputFormat::Json => self.to_json(),
            OutputFormat::Yaml => self.to_yaml(),
        }
    }

    pub fn from_json(content: &str) -> SynthResult<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_empty_sections_are_omitted() {
        let mut template = Template::new();
        template
            .resources
            .insert("Bucket".to_string(), json!({"Type": "AWS::S3::Bucket"}));

        let value: Json = serde_json::from_str(&template.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "AWSTemplateFormatVersion": "2010-09-09",
                "Resources": {"Bucket": {"Type": "AWS::S3::Bucket"}}
            })
        );
    }

    #[test]
    fn test_resources_keep_insertion_order() {
        let mut template = Template::new();
        for id in ["Zeta", "Alpha", "Mid"] {
            template
                .resources
                .insert(id.to_string(), json!({"Type": "Custom::Thing"}));
        }
        let text = template.to_json().unwrap();
        let zeta = text.find("\"Zeta\"").unwrap();
        let alpha = text.find("\"Alpha\"").unwrap();
        let mid = text.find("\"Mid\"").unwrap();
        assert!(zeta < alpha && alpha < mid);
        assert_eq!(template.logical_ids().collect::<Vec<_>>(), vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn test_output_export_shape() {
        let mut template = Template::new();
        template.outputs.insert(
            "VpcId".to_string(),
            TemplateOutput {
                value: json!({"Ref": "Vpc"}),
                description: Some("network".to_string()),
                export: Some(OutputExport {
                    name: json!("shared-vpc"),
                }),
                condition: None,
            },
        );
        let value: Json = serde_json::from_str(&template.to_json().unwrap()).unwrap();
        assert_eq!(
            value["Outputs"]["VpcId"],
            json!({
                "Value": {"Ref": "Vpc"},
                "Description": "network",
                "Export": {"Name": "shared-vpc"}
            })
        );
        let parsed = Template::from_json(&template.to_json().unwrap()).unwrap();
        assert_eq!(parsed, template);
    }

    #[test]
    fn test_yaml_rendering() {
        let template = Template::new();
        let yaml = template.render(OutputFormat::Yaml).unwrap();
        assert!(yaml.starts_with("AWSTemplateFormatVersion:"));
        let parsed: Template = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, template);
    }
}
