//! CloudFormation template model and rendering.

use crate::error::{Result, StackError};
use crate::resources::ResourceNode;
use apigw_bedrock_config::RemovalPolicy;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub const FORMAT_VERSION: &str = "2010-09-09";

/// Intrinsic function helpers.
pub mod intrinsic {
    use serde_json::{json, Value};

    pub fn reference(logical_id: &str) -> Value {
        json!({ "Ref": logical_id })
    }

    pub fn get_att(logical_id: &str, attribute: &str) -> Value {
        json!({ "Fn::GetAtt": [logical_id, attribute] })
    }

    pub fn join(separator: &str, parts: Vec<Value>) -> Value {
        json!({ "Fn::Join": [separator, parts] })
    }

    pub fn region() -> Value {
        reference("AWS::Region")
    }

    pub fn account_id() -> Value {
        reference("AWS::AccountId")
    }

    pub fn partition() -> Value {
        reference("AWS::Partition")
    }

    pub fn url_suffix() -> Value {
        reference("AWS::URLSuffix")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemplateFormat {
    #[default]
    Yaml,
    Json,
}

impl fmt::Display for TemplateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateFormat::Yaml => write!(f, "yaml"),
            TemplateFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for TemplateFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(TemplateFormat::Yaml),
            "json" => Ok(TemplateFormat::Json),
            other => Err(format!(
                "unsupported template format '{}'. Supported: yaml, json",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    #[serde(rename = "Type")]
    pub param_type: String,
    pub description: String,
}

impl Parameter {
    pub fn string(description: &str) -> Self {
        Self {
            param_type: "String".to_string(),
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceEntry {
    #[serde(rename = "Type")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Value::is_null")]
    pub properties: Value,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<String>,
}

impl From<&ResourceNode> for ResourceEntry {
    fn from(node: &ResourceNode) -> Self {
        let policy = node.deletion.map(|removal| match removal {
            RemovalPolicy::Destroy => "Delete".to_string(),
            RemovalPolicy::Retain => "Retain".to_string(),
        });
        Self {
            resource_type: node.resource_type.to_string(),
            properties: node.properties.clone(),
            depends_on: node.depends_on.clone(),
            deletion_policy: policy.clone(),
            update_replace_policy: policy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,

    pub description: String,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, Parameter>,

    pub resources: IndexMap<String, ResourceEntry>,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub outputs: IndexMap<String, Output>,
}

impl Template {
    pub fn new(description: &str) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            description: description.to_string(),
            parameters: IndexMap::new(),
            resources: IndexMap::new(),
            outputs: IndexMap::new(),
        }
    }

    pub fn add_resource(&mut self, node: &ResourceNode) -> Result<()> {
        if self.resources.contains_key(&node.logical_id) {
            return Err(StackError::DuplicateResource {
                logical_id: node.logical_id.clone(),
            });
        }
        self.resources
            .insert(node.logical_id.clone(), ResourceEntry::from(node));
        Ok(())
    }

    pub fn add_parameter(&mut self, name: &str, parameter: Parameter) {
        self.parameters.insert(name.to_string(), parameter);
    }

    pub fn add_output(&mut self, name: &str, value: Value, description: Option<&str>) {
        self.outputs.insert(
            name.to_string(),
            Output {
                value,
                description: description.map(str::to_string),
            },
        );
    }

    pub fn render(&self, format: TemplateFormat) -> Result<String> {
        match format {
            TemplateFormat::Json => self.render_json(),
            TemplateFormat::Yaml => self.render_yaml(),
        }
    }

    pub fn render_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| StackError::Render {
            format: "json",
            reason: e.to_string(),
        })
    }

    pub fn render_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| StackError::Render {
            format: "yaml",
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{Component, ResourceNode};
    use serde_json::json;

    fn node(id: &str) -> ResourceNode {
        ResourceNode::new(
            id,
            Component::AccessLogSink,
            "AWS::Logs::LogGroup",
            json!({ "LogGroupName": "x" }),
        )
    }

    #[test]
    fn test_entry_policies_follow_removal() {
        let entry = ResourceEntry::from(&node("Logs").deletion(RemovalPolicy::Destroy));
        assert_eq!(entry.deletion_policy.as_deref(), Some("Delete"));
        assert_eq!(entry.update_replace_policy.as_deref(), Some("Delete"));

        let entry = ResourceEntry::from(&node("Logs").deletion(RemovalPolicy::Retain));
        assert_eq!(entry.deletion_policy.as_deref(), Some("Retain"));
    }

    #[test]
    fn test_duplicate_resource_rejected() {
        let mut template = Template::new("t");
        template.add_resource(&node("Logs")).unwrap();
        let err = template.add_resource(&node("Logs")).unwrap_err();
        assert!(matches!(err, StackError::DuplicateResource { .. }));
    }

    #[test]
    fn test_render_formats() {
        let mut template = Template::new("t");
        template
            .add_resource(&node("Logs").depends_on(["Other"]))
            .unwrap();
        template.add_output("logGroup", intrinsic::reference("Logs"), None);

        let json: Value = serde_json::from_str(&template.render_json().unwrap()).unwrap();
        assert_eq!(json["AWSTemplateFormatVersion"], "2010-09-09");
        assert_eq!(json["Resources"]["Logs"]["DependsOn"], json!(["Other"]));
        assert_eq!(json["Outputs"]["logGroup"]["Value"], json!({ "Ref": "Logs" }));
        assert!(json.get("Parameters").is_none());

        let yaml = template.render(TemplateFormat::Yaml).unwrap();
        assert!(yaml.contains("AWS::Logs::LogGroup"));
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed["Description"], serde_yaml::Value::from("t"));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("YML".parse::<TemplateFormat>(), Ok(TemplateFormat::Yaml));
        assert_eq!("json".parse::<TemplateFormat>(), Ok(TemplateFormat::Json));
        assert!("xml".parse::<TemplateFormat>().is_err());
    }
}
