//! Tool descriptors and their translation into backend function specs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// A tool as advertised by a provider's `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name, unique within one provider.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

impl From<rmcp::model::Tool> for ToolDescriptor {
    fn from(tool: rmcp::model::Tool) -> Self {
        Self {
            name: tool.name.to_string(),
            description: tool
                .description
                .map(|d| d.to_string())
                .unwrap_or_default(),
            input_schema: Value::Object(tool.input_schema.as_ref().clone()),
        }
    }
}

/// A function-calling entry in the shape the chat backend expects:
/// `{"type": "function", "function": {name, description, parameters}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl TryFrom<&ToolDescriptor> for FunctionSpec {
    type Error = String;

    fn try_from(tool: &ToolDescriptor) -> Result<Self, Self::Error> {
        if tool.name.is_empty() {
            return Err("tool name is empty".into());
        }
        if !tool.input_schema.is_object() {
            return Err(format!(
                "input schema must be a JSON object, got {}",
                tool.input_schema
            ));
        }

        Ok(Self {
            kind: "function".into(),
            function: FunctionDefinition {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.input_schema.clone(),
            },
        })
    }
}

/// Translate descriptors into function specs, one per descriptor, in order.
///
/// Descriptors with a malformed schema are dropped with a warning.
pub fn translate(tools: &[ToolDescriptor]) -> Vec<FunctionSpec> {
    tools
        .iter()
        .filter_map(|tool| match FunctionSpec::try_from(tool) {
            Ok(spec) => Some(spec),
            Err(reason) => {
                warn!(tool = %tool.name, %reason, "dropping malformed tool descriptor");
                None
            }
        })
        .collect()
}
