//! Conversation messages and tool-call types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tool arguments as a JSON object.
pub type JsonObject = Map<String, Value>;

/// A message in a conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    ToolResult {
        tool_name: String,
        content: String,
    },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn tool_result(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_name: tool_name.into(),
            content: content.into(),
        }
    }

    /// Text content of the message.
    pub fn content(&self) -> &str {
        match self {
            Self::User { content }
            | Self::Assistant { content, .. }
            | Self::ToolResult { content, .. } => content,
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    /// Arguments exactly as the model encoded them.
    pub raw_arguments: String,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, raw_arguments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_arguments: raw_arguments.into(),
        }
    }

    /// Decode the raw arguments into a JSON object.
    ///
    /// Blank input decodes to an empty object. Anything that is not a JSON
    /// object is an error; callers decide how lenient to be.
    pub fn arguments(&self) -> Result<JsonObject, ArgumentsError> {
        let raw = self.raw_arguments.trim();
        if raw.is_empty() {
            return Ok(JsonObject::new());
        }

        match serde_json::from_str(raw)? {
            Value::Object(map) => Ok(map),
            other => Err(ArgumentsError::NotAnObject(json_kind(&other))),
        }
    }
}

/// Why a tool call's arguments could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum ArgumentsError {
    #[error("arguments are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("arguments must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// The stringified output of one tool execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocationResult {
    pub tool_name: String,
    pub content: String,
}

impl From<ToolInvocationResult> for Message {
    fn from(result: ToolInvocationResult) -> Self {
        Message::tool_result(result.tool_name, result.content)
    }
}
