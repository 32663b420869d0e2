//! Ollama chat backend (`POST /api/chat`).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{ChatBackend, ChatRequest, ChatResponse, ModelError};
use crate::catalog::FunctionSpec;
use crate::message::{JsonObject, Message, ToolCallRequest};

/// Default Ollama endpoint.
pub const DEFAULT_HOST: &str = "http://localhost:11434";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    tools: &'a [FunctionSpec],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ApiToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    function: ApiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<ApiToolCall>,
}

impl From<&Message> for ApiMessage {
    fn from(message: &Message) -> Self {
        match message {
            Message::User { content } => Self {
                role: "user",
                content: content.clone(),
                tool_calls: Vec::new(),
                tool_name: None,
            },
            Message::Assistant { content, tool_calls } => Self {
                role: "assistant",
                content: content.clone(),
                tool_calls: tool_calls.iter().map(ApiToolCall::from).collect(),
                tool_name: None,
            },
            Message::ToolResult { tool_name, content } => Self {
                role: "tool",
                content: content.clone(),
                tool_calls: Vec::new(),
                tool_name: Some(tool_name.clone()),
            },
        }
    }
}

impl From<&ToolCallRequest> for ApiToolCall {
    fn from(call: &ToolCallRequest) -> Self {
        // Ollama expects an object here; send what was actually dispatched.
        let arguments = call.arguments().unwrap_or_else(|_| JsonObject::new());
        Self {
            function: ApiFunctionCall {
                name: call.name.clone(),
                arguments: Value::Object(arguments),
            },
        }
    }
}

impl From<ApiToolCall> for ToolCallRequest {
    fn from(call: ApiToolCall) -> Self {
        let raw_arguments = match call.function.arguments {
            Value::String(raw) => raw,
            Value::Null => String::new(),
            other => other.to_string(),
        };
        ToolCallRequest::new(call.function.name, raw_arguments)
    }
}

impl From<ApiResponse> for ChatResponse {
    fn from(response: ApiResponse) -> Self {
        Self {
            content: response.message.content,
            tool_calls: response
                .message
                .tool_calls
                .into_iter()
                .map(ToolCallRequest::from)
                .collect(),
        }
    }
}

/// Builder for creating an Ollama backend.
#[derive(Debug, Clone)]
pub struct OllamaBackendBuilder {
    host: String,
    timeout: Option<Duration>,
}

impl OllamaBackendBuilder {
    /// Create a new builder for the given host (e.g. `http://localhost:11434`).
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            timeout: None,
        }
    }

    /// Bound each chat round-trip. Inference can be slow; unbounded by default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the backend.
    pub fn build(self) -> Result<OllamaBackend, ModelError> {
        let mut client = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            client = client.timeout(timeout);
        }
        let client = client
            .build()
            .map_err(|e| ModelError::Network(e.to_string()))?;

        Ok(OllamaBackend {
            client,
            chat_url: format!("{}/api/chat", self.host.trim_end_matches('/')),
        })
    }
}

/// Ollama HTTP backend.
pub struct OllamaBackend {
    client: reqwest::Client,
    chat_url: String,
}

impl OllamaBackend {
    /// Create a builder for the Ollama backend.
    pub fn builder(host: impl Into<String>) -> OllamaBackendBuilder {
        OllamaBackendBuilder::new(host)
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }
}

impl std::fmt::Display for OllamaBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ollama({})", self.chat_url)
    }
}

impl ChatBackend for OllamaBackend {
    async fn chat(&self, request: ChatRequest<'_>) -> Result<ChatResponse, ModelError> {
        let api_request = ApiRequest {
            model: request.model,
            messages: request.messages.iter().map(ApiMessage::from).collect(),
            tools: request.tools,
            stream: false,
        };
        debug!(
            model = request.model,
            messages = api_request.messages.len(),
            tools = request.tools.len(),
            "sending chat request"
        );

        let response = self
            .client
            .post(&self.chat_url)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        Ok(api_response.into())
    }
}
