//! Chat backend abstraction.
//!
//! The orchestrator talks to the model through [`ChatBackend`]. Each call is
//! a single non-streaming round-trip.

mod ollama;

pub use ollama::{DEFAULT_HOST, OllamaBackend, OllamaBackendBuilder};

use std::future::Future;

use thiserror::Error;

use crate::catalog::FunctionSpec;
use crate::message::{Message, ToolCallRequest};

/// Everything needed for one model round-trip.
#[derive(Debug, Clone)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub tools: &'a [FunctionSpec],
}

/// The model's reply for one round-trip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ChatResponse {
    /// A final answer with no tool calls.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// A reply requesting tool calls.
    pub fn with_tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: String::new(),
            tool_calls,
        }
    }
}

/// Errors from backend calls.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// A network error occurred during the API call.
    #[error("network: {0}")]
    Network(String),

    /// The backend returned an error response.
    #[error("backend api: {0}")]
    Api(String),

    /// The backend response could not be parsed.
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),
}

/// Trait for chat backends.
pub trait ChatBackend: Send + Sync {
    fn chat(
        &self,
        request: ChatRequest<'_>,
    ) -> impl Future<Output = Result<ChatResponse, ModelError>> + Send;
}
