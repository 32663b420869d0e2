use thiserror::Error;

use crate::backend::ModelError;

/// Errors surfaced by the orchestration runtime.
///
/// Failures the model can reason about (unknown tool, failing tool) are
/// normally folded into the conversation as tool-result text; they only
/// appear here when returned from a lower-level call such as
/// [`ToolRouter::resolve`](crate::ToolRouter::resolve).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bad or missing provider locator, or an invalid setting.
    #[error("config error: {0}")]
    Config(String),

    /// A provider could not be spawned or failed its handshake.
    #[error("failed to connect to provider {provider}: {message}")]
    Connection { provider: String, message: String },

    /// No connected provider advertises the requested tool.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// The provider ran the tool and reported a failure.
    #[error("tool {tool} failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// The provider's session died mid-conversation.
    #[error("provider {provider} is unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },

    /// The conversation exceeded the configured turn cap.
    #[error("conversation exceeded {0} turns without a final answer")]
    TooManyTurns(u32),

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, Error>;
