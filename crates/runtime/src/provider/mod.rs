//! Tool-provider sessions.
//!
//! A [`Launcher`] turns a [`LaunchCommand`] into a live, initialized
//! [`ProviderSession`]. The production pair speaks MCP over child-process
//! stdio via `rmcp`; tests substitute in-memory fakes.

mod stdio;

pub use stdio::{StdioLauncher, StdioSession};

use std::future::Future;

use thiserror::Error;

use crate::catalog::ToolDescriptor;
use crate::launch::LaunchCommand;
use crate::message::JsonObject;

/// Errors reported by a provider session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The provider executed the request and reported a failure.
    #[error("{0}")]
    Tool(String),

    /// The transport or process is gone; the session is unusable.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// An initialized session with one tool provider.
pub trait ProviderSession: Send + Sync {
    /// Fetch the provider's current tool catalog.
    fn list_tools(&self) -> impl Future<Output = Result<Vec<ToolDescriptor>, SessionError>> + Send;

    /// Invoke a tool and return its stringified output.
    fn call_tool(
        &self,
        name: &str,
        arguments: JsonObject,
    ) -> impl Future<Output = Result<String, SessionError>> + Send;

    /// Close the session and terminate the provider process.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Starts provider processes and performs the protocol handshake.
pub trait Launcher: Send + Sync {
    type Session: ProviderSession;

    fn launch(
        &self,
        command: &LaunchCommand,
    ) -> impl Future<Output = Result<Self::Session, SessionError>> + Send;
}
