//! mcp-relay runtime: tool orchestration between a chat model and MCP
//! tool providers.
//!
//! # Overview
//!
//! - **ConnectionManager**: launches provider scripts, completes the MCP
//!   handshake, and releases every session on the way out.
//! - **ToolRouter**: maps each tool name to the connection that advertised
//!   it (first registration wins on collisions).
//! - **translate**: turns tool descriptors into function-calling specs.
//! - **Orchestrator**: runs the model ⇄ tool loop for one query at a time.
//!
//! # Example
//!
//! ```ignore
//! use runtime::{ConnectionManager, OllamaBackend, Orchestrator, OrchestratorConfig, Runtimes, StdioLauncher};
//!
//! # async fn example() -> runtime::Result<()> {
//! let backend = OllamaBackend::builder(runtime::DEFAULT_HOST).build()?;
//! let mut manager = ConnectionManager::new(StdioLauncher, Runtimes::default());
//! manager.connect_all(["servers/weather.py"]).await?;
//!
//! let orchestrator = Orchestrator::new(&backend, manager.connections(), OrchestratorConfig::default());
//! let outcome = orchestrator.process_query("Any weather alerts in CA?").await;
//! manager.release_all().await;
//! println!("{}", outcome?.answer);
//! # Ok(())
//! # }
//! ```

mod backend;
mod catalog;
mod connection;
mod error;
mod launch;
mod message;
mod orchestrator;
mod provider;
mod router;

#[cfg(test)]
mod testing;

pub use backend::{
    ChatBackend, ChatRequest, ChatResponse, DEFAULT_HOST, ModelError, OllamaBackend,
    OllamaBackendBuilder,
};
pub use catalog::{FunctionDefinition, FunctionSpec, ToolDescriptor, translate};
pub use connection::{ConnectionManager, DEFAULT_STARTUP_TIMEOUT, ProviderConnection, refresh_all};
pub use error::{Error, Result};
pub use launch::{LaunchCommand, Runtimes};
pub use message::{ArgumentsError, JsonObject, Message, ToolCallRequest, ToolInvocationResult};
pub use orchestrator::{
    DEFAULT_MAX_TURNS, DEFAULT_MODEL, Orchestrator, OrchestratorConfig, QueryOutcome,
    ToolCallPolicy,
};
pub use provider::{Launcher, ProviderSession, SessionError, StdioLauncher, StdioSession};
pub use router::{Collision, ToolRouter};
