//! MCP over child-process stdio, using the rmcp SDK.

use rmcp::{
    ServiceExt,
    model::{CallToolRequestParams, CallToolResult, RawContent},
    service::{Peer, RoleClient, RunningService, ServiceError},
    transport::{ConfigureCommandExt, TokioChildProcess},
};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Launcher, ProviderSession, SessionError};
use crate::catalog::ToolDescriptor;
use crate::launch::LaunchCommand;
use crate::message::JsonObject;

/// Spawns providers as child processes and completes the MCP handshake.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioLauncher;

impl Launcher for StdioLauncher {
    type Session = StdioSession;

    async fn launch(&self, command: &LaunchCommand) -> Result<StdioSession, SessionError> {
        let transport = TokioChildProcess::new(Command::new(&command.program).configure(|cmd| {
            cmd.args(&command.args).kill_on_drop(true);
        }))
        .map_err(|e| SessionError::Transport(format!("failed to spawn {command}: {e}")))?;

        // `serve` performs initialize + notifications/initialized.
        let service = ()
            .serve(transport)
            .await
            .map_err(|e| SessionError::Transport(format!("handshake failed: {e}")))?;

        if let Some(info) = service.peer_info() {
            debug!(
                server = %info.server_info.name,
                version = %info.server_info.version,
                "provider initialized"
            );
        }

        Ok(StdioSession {
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
        })
    }
}

/// A live MCP client session backed by a child process.
pub struct StdioSession {
    peer: Peer<RoleClient>,
    service: Mutex<Option<RunningService<RoleClient, ()>>>,
}

impl ProviderSession for StdioSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError> {
        let tools = self.peer.list_all_tools().await.map_err(session_error)?;
        Ok(tools.into_iter().map(ToolDescriptor::from).collect())
    }

    async fn call_tool(&self, name: &str, arguments: JsonObject) -> Result<String, SessionError> {
        let params = CallToolRequestParams {
            name: name.to_string().into(),
            arguments: Some(arguments),
            meta: None,
            task: None,
        };

        let result = self.peer.call_tool(params).await.map_err(session_error)?;

        let text = render_result(&result);
        if result.is_error.unwrap_or(false) {
            return Err(SessionError::Tool(text));
        }
        Ok(text)
    }

    async fn close(&self) {
        let Some(service) = self.service.lock().await.take() else {
            return;
        };
        if let Err(e) = service.cancel().await {
            warn!(error = %e, "provider session did not shut down cleanly");
        }
    }
}

/// A JSON-RPC error response comes from a live provider; anything else means
/// the session is gone.
fn session_error(e: ServiceError) -> SessionError {
    match e {
        ServiceError::McpError(data) => SessionError::Tool(data.message.to_string()),
        other => SessionError::Transport(other.to_string()),
    }
}

/// Flatten a tool result into text: text blocks verbatim, anything else as JSON.
fn render_result(result: &CallToolResult) -> String {
    result
        .content
        .iter()
        .map(|content| match &content.raw {
            RawContent::Text(text) => text.text.clone(),
            other => serde_json::to_string(other).unwrap_or_default(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
