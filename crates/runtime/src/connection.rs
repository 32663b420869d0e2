//! Provider connections and their lifecycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::catalog::ToolDescriptor;
use crate::launch::{LaunchCommand, Runtimes};
use crate::message::JsonObject;
use crate::provider::{Launcher, ProviderSession, SessionError};
use crate::{Error, Result};

/// Default bound on spawn + handshake + first `tools/list`.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// One connected tool provider.
pub struct ProviderConnection<S> {
    id: String,
    command: LaunchCommand,
    session: S,
    catalog: RwLock<Vec<ToolDescriptor>>,
    closed: AtomicBool,
}

impl<S: ProviderSession> ProviderConnection<S> {
    /// Wrap an initialized session and its first catalog.
    pub fn new(
        id: impl Into<String>,
        command: LaunchCommand,
        session: S,
        catalog: Vec<ToolDescriptor>,
    ) -> Self {
        Self {
            id: id.into(),
            command,
            session,
            catalog: RwLock::new(catalog),
            closed: AtomicBool::new(false),
        }
    }

    /// The locator this connection was opened from.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The command the provider process was started with.
    pub fn command(&self) -> &LaunchCommand {
        &self.command
    }

    /// Snapshot of the catalog as last fetched.
    pub async fn tool_catalog(&self) -> Vec<ToolDescriptor> {
        self.catalog.read().await.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Re-fetch the catalog, returning whether it changed.
    ///
    /// A provider that answers with an error keeps its previous catalog; only
    /// a dead transport is [`Error::ProviderUnavailable`].
    pub async fn refresh(&self) -> Result<bool> {
        self.ensure_open()?;
        let tools = match self.session.list_tools().await {
            Ok(tools) => tools,
            Err(SessionError::Tool(message)) => {
                warn!(
                    provider = %self.id,
                    error = %message,
                    "tool listing failed, keeping previous catalog"
                );
                return Ok(false);
            }
            Err(SessionError::Transport(message)) => return Err(self.unavailable(message)),
        };

        let mut catalog = self.catalog.write().await;
        if *catalog == tools {
            return Ok(false);
        }
        debug!(provider = %self.id, tools = tools.len(), "tool catalog changed");
        *catalog = tools;
        Ok(true)
    }

    /// Invoke a tool on this provider.
    ///
    /// Provider-reported failures map to [`Error::ToolExecution`]; a dead
    /// transport maps to [`Error::ProviderUnavailable`].
    pub async fn call_tool(&self, name: &str, arguments: JsonObject) -> Result<String> {
        self.ensure_open()?;
        self.session
            .call_tool(name, arguments)
            .await
            .map_err(|e| match e {
                SessionError::Tool(message) => Error::ToolExecution {
                    tool: name.to_string(),
                    message,
                },
                SessionError::Transport(message) => self.unavailable(message),
            })
    }

    /// Close the session. Only the first call reaches the provider.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(provider = %self.id, "closing provider session");
        self.session.close().await;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(self.unavailable("connection is closed"));
        }
        Ok(())
    }

    fn unavailable(&self, message: impl Into<String>) -> Error {
        Error::ProviderUnavailable {
            provider: self.id.clone(),
            message: message.into(),
        }
    }
}

/// Opens, tracks, and releases provider connections.
///
/// Connections are kept in the order they were opened; release runs in
/// reverse.
pub struct ConnectionManager<L: Launcher> {
    launcher: L,
    runtimes: Runtimes,
    startup_timeout: Duration,
    connections: Vec<Arc<ProviderConnection<L::Session>>>,
}

impl<L: Launcher> ConnectionManager<L> {
    pub fn new(launcher: L, runtimes: Runtimes) -> Self {
        Self {
            launcher,
            runtimes,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            connections: Vec::new(),
        }
    }

    /// Set the bound on launching and initializing a single provider.
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Open connections, in connect order.
    pub fn connections(&self) -> &[Arc<ProviderConnection<L::Session>>] {
        &self.connections
    }

    /// Launch one provider, complete the handshake, and fetch its catalog.
    pub async fn connect(&mut self, locator: &str) -> Result<Arc<ProviderConnection<L::Session>>> {
        let command = self.runtimes.resolve(locator)?;
        let connection_error = |message: String| Error::Connection {
            provider: locator.to_string(),
            message,
        };

        let (session, catalog) = tokio::time::timeout(self.startup_timeout, self.start(&command))
            .await
            .map_err(|_| {
                connection_error(format!(
                    "timed out after {}s waiting for {command}",
                    self.startup_timeout.as_secs_f32()
                ))
            })?
            .map_err(|e| connection_error(e.to_string()))?;

        let names: Vec<&str> = catalog.iter().map(|t| t.name.as_str()).collect();
        info!(provider = %locator, %command, tools = ?names, "connected to tool provider");

        let connection = Arc::new(ProviderConnection::new(locator, command, session, catalog));
        self.connections.push(Arc::clone(&connection));
        Ok(connection)
    }

    /// Connect to every locator in order.
    ///
    /// The first failure stops the sequence; connections opened so far are
    /// released before the error is returned.
    pub async fn connect_all<I>(&mut self, locators: I) -> Result<Vec<Arc<ProviderConnection<L::Session>>>>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut opened = Vec::new();
        for locator in locators {
            match self.connect(locator.as_ref()).await {
                Ok(connection) => opened.push(connection),
                Err(e) => {
                    warn!(provider = %locator.as_ref(), error = %e, "aborting provider startup");
                    self.release_all().await;
                    return Err(e);
                }
            }
        }
        Ok(opened)
    }

    /// Re-fetch every catalog, returning whether any changed.
    pub async fn refresh(&self) -> Result<bool> {
        refresh_all(&self.connections).await
    }

    /// Close every connection, last opened first. Safe to call repeatedly.
    pub async fn release_all(&mut self) {
        if self.connections.is_empty() {
            return;
        }
        info!(count = self.connections.len(), "releasing tool providers");
        while let Some(connection) = self.connections.pop() {
            connection.close().await;
        }
    }

    async fn start(
        &self,
        command: &LaunchCommand,
    ) -> std::result::Result<(L::Session, Vec<ToolDescriptor>), SessionError> {
        let session = self.launcher.launch(command).await?;
        match session.list_tools().await {
            Ok(catalog) => Ok((session, catalog)),
            Err(e) => {
                session.close().await;
                Err(e)
            }
        }
    }
}

/// Refresh each connection's catalog in order, returning whether any changed.
pub async fn refresh_all<S: ProviderSession>(connections: &[Arc<ProviderConnection<S>>]) -> Result<bool> {
    let mut changed = false;
    for connection in connections {
        changed |= connection.refresh().await?;
    }
    Ok(changed)
}
