//! In-memory fakes for provider sessions, launchers, and backends.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use crate::backend::{ChatBackend, ChatRequest, ChatResponse, ModelError};
use crate::catalog::ToolDescriptor;
use crate::connection::ProviderConnection;
use crate::launch::LaunchCommand;
use crate::message::{JsonObject, Message};
use crate::provider::{Launcher, ProviderSession, SessionError};

pub fn tool(name: &str) -> ToolDescriptor {
    ToolDescriptor::new(
        name,
        format!("{name} tool"),
        json!({"type": "object", "properties": {}}),
    )
}

pub fn launch_command(locator: &str) -> LaunchCommand {
    LaunchCommand {
        program: "python".into(),
        args: vec![locator.to_string()],
    }
}

/// A connection whose catalog is the session's current tool list.
pub fn connection(id: &str, session: FakeSession) -> Arc<ProviderConnection<FakeSession>> {
    let catalog = session.tools();
    Arc::new(ProviderConnection::new(id, launch_command(id), session, catalog))
}

#[derive(Default)]
struct SessionState {
    tools: Mutex<Vec<ToolDescriptor>>,
    responses: Mutex<HashMap<String, Result<String, SessionError>>>,
    catalog_updates: Mutex<HashMap<String, Vec<ToolDescriptor>>>,
    calls: Mutex<Vec<(String, JsonObject)>>,
    listing_error: Mutex<Option<SessionError>>,
    closes: AtomicUsize,
    close_log: Mutex<Option<(String, Arc<Mutex<Vec<String>>>)>>,
}

/// A provider session backed by shared in-memory state; clones share state.
#[derive(Clone, Default)]
pub struct FakeSession {
    state: Arc<SessionState>,
}

impl FakeSession {
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        let session = Self::default();
        session.set_tools(tools);
        session
    }

    pub fn tools(&self) -> Vec<ToolDescriptor> {
        self.state.tools.lock().unwrap().clone()
    }

    pub fn set_tools(&self, tools: Vec<ToolDescriptor>) {
        *self.state.tools.lock().unwrap() = tools;
    }

    /// Script the result of calling `tool`. Unscripted tools echo their name.
    pub fn respond(&self, tool: &str, result: Result<String, SessionError>) {
        self.state.responses.lock().unwrap().insert(tool.to_string(), result);
    }

    /// Replace the catalog when `tool` is called.
    pub fn on_call(&self, tool: &str, tools: Vec<ToolDescriptor>) {
        self.state
            .catalog_updates
            .lock()
            .unwrap()
            .insert(tool.to_string(), tools);
    }

    /// Fail every `list_tools` with `error` until cleared.
    pub fn fail_listing(&self, error: Option<SessionError>) {
        *self.state.listing_error.lock().unwrap() = error;
    }

    pub fn calls(&self) -> Vec<(String, JsonObject)> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    fn log_closes_to(&self, label: &str, log: Arc<Mutex<Vec<String>>>) {
        *self.state.close_log.lock().unwrap() = Some((label.to_string(), log));
    }
}

impl ProviderSession for FakeSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, SessionError> {
        if let Some(error) = self.state.listing_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.tools())
    }

    async fn call_tool(&self, name: &str, arguments: JsonObject) -> Result<String, SessionError> {
        self.state
            .calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments));

        if let Some(tools) = self.state.catalog_updates.lock().unwrap().remove(name) {
            self.set_tools(tools);
        }

        self.state
            .responses
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_else(|| Ok(format!("{name} ok")))
    }

    async fn close(&self) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        if let Some((label, log)) = self.state.close_log.lock().unwrap().as_ref() {
            log.lock().unwrap().push(label.clone());
        }
    }
}

/// Hands out pre-registered sessions keyed by locator.
#[derive(Clone, Default)]
pub struct FakeLauncher {
    sessions: HashMap<String, FakeSession>,
    delays: HashMap<String, Duration>,
    launched: Arc<Mutex<Vec<String>>>,
    closed: Arc<Mutex<Vec<String>>>,
}

impl FakeLauncher {
    pub fn provider(mut self, locator: &str, session: FakeSession) -> Self {
        session.log_closes_to(locator, Arc::clone(&self.closed));
        self.sessions.insert(locator.to_string(), session);
        self
    }

    /// Delay the handshake for `locator`.
    pub fn slow(mut self, locator: &str, delay: Duration) -> Self {
        self.delays.insert(locator.to_string(), delay);
        self
    }

    /// Commands launched so far, in order.
    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().unwrap().clone()
    }

    /// Locators whose sessions were closed, in order.
    pub fn closed(&self) -> Vec<String> {
        self.closed.lock().unwrap().clone()
    }
}

impl Launcher for FakeLauncher {
    type Session = FakeSession;

    async fn launch(&self, command: &LaunchCommand) -> Result<FakeSession, SessionError> {
        self.launched.lock().unwrap().push(command.to_string());
        let locator = command.args.first().cloned().unwrap_or_default();

        if let Some(delay) = self.delays.get(&locator) {
            tokio::time::sleep(*delay).await;
        }

        self.sessions
            .get(&locator)
            .cloned()
            .ok_or_else(|| SessionError::Transport(format!("{locator}: no such file")))
    }
}

/// What the backend was sent on one round-trip.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<String>,
}

/// Replies from a script, recording every request.
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<ChatResponse>>,
    repeat: Option<ChatResponse>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedBackend {
    pub fn new(replies: impl IntoIterator<Item = ChatResponse>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Reply with the same response forever.
    pub fn repeating(reply: ChatResponse) -> Self {
        Self {
            repeat: Some(reply),
            ..Self::new([])
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl ChatBackend for ScriptedBackend {
    async fn chat(&self, request: ChatRequest<'_>) -> Result<ChatResponse, ModelError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            model: request.model.to_string(),
            messages: request.messages.to_vec(),
            tools: request.tools.iter().map(|t| t.function.name.clone()).collect(),
        });

        let next = self.replies.lock().unwrap().pop_front();
        next.or_else(|| self.repeat.clone())
            .ok_or_else(|| ModelError::Api("script exhausted".into()))
    }
}
