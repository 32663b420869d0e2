//! The conversation turn loop.
//!
//! Each [`Orchestrator::process_query`] call owns a fresh history:
//!
//! 1. Refresh provider catalogs; rebuild routing if anything changed
//! 2. Send history + translated catalog to the backend
//! 3. No tool calls: return the content
//! 4. Otherwise dispatch the selected call(s) to their owning providers,
//!    append the results, and go again (up to `max_turns`)

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backend::{ChatBackend, ChatRequest};
use crate::catalog::translate;
use crate::connection::{ProviderConnection, refresh_all};
use crate::message::{JsonObject, Message, ToolCallRequest, ToolInvocationResult};
use crate::provider::ProviderSession;
use crate::router::ToolRouter;
use crate::{Error, Result};

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gpt-oss:20b";

/// Default cap on model round-trips per query.
pub const DEFAULT_MAX_TURNS: u32 = 25;

/// Which tool calls from a single model reply get dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallPolicy {
    /// Only the first requested call; the rest are not dispatched.
    #[default]
    First,
    /// Every requested call, sequentially, in request order.
    All,
}

impl std::str::FromStr for ToolCallPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "first" => Ok(Self::First),
            "all" => Ok(Self::All),
            other => Err(Error::Config(format!(
                "unknown tool call policy '{other}' (expected 'first' or 'all')"
            ))),
        }
    }
}

/// Settings for the turn loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub model: String,
    pub max_turns: u32,
    pub tool_call_policy: ToolCallPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_turns: DEFAULT_MAX_TURNS,
            tool_call_policy: ToolCallPolicy::default(),
        }
    }
}

/// Result of a completed query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    /// Final answer text, exactly as the model returned it.
    pub answer: String,
    /// The whole conversation, starting with the user query.
    pub history: Vec<Message>,
    /// Model round-trips taken.
    pub turns: u32,
}

/// Drives conversations between a chat backend and connected providers.
///
/// Holds no per-conversation state; concurrent `process_query` calls are
/// independent. The route table is shared and rebuilt only when a provider's
/// catalog changes.
pub struct Orchestrator<'a, B, S> {
    backend: &'a B,
    connections: &'a [Arc<ProviderConnection<S>>],
    config: OrchestratorConfig,
    router: Mutex<Option<Arc<ToolRouter<S>>>>,
}

impl<'a, B, S> Orchestrator<'a, B, S>
where
    B: ChatBackend,
    S: ProviderSession,
{
    pub fn new(
        backend: &'a B,
        connections: &'a [Arc<ProviderConnection<S>>],
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            backend,
            connections,
            config,
            router: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// The route table used by the most recent turn, if any.
    pub async fn routes(&self) -> Option<Arc<ToolRouter<S>>> {
        self.router.lock().await.clone()
    }

    /// Answer a user query, calling tools as the model requests them.
    pub async fn process_query(&self, query: &str) -> Result<QueryOutcome> {
        if self.config.max_turns == 0 {
            return Err(Error::Config("max_turns must be at least 1".into()));
        }

        let mut history = vec![Message::user(query)];

        for turn in 1..=self.config.max_turns {
            let changed = refresh_all(self.connections).await?;
            let router = self.router(changed).await;

            let tools = translate(router.aggregate_catalog());
            debug!(turn, messages = history.len(), tools = tools.len(), "awaiting model");

            let response = self
                .backend
                .chat(ChatRequest {
                    model: &self.config.model,
                    messages: &history,
                    tools: &tools,
                })
                .await?;

            if response.tool_calls.is_empty() {
                info!(turn, "model produced final answer");
                return Ok(QueryOutcome {
                    answer: response.content,
                    history,
                    turns: turn,
                });
            }

            let calls = self.select(response.tool_calls);
            history.push(Message::assistant(response.content, calls.clone()));

            for call in &calls {
                let result = self.dispatch(&router, call).await?;
                history.push(result.into());
            }
        }

        Err(Error::TooManyTurns(self.config.max_turns))
    }

    /// Reuse the shared route table unless a catalog changed.
    async fn router(&self, changed: bool) -> Arc<ToolRouter<S>> {
        let mut cached = self.router.lock().await;
        if !changed {
            if let Some(router) = cached.as_ref() {
                return Arc::clone(router);
            }
        }

        let router = match cached.as_deref() {
            Some(previous) => previous.rebuild(self.connections).await,
            None => ToolRouter::build(self.connections).await,
        };
        let router = Arc::new(router);
        *cached = Some(Arc::clone(&router));
        router
    }

    fn select(&self, mut calls: Vec<ToolCallRequest>) -> Vec<ToolCallRequest> {
        match self.config.tool_call_policy {
            ToolCallPolicy::All => calls,
            ToolCallPolicy::First => {
                if calls.len() > 1 {
                    let skipped: Vec<_> = calls[1..].iter().map(|c| c.name.as_str()).collect();
                    debug!(?skipped, "dispatching only the first tool call this turn");
                }
                calls.truncate(1);
                calls
            }
        }
    }

    /// Run one tool call on the connection that owns it.
    ///
    /// Unknown tools and tool failures come back as result text so the model
    /// can react; only a dead provider is an error.
    async fn dispatch(
        &self,
        router: &ToolRouter<S>,
        call: &ToolCallRequest,
    ) -> Result<ToolInvocationResult> {
        let arguments = call.arguments().unwrap_or_else(|e| {
            warn!(tool = %call.name, raw = %call.raw_arguments, error = %e, "using empty arguments");
            JsonObject::new()
        });

        let outcome = match router.resolve(&call.name) {
            Ok(connection) => {
                info!(tool = %call.name, provider = %connection.id(), "calling tool");
                connection.call_tool(&call.name, arguments).await
            }
            Err(e) => Err(e),
        };

        let content = match outcome {
            Ok(output) => output,
            Err(e @ (Error::UnknownTool(_) | Error::ToolExecution { .. })) => {
                warn!(tool = %call.name, error = %e, "tool call failed");
                format!("Error: {e}")
            }
            Err(e) => return Err(e),
        };

        Ok(ToolInvocationResult {
            tool_name: call.name.clone(),
            content,
        })
    }
}
