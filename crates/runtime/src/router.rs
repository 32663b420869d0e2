//! Tool name → owning connection routing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::warn;

use crate::catalog::ToolDescriptor;
use crate::connection::ProviderConnection;
use crate::provider::ProviderSession;
use crate::{Error, Result};

/// A tool name advertised by more than one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub tool: String,
    /// Provider that keeps the route (registered first).
    pub kept: String,
    /// Provider whose copy is hidden.
    pub shadowed: String,
}

/// Routes tool calls to the connection that advertised the tool.
///
/// On name collisions the first-registered connection wins; later copies
/// are left out of [`aggregate_catalog`](Self::aggregate_catalog) so the
/// model never sees duplicates.
pub struct ToolRouter<S> {
    routes: HashMap<String, Arc<ProviderConnection<S>>>,
    catalog: Vec<ToolDescriptor>,
    collisions: Vec<Collision>,
    // Names already warned about, carried across rebuilds.
    reported: HashSet<String>,
}

impl<S> Default for ToolRouter<S> {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
            catalog: Vec::new(),
            collisions: Vec::new(),
            reported: HashSet::new(),
        }
    }
}

impl<S: ProviderSession> ToolRouter<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a router by registering each connection in order.
    pub async fn build(connections: &[Arc<ProviderConnection<S>>]) -> Self {
        let mut router = Self::new();
        for connection in connections {
            router.register(connection).await;
        }
        router
    }

    /// Build a fresh router from the current catalogs.
    ///
    /// Collisions this router already warned about are recorded again but
    /// not logged again.
    pub async fn rebuild(&self, connections: &[Arc<ProviderConnection<S>>]) -> Self {
        let mut router = Self {
            reported: self.reported.clone(),
            ..Self::default()
        };
        for connection in connections {
            router.register(connection).await;
        }
        router
    }

    /// Merge a connection's catalog into the route table.
    pub async fn register(&mut self, connection: &Arc<ProviderConnection<S>>) {
        for tool in connection.tool_catalog().await {
            if let Some(owner) = self.routes.get(&tool.name) {
                if !self.collisions.iter().any(|c| c.tool == tool.name) {
                    if self.reported.insert(tool.name.clone()) {
                        warn!(
                            tool = %tool.name,
                            kept = %owner.id(),
                            shadowed = %connection.id(),
                            "tool name advertised by multiple providers; first registration wins"
                        );
                    }
                    self.collisions.push(Collision {
                        tool: tool.name.clone(),
                        kept: owner.id().to_string(),
                        shadowed: connection.id().to_string(),
                    });
                }
                continue;
            }

            self.routes.insert(tool.name.clone(), Arc::clone(connection));
            self.catalog.push(tool);
        }
    }

    /// Find the connection that owns `tool_name`.
    pub fn resolve(&self, tool_name: &str) -> Result<&Arc<ProviderConnection<S>>> {
        self.routes
            .get(tool_name)
            .ok_or_else(|| Error::UnknownTool(tool_name.to_string()))
    }

    /// Routed tools, in registration order.
    pub fn aggregate_catalog(&self) -> &[ToolDescriptor] {
        &self.catalog
    }

    pub fn collisions(&self) -> &[Collision] {
        &self.collisions
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }
}
