//! Configuration loading from mcp-relay.toml.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use runtime::{OrchestratorConfig, Runtimes, ToolCallPolicy};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Provider scripts to connect to, in order.
    #[serde(default)]
    pub providers: Vec<String>,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub orchestrator: LoopConfig,

    #[serde(default)]
    pub connections: ConnectionsConfig,

    /// Extension → interpreter overrides, merged over the defaults.
    #[serde(default)]
    pub runtimes: BTreeMap<String, String>,
}

/// Chat backend configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Ollama base URL.
    #[serde(default = "default_host")]
    pub host: String,

    /// Model to use.
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout; unset means wait for inference to finish.
    pub request_timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            model: default_model(),
            request_timeout_secs: None,
        }
    }
}

/// Turn loop configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoopConfig {
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    #[serde(default)]
    pub tool_calls: ToolCallPolicy,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            tool_calls: ToolCallPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionsConfig {
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
}

impl Default for ConnectionsConfig {
    fn default() -> Self {
        Self {
            startup_timeout_secs: default_startup_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    runtime::DEFAULT_HOST.to_string()
}

fn default_model() -> String {
    runtime::DEFAULT_MODEL.to_string()
}

fn default_max_turns() -> u32 {
    runtime::DEFAULT_MAX_TURNS
}

fn default_startup_timeout_secs() -> u64 {
    runtime::DEFAULT_STARTUP_TIMEOUT.as_secs()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.orchestrator.max_turns == 0 {
            return Err(ConfigError::Invalid("orchestrator.max_turns must be at least 1".into()));
        }
        if self.connections.startup_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "connections.startup_timeout_secs must be at least 1".into(),
            ));
        }
        if let Some((ext, _)) = self.runtimes.iter().find(|(_, program)| program.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("runtimes.{ext} has an empty command")));
        }
        Ok(())
    }

    /// Default runtimes with configured overrides applied.
    pub fn runtimes(&self) -> Runtimes {
        self.runtimes
            .iter()
            .fold(Runtimes::default(), |runtimes, (ext, program)| runtimes.with(ext, program))
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            model: self.backend.model.clone(),
            max_turns: self.orchestrator.max_turns,
            tool_call_policy: self.orchestrator.tool_calls,
        }
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.connections.startup_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.backend.request_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}
