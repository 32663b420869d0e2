mod config;
mod error;
mod shell;

use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use runtime::{
    ChatBackend, ConnectionManager, Launcher, OllamaBackend, Orchestrator, StdioLauncher,
    ToolCallPolicy,
};
use tokio::io::{AsyncBufRead, BufReader};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{Error, Result};

const CONFIG_FILE: &str = "mcp-relay.toml";

#[derive(Parser)]
#[command(name = "mcp-relay")]
#[command(about = "Chat with a local model that can call MCP tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Provider scripts to launch (.py or .js)
    providers: Vec<String>,

    /// Config file [default: mcp-relay.toml if present]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model name
    #[arg(short, long, env = "MCP_RELAY_MODEL")]
    model: Option<String>,

    /// Ollama base URL
    #[arg(long, env = "OLLAMA_HOST")]
    host: Option<String>,

    /// Maximum model round-trips per query
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_turns: Option<u32>,

    /// Which tool calls to run when the model asks for several (first, all)
    #[arg(long)]
    tool_calls: Option<ToolCallPolicy>,

    /// Log filter, e.g. "debug" or "runtime=trace" [default: RUST_LOG or info]
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Layer command-line values over the file.
    fn apply(self, mut config: Config) -> Config {
        if !self.providers.is_empty() {
            config.providers = self.providers;
        }
        if let Some(model) = self.model {
            config.backend.model = model;
        }
        if let Some(host) = self.host {
            config.backend.host = host;
        }
        if let Some(max_turns) = self.max_turns {
            config.orchestrator.max_turns = max_turns;
        }
        if let Some(policy) = self.tool_calls {
            config.orchestrator.tool_calls = policy;
        }
        config
    }
}

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    };
    // Stdin reads block a runtime thread that cannot be cancelled, so exit
    // without waiting for runtime shutdown.
    std::process::exit(code);
}

async fn run() -> Result<()> {
    let mut cli = Cli::parse();
    init_tracing(cli.log_level.take().as_deref());

    let config = cli.config.take();
    let config = cli.apply(load_config(config.as_deref())?);
    if config.providers.is_empty() {
        return Err(Error::NoProviders);
    }

    let mut builder = OllamaBackend::builder(&config.backend.host);
    if let Some(timeout) = config.request_timeout() {
        builder = builder.timeout(timeout);
    }
    let backend = builder.build()?;

    let mut manager = ConnectionManager::new(StdioLauncher, config.runtimes())
        .with_startup_timeout(config.startup_timeout());

    println!("mcp-relay v{}", env!("CARGO_PKG_VERSION"));
    println!("Model: {} via {backend}", config.backend.model);

    let stdin = BufReader::new(tokio::io::stdin());
    serve(
        &mut manager,
        &backend,
        &config,
        stdin,
        &mut io::stdout(),
        signal::ctrl_c(),
    )
    .await
}

/// Run a chat session until it ends or `interrupt` fires, then release every
/// provider.
async fn serve<L, B, R, W, I>(
    manager: &mut ConnectionManager<L>,
    backend: &B,
    config: &Config,
    input: R,
    output: &mut W,
    interrupt: I,
) -> Result<()>
where
    L: Launcher,
    B: ChatBackend,
    R: AsyncBufRead + Unpin,
    W: Write,
    I: Future<Output = io::Result<()>>,
{
    let outcome = tokio::select! {
        result = chat(&mut *manager, backend, config, input, &mut *output) => result,
        interrupted = interrupt => {
            info!("interrupted");
            interrupted.map_err(Error::from)
        }
    };

    manager.release_all().await;
    outcome
}

/// Connect every provider, then hand the terminal to the shell.
async fn chat<L, B, R, W>(
    manager: &mut ConnectionManager<L>,
    backend: &B,
    config: &Config,
    input: R,
    output: &mut W,
) -> Result<()>
where
    L: Launcher,
    B: ChatBackend,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    manager.connect_all(&config.providers).await?;

    for connection in manager.connections() {
        let names: Vec<_> = connection
            .tool_catalog()
            .await
            .into_iter()
            .map(|tool| tool.name)
            .collect();
        writeln!(output, "Connected to {} with tools: {}", connection.id(), names.join(", "))?;
    }

    let orchestrator = Orchestrator::new(backend, manager.connections(), config.orchestrator_config());
    let orchestrator = &orchestrator;

    shell::run(input, output, move |query| async move {
        orchestrator
            .process_query(&query)
            .await
            .map(|outcome| outcome.answer)
    })
    .await
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Explicit path must exist; otherwise fall back to ./mcp-relay.toml or defaults.
fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return Ok(Config::load(path)?);
    }

    let default_path = Path::new(CONFIG_FILE);
    if default_path.exists() {
        info!(path = CONFIG_FILE, "loading config");
        Ok(Config::load(default_path)?)
    } else {
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use runtime::{
        ChatRequest, ChatResponse, JsonObject, LaunchCommand, ModelError, ProviderSession,
        Runtimes, SessionError, ToolDescriptor,
    };
    use tokio::sync::oneshot;

    #[derive(Clone, Default)]
    struct CountingSession {
        closes: Arc<AtomicUsize>,
    }

    impl CountingSession {
        fn closes(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }

    impl ProviderSession for CountingSession {
        async fn list_tools(&self) -> std::result::Result<Vec<ToolDescriptor>, SessionError> {
            Ok(vec![ToolDescriptor::new(
                "get_time",
                "Current time",
                serde_json::json!({"type": "object"}),
            )])
        }

        async fn call_tool(
            &self,
            name: &str,
            _arguments: JsonObject,
        ) -> std::result::Result<String, SessionError> {
            Ok(format!("{name} ok"))
        }

        async fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct StubLauncher {
        sessions: HashMap<String, CountingSession>,
    }

    impl StubLauncher {
        fn provider(mut self, locator: &str, session: CountingSession) -> Self {
            self.sessions.insert(locator.to_string(), session);
            self
        }
    }

    impl Launcher for StubLauncher {
        type Session = CountingSession;

        async fn launch(
            &self,
            command: &LaunchCommand,
        ) -> std::result::Result<CountingSession, SessionError> {
            let locator = command.args.first().cloned().unwrap_or_default();
            self.sessions
                .get(&locator)
                .cloned()
                .ok_or_else(|| SessionError::Transport(format!("{locator}: no such file")))
        }
    }

    /// Signals when a chat starts, then never answers.
    struct StalledBackend {
        started: Mutex<Option<oneshot::Sender<()>>>,
    }

    impl StalledBackend {
        fn new() -> (Self, oneshot::Receiver<()>) {
            let (tx, rx) = oneshot::channel();
            (
                Self {
                    started: Mutex::new(Some(tx)),
                },
                rx,
            )
        }
    }

    impl ChatBackend for StalledBackend {
        async fn chat(
            &self,
            _request: ChatRequest<'_>,
        ) -> std::result::Result<ChatResponse, ModelError> {
            let started = self.started.lock().unwrap().take();
            if let Some(started) = started {
                let _ = started.send(());
            }
            std::future::pending().await
        }
    }

    fn two_providers() -> (Config, StubLauncher, CountingSession, CountingSession) {
        let config = Config::parse(r#"providers = ["time.py", "weather.js"]"#).unwrap();
        let time = CountingSession::default();
        let weather = CountingSession::default();
        let launcher = StubLauncher::default()
            .provider("time.py", time.clone())
            .provider("weather.js", weather.clone());
        (config, launcher, time, weather)
    }

    #[tokio::test]
    async fn interrupt_during_query_releases_every_provider() {
        let (config, launcher, time, weather) = two_providers();
        let mut manager = ConnectionManager::new(launcher, Runtimes::default());
        let (backend, started) = StalledBackend::new();
        let mut output = Vec::new();

        let interrupt = async {
            let _ = started.await;
            Ok::<(), io::Error>(())
        };
        serve(
            &mut manager,
            &backend,
            &config,
            "what time is it?\n".as_bytes(),
            &mut output,
            interrupt,
        )
        .await
        .unwrap();

        assert_eq!(time.closes(), 1);
        assert_eq!(weather.closes(), 1);
        assert!(manager.connections().is_empty());
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Connected to time.py with tools: get_time"));
    }

    #[tokio::test]
    async fn quitting_releases_every_provider() {
        let (config, launcher, time, weather) = two_providers();
        let mut manager = ConnectionManager::new(launcher, Runtimes::default());
        let (backend, _started) = StalledBackend::new();

        serve(
            &mut manager,
            &backend,
            &config,
            "quit\n".as_bytes(),
            &mut Vec::new(),
            std::future::pending::<io::Result<()>>(),
        )
        .await
        .unwrap();

        assert_eq!(time.closes(), 1);
        assert_eq!(weather.closes(), 1);
    }

    #[tokio::test]
    async fn failed_startup_releases_opened_providers() {
        let config = Config::parse(r#"providers = ["time.py", "missing.js"]"#).unwrap();
        let time = CountingSession::default();
        let launcher = StubLauncher::default().provider("time.py", time.clone());
        let mut manager = ConnectionManager::new(launcher, Runtimes::default());
        let (backend, _started) = StalledBackend::new();

        let err = serve(
            &mut manager,
            &backend,
            &config,
            "".as_bytes(),
            &mut Vec::new(),
            std::future::pending::<io::Result<()>>(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Runtime(runtime::Error::Connection { .. })));
        assert_eq!(time.closes(), 1);
    }

    #[test]
    fn command_line_overrides_file() {
        let file = Config::parse(
            r#"
            providers = ["from-file.py"]
            [backend]
            model = "file-model"
            host = "http://file:11434"
            "#,
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "mcp-relay",
            "a.py",
            "b.js",
            "--model",
            "cli-model",
            "--max-turns",
            "4",
            "--tool-calls",
            "all",
        ])
        .unwrap();
        let config = cli.apply(file);

        assert_eq!(config.providers, ["a.py", "b.js"]);
        assert_eq!(config.backend.model, "cli-model");
        assert_eq!(config.orchestrator.max_turns, 4);
        assert_eq!(config.orchestrator.tool_calls, ToolCallPolicy::All);
    }

    #[test]
    fn file_providers_kept_without_positional_args() {
        let file = Config::parse("providers = [\"weather.py\"]").unwrap();
        let cli = Cli::try_parse_from(["mcp-relay"]).unwrap();

        assert_eq!(cli.apply(file).providers, ["weather.py"]);
    }

    #[test]
    fn rejects_zero_turns_and_unknown_policy() {
        assert!(Cli::try_parse_from(["mcp-relay", "--max-turns", "0"]).is_err());
        assert!(Cli::try_parse_from(["mcp-relay", "--tool-calls", "some"]).is_err());
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(dir.path().join("nope.toml").as_path())).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
