use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stepgraph_core::config::AppConfig;
use stepgraph_core::types::{GraphDefinition, GraphId, GraphRun, GraphSpec, RunStatus};
use stepgraph_core::StateMap;
use stepgraph_engine::{ChannelSink, FanoutSink, JsonlSink, WorkflowEngine};
use stepgraph_gateway::GatewayServer;
use stepgraph_tools::workflows::summarization_graph;
use stepgraph_tools::ToolRegistry;

const DEFAULT_CONFIG: &str = "stepgraph.toml";

#[derive(Parser)]
#[command(name = "stepgraph", version, about = "Graph workflow engine over named tools")]
struct Cli {
    /// Path to config file (defaults apply when stepgraph.toml is absent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP/WebSocket gateway with the default graph registered
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<String>,
    },
    /// Run a graph once and print the finished run as JSON
    Run {
        /// Graph JSON file, or "default" for the built-in summarization graph
        #[arg(short, long, default_value = "default")]
        graph: String,
        /// Initial state as a JSON object
        #[arg(short, long, default_value = "{}")]
        state: String,
        /// Step bound (defaults to engine.default_max_steps)
        #[arg(long)]
        max_steps: Option<usize>,
        /// Write a JSONL step trace into this directory
        #[arg(long)]
        trace_dir: Option<PathBuf>,
        /// Print each step to stderr as it is recorded
        #[arg(long)]
        follow: bool,
    },
    /// List registered tools and their descriptions
    Tools,
    /// Print the built-in summarization graph as JSON
    Graph,
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(p) => AppConfig::load(p)?,
        None => AppConfig::load_or_default(Path::new(DEFAULT_CONFIG))?,
    };
    Ok(config)
}

fn load_graph(source: &str) -> anyhow::Result<GraphDefinition> {
    let spec: GraphSpec = if source == "default" {
        summarization_graph()
    } else {
        let content = std::fs::read_to_string(source)
            .map_err(|e| anyhow::anyhow!("cannot read graph file {}: {}", source, e))?;
        serde_json::from_str(&content)?
    };
    let graph = GraphDefinition::from_spec(GraphId::new(), spec)?;
    let unresolved = graph.unresolved_references();
    if !unresolved.is_empty() {
        warn!(?unresolved, "Graph references undefined nodes");
    }
    Ok(graph)
}

fn parse_state(raw: &str) -> anyhow::Result<StateMap> {
    match serde_json::from_str(raw)? {
        serde_json::Value::Object(map) => Ok(map),
        other => anyhow::bail!("initial state must be a JSON object, got {}", other),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("stepgraph=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "stepgraph", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    let registry = Arc::new(ToolRegistry::with_builtins());

    match cli.command {
        Commands::Serve { bind } => {
            let mut config = config;
            if let Some(bind) = bind {
                config.gateway.get_or_insert_with(Default::default).bind = bind;
            }

            let server = GatewayServer::new(&config, registry);
            let graph = server.register_graph(summarization_graph()).await?;
            info!(graph_id = %graph.id, name = %graph.name, "Default graph registered");

            let cancel = tokio_util::sync::CancellationToken::new();
            let cancel_clone = cancel.clone();

            // Graceful shutdown on Ctrl-C
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutting down gateway...");
                cancel_clone.cancel();
            });

            server.run(cancel).await?;
        }
        Commands::Run {
            graph,
            state,
            max_steps,
            trace_dir,
            follow,
        } => {
            let graph = load_graph(&graph)?;
            let initial_state = parse_state(&state)?;
            let max_steps = max_steps.unwrap_or(config.engine.default_max_steps);
            if max_steps < 1 {
                anyhow::bail!("--max-steps must be at least 1");
            }

            let mut sink = FanoutSink::new();
            if let Some(dir) = trace_dir.or_else(|| config.trace_dir()) {
                sink = sink.with(Arc::new(JsonlSink::new(dir)));
            }
            let mut printer = None;
            if follow {
                let (channel, mut rx) = ChannelSink::new(64);
                sink = sink.with(Arc::new(channel));
                printer = Some(tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        if let Ok(line) = serde_json::to_string(&event) {
                            eprintln!("{}", line);
                        }
                    }
                }));
            }

            let mut engine = WorkflowEngine::new(registry);
            if !sink.is_empty() {
                engine = engine.with_sink(Arc::new(sink));
            }

            let mut run = GraphRun::new(graph.id.clone(), initial_state);
            engine.run(&graph, &mut run, max_steps).await;

            // Dropping the engine closes the follow channel so the printer drains and exits
            drop(engine);
            if let Some(printer) = printer {
                printer.await.ok();
            }

            println!("{}", serde_json::to_string_pretty(&run)?);
            if run.status == RunStatus::Failed {
                std::process::exit(1);
            }
        }
        Commands::Tools => {
            for (name, description) in registry.list() {
                println!("{:<20} {}", name, description);
            }
        }
        Commands::Graph => {
            println!("{}", serde_json::to_string_pretty(&summarization_graph())?);
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Completions { .. } => unreachable!(),
    }

    Ok(())
}
