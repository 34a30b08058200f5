//! ordino server binary.
//!
//! Wires the bundled tools, the LLM planner, the orchestrator, and the
//! in-memory run store into the HTTP API and serves it.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use ordino_core::{ExecutionConfig, InMemoryRunStore, Orchestrator, ToolRegistry};
use ordino_http::{router, AppState};
use ordino_planner::LlmPlanner;
use ordino_tools::{Calculator, TodoStore};

#[derive(Parser, Debug)]
#[command(name = "ordino", version)]
#[command(about = "Agent runtime: prompts in, planned tool executions out")]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8000")]
    addr: String,

    /// Base URL of the Ollama-compatible chat API
    #[arg(long, default_value = "http://localhost:11434")]
    ollama_url: String,

    /// Model name to plan with
    #[arg(long, default_value = "gpt-oss")]
    model: String,

    /// Additional attempts after a step's first failure
    #[arg(long, default_value_t = 2)]
    max_retries: u32,

    /// Delay before the first retry, in milliseconds
    #[arg(long, default_value_t = 1000)]
    retry_delay_ms: u64,

    /// Multiplier applied to the retry delay after each failure
    #[arg(long, default_value_t = 2.0)]
    backoff_multiplier: f64,

    /// Per-attempt tool deadline, in seconds
    #[arg(long, default_value_t = 30)]
    step_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let env_filter = match "info".parse() {
        Ok(directive) => env_filter.add_directive(directive),
        Err(_) => env_filter,
    };
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();

    let cli = Cli::parse();

    let registry = Arc::new(
        ToolRegistry::new()
            .with_tool(Arc::new(Calculator))
            .with_tool(Arc::new(TodoStore::shared())),
    );

    let config = ExecutionConfig {
        max_retries: cli.max_retries,
        initial_retry_delay: Duration::from_millis(cli.retry_delay_ms),
        backoff_multiplier: cli.backoff_multiplier,
        step_timeout: Duration::from_secs(cli.step_timeout_secs),
    };

    let state = AppState {
        registry: registry.clone(),
        store: Arc::new(InMemoryRunStore::new()),
        planner: Arc::new(LlmPlanner::with_endpoint(
            registry.clone(),
            cli.ollama_url.clone(),
            cli.model.clone(),
        )),
        orchestrator: Arc::new(Orchestrator::new(registry.clone(), config)),
    };

    let app = router(state);

    tracing::info!(
        addr = %cli.addr,
        model = %cli.model,
        ollama_url = %cli.ollama_url,
        tools = registry.tool_names().join(", "),
        "starting ordino server"
    );

    let listener = tokio::net::TcpListener::bind(&cli.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown signal received");
    }
}
