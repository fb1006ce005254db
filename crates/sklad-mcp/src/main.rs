//! Sklad MCP Server
//!
//! Builds a demo server from an optional configuration file, logs the
//! components it exposes and optionally runs one tool call.

#![warn(clippy::all)]
#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::{Context as _, Result};
use clap::Parser;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use sklad_core::component::{IDEMPOTENT_HINT, READ_ONLY_HINT};
use sklad_core::{Callable, Component, ComponentKind, ServerConfig, Signature, ToolError};
use sklad_mcp::{HandlerCatalog, LoggingMiddleware, Server, ServerTools, ToolRegistry};

/// Sklad MCP server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "SKLAD_CONFIG")]
    config: Option<PathBuf>,

    /// Tool to call once the server is built
    #[arg(long)]
    call: Option<String>,

    /// JSON arguments for --call
    #[arg(long, default_value = "{}")]
    args: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AddArgs {
    /// First operand
    a: i64,
    /// Second operand
    b: i64,
}

/// State owned by the counter tool.
#[derive(Debug, Default)]
struct Counter {
    value: AtomicI64,
}

fn calculator() -> Server {
    let server = Server::new("calculator");
    let add = Component::tool(
        "add",
        Callable::typed(|args: AddArgs, _ctx| async move { Ok::<_, ToolError>(args.a + args.b) }),
    )
    .with_description("Add two integers")
    .with_signature(Signature::of::<AddArgs>())
    .with_annotation(READ_ONLY_HINT, true)
    .with_annotation(IDEMPOTENT_HINT, true);

    if let Err(e) = server.register(add) {
        tracing::error!(error = %e, "failed to register add");
    }
    server
}

fn counter_tool(counter: Arc<Counter>) -> Component {
    Component::tool(
        "increment",
        Callable::from_blocking(move |_args, _ctx| {
            let value = counter.value.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(json!(value))
        }),
    )
    .with_description("Increment the shared counter")
    .with_signature(Signature::new(Vec::new()))
}

fn handlers(counter: &Arc<Counter>) -> HandlerCatalog {
    let counter = Arc::clone(counter);
    HandlerCatalog::new().with(
        "counter.read",
        Callable::from_blocking(move |_args, _ctx| Ok(json!(counter.value.load(Ordering::SeqCst)))),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sklad=debug".into()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ServerConfig::default(),
    };

    let counter = Arc::new(Counter::default());
    let server = Server::from_config(&config, handlers(&counter))?.with_health_tool()?;
    server.register(counter_tool(Arc::clone(&counter)))?;
    server.add_middleware(LoggingMiddleware::new());
    server.mount(calculator(), Some("math"))?;

    tracing::info!(
        name = %server.name(),
        version = %server.version(),
        providers = ?server.provider_names(),
        "server ready"
    );
    for kind in ComponentKind::ALL {
        for component in server.list(kind)? {
            tracing::info!(%kind, name = %component.name(), "exposed");
        }
    }

    if let Some(tool) = &args.call {
        let arguments: Value = serde_json::from_str(&args.args).context("parsing --args")?;
        let tools = ServerTools::new(server);
        let Some(call) = tools.call(tool, arguments) else {
            anyhow::bail!("unknown tool: {tool}");
        };
        let result = call.await.map_err(|e| anyhow::anyhow!(e.message))?;
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    Ok(())
}
