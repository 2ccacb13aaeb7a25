//! Burrow CLI - serve a sandboxed workspace over MCP

use anyhow::{Context, Result};
use burrow_core::prelude::*;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "burrow")]
#[command(about = "Sandboxed workspace tool server", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file, merged after burrow.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the workspace tools over MCP on stdin/stdout
    Serve {
        /// Workspace root, overriding workspace.root
        #[arg(short, long)]
        workspace: Option<PathBuf>,
    },
    /// Print the tool catalogue
    Tools {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the protocol stream
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("burrow {}", env!("CARGO_PKG_VERSION"));
            println!("burrow-core {}", burrow_core::VERSION);
        }
        Commands::Tools { json } => {
            let config = BurrowConfig::load_with(cli.config.as_deref())?;
            print_tools(&config, json)?;
        }
        Commands::Serve { workspace } => {
            let mut config = BurrowConfig::load_with(cli.config.as_deref())?;
            if let Some(root) = workspace {
                config.workspace.root = root;
            }
            serve(config).await?;
        }
    }

    Ok(())
}

async fn serve(config: BurrowConfig) -> Result<()> {
    let root = config.workspace.expanded_root();
    let workspace = if config.workspace.create {
        Workspace::create(&root)
    } else {
        Workspace::open(&root)
    }
    .with_context(|| format!("Cannot use workspace {}", root.display()))?;

    info!(
        root = %workspace.root().display(),
        denied = %config.tools.policy().denied(),
        "Starting burrow MCP server"
    );

    let server = Arc::new(McpServer::for_workspace(&config, workspace)?);
    let mut transport = StdioTransport::new();

    tokio::select! {
        result = Arc::clone(&server).run(&mut transport) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, cancelling in-flight calls");
            server.shutdown();
        }
    }

    info!("Server stopped");
    Ok(())
}

fn print_tools(config: &BurrowConfig, json: bool) -> Result<()> {
    // Listing only needs a valid root, not the configured one
    let workspace = Workspace::open(std::env::current_dir()?)?;
    let runner = CommandRunner::new(
        Arc::new(workspace),
        ProcessRegistry::new(config.processes.log_tail_lines),
        config.runner.clone(),
    );

    let mut registry = builtin_registry(&runner)?;
    if let Some(allowlist) = &config.server.tool_allowlist {
        registry.retain(allowlist);
    }
    let policy = config.tools.policy();

    if json {
        println!("{}", serde_json::to_string_pretty(&registry.list())?);
        return Ok(());
    }

    for summary in registry.list() {
        let denied = summary
            .required_capabilities
            .iter()
            .any(|cap| policy.denied().iter().any(|d| d.as_str() == cap));
        println!(
            "{:<28} {:<40} {}{}",
            summary.name,
            summary.required_capabilities.join(","),
            summary.description,
            if denied { " [denied]" } else { "" }
        );
    }
    Ok(())
}
