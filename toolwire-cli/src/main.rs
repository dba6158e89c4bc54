//! Toolwire CLI - serves the tool protocol over stdio

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use toolwire_core::builtin::SystemActions;
use toolwire_core::config::ToolwireConfig;
use toolwire_core::mcp::{McpServer, McpTool};

#[derive(Parser)]
#[command(name = "toolwire")]
#[command(about = "Tool protocol runtime for AI agents", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (.toml, .yaml or .json)
    #[arg(short, long, global = true, env = "TOOLWIRE_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve JSON-RPC on stdin/stdout
    Serve,
    /// Print the tool catalog as JSON
    Tools,
    /// Print the effective configuration as JSON
    Config,
    /// Version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries protocol frames, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Version => {
            println!("toolwire {}", env!("CARGO_PKG_VERSION"));
            println!("toolwire-core {}", toolwire_core::VERSION);
        }
        Commands::Config => {
            let config = load_config(cli.config.as_ref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Tools => {
            let server = build_server(load_config(cli.config.as_ref())?).await?;
            let tools: Vec<McpTool> = server.registry().tools().into_iter().map(McpTool::from).collect();
            println!("{}", serde_json::to_string_pretty(&tools)?);
        }
        Commands::Serve => {
            let server = build_server(load_config(cli.config.as_ref())?).await?;
            let shutdown = server.shutdown_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupt received, shutting down");
                    shutdown.cancel();
                }
            });
            server.run_stdio().await.context("server stopped with an error")?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<ToolwireConfig> {
    let config = match path {
        Some(path) => ToolwireConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ToolwireConfig::load().context("failed to load configuration")?,
    };
    Ok(config)
}

async fn build_server(config: ToolwireConfig) -> Result<McpServer> {
    McpServer::builder()
        .config(config)
        .with_source(SystemActions)
        .build()
        .await
        .context("failed to assemble server")
}
