//! CLI entry point for toolmesh.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::client::ToolMeshClient;
use crate::config::MeshConfig;
use crate::driver::Termination;
use crate::error::Result;

/// toolmesh CLI
#[derive(Parser, Debug)]
#[command(name = "toolmesh", version, about = "Let a model call tools from REST and native backends")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer one prompt using every configured backend
    Chat(ChatArgs),
}

/// Arguments for the `chat` subcommand.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// TOML file listing backends (overrides TOOLMESH_CONFIG)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Model identifier, e.g. google/gemini-pro-1.5
    #[arg(short, long)]
    pub model: Option<String>,

    /// Maximum model calls before giving up
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Extra instructions appended to the system prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// User prompt
    pub prompt: String,
}

/// Install a `tracing` subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("toolmesh=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve configuration for a chat run: file, then environment, then flags.
pub fn load_config(args: &ChatArgs) -> Result<MeshConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let _ = dotenvy::dotenv();
            let mut config = MeshConfig::load(path)?;
            config.apply_overrides(|key| std::env::var(key).ok())?;
            config
        }
        None => MeshConfig::from_env()?,
    };
    if let Some(model) = &args.model {
        config.gateway.model = model.clone();
    }
    if let Some(max) = args.max_iterations {
        config.driver.max_iterations = max;
    }
    config.validate()?;
    Ok(config)
}

pub async fn handle_chat(args: ChatArgs) -> Result<()> {
    let config = load_config(&args)?;
    let mut client = ToolMeshClient::new(config)?;
    if let Some(system) = &args.system {
        client = client.with_instructions(system.clone());
    }

    client.initialize().await;
    let outcome = client.process_query(&args.prompt).await;
    client.close().await;
    let outcome = outcome?;

    println!("{}", outcome.answer);
    if outcome.termination == Termination::BudgetExhausted {
        eprintln!("(stopped after {} iterations)", outcome.iterations);
    }
    Ok(())
}
