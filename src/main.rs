//! toolmesh CLI binary entry point.

use clap::Parser;
use toolmesh::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    toolmesh::cli::init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Chat(args) => toolmesh::cli::handle_chat(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
