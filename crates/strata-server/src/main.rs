use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use strata_server::{AppState, ServerConfig, StrataServer};

/// Content-addressed object server with closure-indexed subtree queries.
#[derive(Debug, Parser)]
#[command(name = "strata-server", version)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the bind address.
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Recompute digests for client-supplied ids and reject mismatches.
    #[arg(long)]
    verify_ids: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if args.verify_ids {
        config.verify_ids = true;
    }

    let server = StrataServer::new(AppState::in_memory(config));
    server.serve().await?;
    Ok(())
}
