//! passrun-rpc
//!
//! Usage:
//!   passrun-rpc [--config <path>]
//!
//! The server communicates over stdio using JSON-RPC 2.0.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use passrun::MatchService;
use passrun_core::Config;
use passrun_rpc::RpcServer;

#[derive(Parser)]
#[command(name = "passrun-rpc")]
#[command(about = "JSON-RPC bridge between a desktop launcher and your password store")]
#[command(version)]
#[command(after_help = r#"METHODS:
    Match   {"query": "pass gh"}
    Actions {"matchId": "pass:work/github"}
    Run     {"matchId": "pass:work/github", "actionId": "copy"}
    Refresh
    ping

One JSON message per line on stdin; replies on stdout; logs on stderr.
"#)]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to stderr (stdout is for the protocol)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    tracing::info!("Starting passrun RPC server (store: {})", config.store_dir.display());

    let server = RpcServer::new(MatchService::from_config(config).await);
    server.run().await?;

    Ok(())
}
