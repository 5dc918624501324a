//! clusterd — the per-host cluster coordination daemon.
//!
//! Serves one node agent over HTTP. Orchestrators drive it with
//! `clusterctl` (or any HTTP client); other daemons reach it for
//! admission and announcements.
//!
//! # Usage
//!
//! ```text
//! clusterd run --config /etc/clusterd.toml --listen 0.0.0.0:8896
//! ```

mod config;
mod daemon;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::DaemonConfig;

#[derive(Parser)]
#[command(name = "clusterd", about = "Cluster coordination daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the node agent.
    Run {
        /// Path to clusterd.toml.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Address to listen on (overrides `server.listen`).
        #[arg(long)]
        listen: Option<SocketAddr>,

        /// Data directory for persistent state (overrides `storage.data_dir`).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,clusterd=debug,clusterd_node=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            listen,
            data_dir,
        } => {
            let mut settings = match config {
                Some(path) => DaemonConfig::from_file(&path)?,
                None => DaemonConfig::default(),
            };
            if let Some(listen) = listen {
                settings.server.listen = listen;
            }
            if let Some(data_dir) = data_dir {
                settings.storage.data_dir = data_dir;
            }
            daemon::run(settings).await
        }
    }
}
