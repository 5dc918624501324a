//! clusterctl — drive a clusterd daemon from the command line.
//!
//! ```text
//! clusterctl create '{"hostname":"cluster1","addresses":["10.0.0.1"]}'
//! clusterctl join <secret> '<descriptor>' '[<descriptor>, ...]'
//! clusterctl shutdown | destroy | diagnostics
//! ```

use std::process::ExitCode;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use tracing::debug;

use clusterd_node::{ClusterError, DaemonClient, parse_duration};

mod commands;

use commands::lifecycle;
use commands::output::Reply;

#[derive(Parser)]
#[command(
    name = "clusterctl",
    about = "clusterd — node membership coordination",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Daemon to talk to.
    #[arg(long, global = true, default_value = "127.0.0.1:8896")]
    daemon: String,

    /// Request timeout, e.g. "30s" or "500ms".
    #[arg(long, global = true, default_value = "30s", value_parser = parse_timeout)]
    timeout: Duration,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Found a cluster on the node; prints S(<secret>).
    Create {
        /// Node descriptor as JSON.
        descriptor: String,
    },
    /// Join the cluster the listed members belong to.
    Join {
        secret: String,
        /// Node descriptor as JSON.
        descriptor: String,
        /// JSON array of member descriptors.
        existing: String,
    },
    /// Stop serving cluster traffic.
    Shutdown,
    /// Leave the cluster. Succeeds when there is nothing to destroy.
    Destroy,
    /// Print the node's diagnostics.
    Diagnostics,
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
    parse_duration(s).ok_or_else(|| format!("{s:?} is not a duration"))
}

/// Failure marker for arguments clap refused.
fn usage_failure(err: &clap::Error) -> Reply {
    let rendered = err.to_string();
    let message = rendered
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("invalid arguments");
    let message = message.strip_prefix("error: ").unwrap_or(message);
    Reply::Failure(ClusterError::MalformedInput(message.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clusterctl=warn".parse()?),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            println!("{}", usage_failure(&e));
            return Ok(ExitCode::FAILURE);
        }
    };
    let client = DaemonClient::new(&cli.daemon, cli.timeout);
    debug!(daemon = %client.address(), timeout = ?cli.timeout, "using daemon");

    let reply = match cli.command {
        Commands::Create { descriptor } => lifecycle::create(&client, &descriptor).await,
        Commands::Join {
            secret,
            descriptor,
            existing,
        } => lifecycle::join(&client, &secret, &descriptor, &existing).await,
        Commands::Shutdown => lifecycle::shutdown(&client).await,
        Commands::Destroy => lifecycle::destroy(&client).await,
        Commands::Diagnostics => lifecycle::diagnostics(&client).await,
    };

    println!("{reply}");
    Ok(if reply.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
