//! Daemon assembly: state store, node agent, HTTP server.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use clusterd_node::{HttpPeerClient, NodeAgent, build_router};
use clusterd_state::StateStore;

use crate::config::DaemonConfig;

pub async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    info!("clusterd starting");

    std::fs::create_dir_all(&config.storage.data_dir).with_context(|| {
        format!("creating data dir {}", config.storage.data_dir.display())
    })?;
    let db_path = config.db_path();

    let store = StateStore::open(&db_path)?;
    let local = store.local()?;
    info!(path = ?db_path, state = %local.state, node_id = ?local.node_id, "state store opened");

    let peers = HttpPeerClient::new(config.join.peer_port, config.request_timeout()?);
    let agent = Arc::new(NodeAgent::new(store, peers, config.agent_config()?));
    let router = build_router(agent);

    let addr = config.server.listen;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "API server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("clusterd stopped");
    Ok(())
}
