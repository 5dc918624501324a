//! The five node commands, run against any [`ClusterAgent`].

use serde::de::DeserializeOwned;
use tracing::debug;

use clusterd_node::{ClusterAgent, ClusterError, ClusterResult, Secret};
use clusterd_state::NodeDescriptor;

use super::output::Reply;

fn parse_json<T: DeserializeOwned>(what: &str, raw: &str) -> ClusterResult<T> {
    serde_json::from_str(raw).map_err(|e| ClusterError::MalformedInput(format!("{what}: {e}")))
}

fn reply<T>(result: ClusterResult<T>, ok: impl FnOnce(T) -> Reply) -> Reply {
    match result {
        Ok(value) => ok(value),
        Err(e) => {
            debug!(error = %e, "command failed");
            Reply::Failure(e)
        }
    }
}

/// `create '<descriptor>'`
pub async fn create<A: ClusterAgent>(agent: &A, descriptor: &str) -> Reply {
    let result = async {
        let descriptor: NodeDescriptor = parse_json("descriptor", descriptor)?;
        agent.create(descriptor).await
    }
    .await;
    reply(result, |secret| Reply::Secret(secret.expose().to_string()))
}

/// `join <secret> '<descriptor>' '<existing>'`
pub async fn join<A: ClusterAgent>(agent: &A, secret: &str, descriptor: &str, existing: &str) -> Reply {
    let result = async {
        let descriptor: NodeDescriptor = parse_json("descriptor", descriptor)?;
        let existing: Vec<NodeDescriptor> = parse_json("existing members", existing)?;
        agent.join(Secret::new(secret), descriptor, existing).await
    }
    .await;
    reply(result, |()| Reply::Null)
}

pub async fn shutdown<A: ClusterAgent>(agent: &A) -> Reply {
    reply(agent.shutdown().await, |()| Reply::Null)
}

pub async fn destroy<A: ClusterAgent>(agent: &A) -> Reply {
    reply(agent.destroy().await, |()| Reply::Null)
}

pub async fn diagnostics<A: ClusterAgent>(agent: &A) -> Reply {
    reply(agent.diagnostics().await, |diag| Reply::Text(diag.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use clusterd_node::{AgentConfig, ErrorKind, LocalNetwork, NodeAgent, parse_local_node_id};
    use clusterd_state::StateStore;

    use super::*;

    fn node(net: &LocalNetwork, n: u32) -> Arc<NodeAgent<LocalNetwork>> {
        let store = StateStore::open_in_memory().unwrap();
        let agent = Arc::new(NodeAgent::new(store, net.clone(), AgentConfig::default()));
        net.register(format!("10.0.0.{n}"), agent.clone());
        agent
    }

    fn desc_json(n: u32) -> String {
        format!(r#"{{"hostname":"cluster{n}","addresses":["10.0.0.{n}"]}}"#)
    }

    fn failure_kind(reply: &Reply) -> Option<ErrorKind> {
        match reply {
            Reply::Failure(e) => Some(e.kind()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn create_join_and_read_node_id() {
        let net = LocalNetwork::new();
        let a = node(&net, 1);
        let b = node(&net, 2);

        let out = create(a.as_ref(), &desc_json(1)).await.to_string();
        assert!(out.starts_with("S("));
        let secret = &out[2..out.len() - 1];

        let existing = format!("[{}]", desc_json(1));
        let out = join(b.as_ref(), secret, &desc_json(2), &existing).await;
        assert_eq!(out, Reply::Null);

        let text = diagnostics(b.as_ref()).await.to_string();
        let id = parse_local_node_id(&text).unwrap();
        assert_ne!(id, "none");
    }

    #[tokio::test]
    async fn bad_descriptor_json_is_malformed() {
        let net = LocalNetwork::new();
        let a = node(&net, 1);
        let out = create(a.as_ref(), "{not json").await;
        assert_eq!(failure_kind(&out), Some(ErrorKind::MalformedInput));
        assert!(out.to_string().starts_with('['));
    }

    #[tokio::test]
    async fn bad_member_list_is_malformed() {
        let net = LocalNetwork::new();
        let b = node(&net, 2);
        let out = join(b.as_ref(), "abc", &desc_json(2), &desc_json(1)).await;
        assert_eq!(failure_kind(&out), Some(ErrorKind::MalformedInput));
    }

    #[tokio::test]
    async fn destroy_prints_n_even_when_fresh() {
        let net = LocalNetwork::new();
        let a = node(&net, 1);
        assert_eq!(destroy(a.as_ref()).await.to_string(), "N");
        assert_eq!(destroy(a.as_ref()).await.to_string(), "N");
    }

    #[tokio::test]
    async fn shutdown_of_fresh_node_fails() {
        let net = LocalNetwork::new();
        let a = node(&net, 1);
        let out = shutdown(a.as_ref()).await;
        assert_eq!(failure_kind(&out), Some(ErrorKind::NotActive));
    }
}
