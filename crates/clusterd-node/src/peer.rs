//! How one node agent reaches another.
//!
//! [`PeerClient`] is the seam between the protocol and the network.
//! [`HttpPeerClient`](crate::transport::HttpPeerClient) speaks to remote
//! daemons; [`LocalNetwork`] routes to agents living in the same
//! process, which is how embedded clusters and the tests run.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::agent::NodeAgent;
use crate::error::{ClusterError, ClusterResult};
use crate::wire::{AdmitReply, AdmitRequest, AnnounceRequest};

/// Requests a node sends to other members.
pub trait PeerClient: Send + Sync + 'static {
    /// Ask the member at `address` to admit a joiner.
    fn admit(
        &self,
        address: &str,
        request: &AdmitRequest,
    ) -> impl Future<Output = ClusterResult<AdmitReply>> + Send;

    /// Tell the member at `address` about a node that just joined.
    fn announce(
        &self,
        address: &str,
        request: &AnnounceRequest,
    ) -> impl Future<Output = ClusterResult<()>> + Send;
}

type Registry = HashMap<String, Arc<NodeAgent<LocalNetwork>>>;

/// In-process network: agents registered under the addresses their
/// descriptors advertise.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    nodes: Arc<RwLock<Registry>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `agent` reachable at `address`.
    pub fn register(&self, address: impl Into<String>, agent: Arc<NodeAgent<LocalNetwork>>) {
        let address = address.into();
        debug!(%address, "local node registered");
        self.nodes
            .write()
            .expect("local network lock")
            .insert(address, agent);
    }

    /// Make `address` unreachable, as if its host went away.
    pub fn unregister(&self, address: &str) -> bool {
        self.nodes
            .write()
            .expect("local network lock")
            .remove(address)
            .is_some()
    }

    fn lookup(&self, address: &str) -> ClusterResult<Arc<NodeAgent<LocalNetwork>>> {
        self.nodes
            .read()
            .expect("local network lock")
            .get(address)
            .cloned()
            .ok_or_else(|| ClusterError::Transport(format!("no node reachable at {address}")))
    }
}

impl PeerClient for LocalNetwork {
    fn admit(
        &self,
        address: &str,
        request: &AdmitRequest,
    ) -> impl Future<Output = ClusterResult<AdmitReply>> + Send {
        let target = self.lookup(address);
        async move { target?.admit(request).await }
    }

    fn announce(
        &self,
        address: &str,
        request: &AnnounceRequest,
    ) -> impl Future<Output = ClusterResult<()>> + Send {
        let target = self.lookup(address);
        async move { target?.announce(request).await }
    }
}
