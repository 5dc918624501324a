//! Node agent — the per-host side of the coordination protocol.
//!
//! The agent owns the node's state and is its only mutator. Every
//! lifecycle command takes the agent's lock, re-reads the persisted
//! record, asks the transition table whether the command is legal and
//! commits the outcome in one store transaction. Two racing `join`s on
//! the same node therefore serialize: one succeeds, the other sees
//! `AlreadyMember`.
//!
//! Joining talks to the members the orchestrator listed:
//!
//! ```text
//! joiner                               listed member (Active)
//!   ├── admit(secret, descriptor) ───▶  validate secret
//!   │   ◀── membership view ──────────  (read-only)
//!   ├── allocate id, commit Member
//!   └── announce(secret, self) ──────▶  record joiner in view
//! ```

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use clusterd_state::{LocalRecord, MemberRecord, MembersUpdate, NodeDescriptor, NodeId, StateStore};

use crate::diagnostics::Diagnostics;
use crate::error::{ClusterError, ClusterResult};
use crate::identity::IdentityRegistry;
use crate::lifecycle::{self, Command, Transition};
use crate::membership::MembershipStore;
use crate::peer::PeerClient;
use crate::secret::{Secret, SecretAuthority};
use crate::wire::{AdmitReply, AdmitRequest, AnnounceRequest};

/// The five operations an orchestrator drives a node with.
///
/// Implemented in-process by [`NodeAgent`] and remotely by
/// [`DaemonClient`](crate::transport::DaemonClient).
pub trait ClusterAgent: Send + Sync {
    /// Found a new cluster on this node; returns the join secret.
    fn create(
        &self,
        descriptor: NodeDescriptor,
    ) -> impl Future<Output = ClusterResult<Secret>> + Send;

    /// Join the cluster that `existing` belongs to.
    fn join(
        &self,
        secret: Secret,
        descriptor: NodeDescriptor,
        existing: Vec<NodeDescriptor>,
    ) -> impl Future<Output = ClusterResult<()>> + Send;

    fn shutdown(&self) -> impl Future<Output = ClusterResult<()>> + Send;

    /// Leave the cluster for good. Succeeds on a node with nothing to destroy.
    fn destroy(&self) -> impl Future<Output = ClusterResult<()>> + Send;

    fn diagnostics(&self) -> impl Future<Output = ClusterResult<Diagnostics>> + Send;
}

/// Tunables for the node agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Upper bound on finding an admitting member during `join`.
    pub join_timeout: Duration,
    /// Upper bound on each post-join announcement.
    pub announce_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_secs(10),
            announce_timeout: Duration::from_secs(2),
        }
    }
}

/// The node agent.
pub struct NodeAgent<P> {
    store: StateStore,
    identity: IdentityRegistry,
    secrets: SecretAuthority,
    membership: MembershipStore,
    peers: P,
    config: AgentConfig,
    /// Serializes lifecycle transitions and view updates on this node.
    lifecycle: Mutex<()>,
}

impl<P: PeerClient> NodeAgent<P> {
    /// Create an agent over `store`, resuming whatever lifecycle state
    /// it holds.
    pub fn new(store: StateStore, peers: P, config: AgentConfig) -> Self {
        Self {
            identity: IdentityRegistry::new(store.clone()),
            secrets: SecretAuthority::new(),
            membership: MembershipStore::new(store.clone()),
            store,
            peers,
            config,
            lifecycle: Mutex::new(()),
        }
    }

    // ── Lifecycle commands ─────────────────────────────────────────

    /// `Uninitialized | Destroyed → Founder`.
    pub async fn create(&self, descriptor: NodeDescriptor) -> ClusterResult<Secret> {
        descriptor.validate()?;
        let _guard = self.lifecycle.lock().await;

        let local = self.store.local()?;
        let state = lifecycle::next(local.state, Command::Create)?.target(local.state);
        let (secret, digest) = self.secrets.issue(&local)?;
        let node_id = self.identity.allocate(&[])?;

        let record = LocalRecord {
            state,
            node_id: Some(node_id),
            descriptor: Some(descriptor.clone()),
            secret_digest: Some(digest),
            epoch: local.epoch + 1,
            updated_at: epoch_secs(),
        };
        let view = MembershipStore::founding_view(&descriptor, node_id);
        self.store
            .commit_transition(&record, MembersUpdate::Replace(view))?;

        info!(%node_id, hostname = %descriptor.hostname, epoch = record.epoch, "cluster created");
        Ok(secret)
    }

    /// `Uninitialized | Destroyed → Member`, admitted by one of `existing`.
    pub async fn join(
        &self,
        secret: Secret,
        descriptor: NodeDescriptor,
        existing: Vec<NodeDescriptor>,
    ) -> ClusterResult<NodeId> {
        descriptor.validate()?;
        for member in &existing {
            member.validate()?;
        }
        if secret.is_empty() {
            return Err(ClusterError::MalformedInput("join secret is empty".to_string()));
        }

        let guard = self.lifecycle.lock().await;

        let local = self.store.local()?;
        let state = lifecycle::next(local.state, Command::Join)?.target(local.state);

        let peers: Vec<&NodeDescriptor> = existing
            .iter()
            .filter(|m| m.hostname != descriptor.hostname)
            .collect();
        if peers.is_empty() {
            return Err(ClusterError::NoReachableMembers(format!(
                "no members listed besides {}",
                descriptor.hostname
            )));
        }

        let request = AdmitRequest {
            secret: secret.clone(),
            joiner: descriptor.clone(),
        };
        let timeout = self.config.join_timeout;
        let reply = tokio::time::timeout(timeout, self.seek_admission(&peers, &request))
            .await
            .map_err(|_| {
                ClusterError::Timeout(format!(
                    "no member admitted {} within {timeout:?}",
                    descriptor.hostname
                ))
            })??;

        let node_id = self
            .identity
            .allocate(&MembershipStore::taken_ids(&reply.members))?;
        let me = MembershipStore::self_entry(&descriptor, node_id);
        let view = MembershipStore::joined_view(&existing, &reply.members, me.clone());

        let record = LocalRecord {
            state,
            node_id: Some(node_id),
            descriptor: Some(descriptor.clone()),
            secret_digest: Some(self.secrets.adopt(&secret)),
            epoch: local.epoch + 1,
            updated_at: epoch_secs(),
        };
        self.store
            .commit_transition(&record, MembersUpdate::Replace(view.clone()))?;

        info!(
            %node_id,
            hostname = %descriptor.hostname,
            admitted_by = %reply.responder,
            members = view.len(),
            "joined cluster"
        );
        drop(guard);

        self.announce_to(&view, &me, &secret).await;
        Ok(node_id)
    }

    /// `Founder | Member → ShuttingDown`. Strict: fails unless active.
    pub async fn shutdown(&self) -> ClusterResult<()> {
        let _guard = self.lifecycle.lock().await;

        let mut local = self.store.local()?;
        local.state = lifecycle::next(local.state, Command::Shutdown)?.target(local.state);
        local.updated_at = epoch_secs();
        self.store.put_local(&local)?;

        info!(node_id = ?local.node_id, "node shutting down");
        Ok(())
    }

    /// `Founder | Member | ShuttingDown → Destroyed`. Releases the
    /// identifier, drops the join secret and clears the view.
    /// Idempotent: a node with nothing to destroy is left as it is.
    pub async fn destroy(&self) -> ClusterResult<()> {
        let _guard = self.lifecycle.lock().await;

        let local = self.store.local()?;
        match lifecycle::next(local.state, Command::Destroy)? {
            Transition::NoOp => {
                debug!(state = %local.state, "destroy: nothing to do");
            }
            Transition::To(state) => {
                let record = LocalRecord {
                    state,
                    epoch: local.epoch,
                    updated_at: epoch_secs(),
                    ..LocalRecord::default()
                };
                self.store
                    .commit_transition(&record, MembersUpdate::Replace(Vec::new()))?;
                info!(released = ?local.node_id, "node destroyed");
            }
        }
        Ok(())
    }

    /// Consistent snapshot of the local record and view.
    pub async fn diagnostics(&self) -> ClusterResult<Diagnostics> {
        let _guard = self.lifecycle.lock().await;
        let (local, members) = self.store.snapshot()?;
        Ok(Diagnostics::new(&local, members))
    }

    // ── Peer-side requests ─────────────────────────────────────────

    /// Validate a joiner's secret and hand back this node's view.
    ///
    /// Read-only, so it does not take the lifecycle lock: a node that is
    /// itself mid-join can still be asked. The record and the view come
    /// from one read transaction, so a concurrent `destroy` is seen
    /// either entirely or not at all.
    pub async fn admit(&self, request: &AdmitRequest) -> ClusterResult<AdmitReply> {
        request.joiner.validate()?;

        let (local, members) = self.store.snapshot()?;
        if !local.state.is_active() {
            return Err(ClusterError::NotActive(format!(
                "cannot admit in state {}",
                local.state
            )));
        }
        if !self.secrets.validate(&local, &request.secret) {
            warn!(joiner = %request.joiner.hostname, "admission refused: secret mismatch");
            return Err(ClusterError::InvalidSecret);
        }

        info!(joiner = %request.joiner.hostname, members = members.len(), "joiner admitted");
        Ok(AdmitReply {
            responder: local.hostname().unwrap_or_default().to_string(),
            members,
        })
    }

    /// Record a member that has just joined. Never touches this node's
    /// own entry and never removes anyone.
    pub async fn announce(&self, request: &AnnounceRequest) -> ClusterResult<()> {
        request.member.descriptor.validate()?;
        let _guard = self.lifecycle.lock().await;

        let local = self.store.local()?;
        if !local.state.is_active() {
            return Err(ClusterError::NotActive(format!(
                "cannot record members in state {}",
                local.state
            )));
        }
        if !self.secrets.validate(&local, &request.secret) {
            warn!(member = %request.member.descriptor.hostname, "announcement refused: secret mismatch");
            return Err(ClusterError::InvalidSecret);
        }
        if local.hostname() == Some(request.member.descriptor.hostname.as_str()) {
            debug!("ignoring announcement for own hostname");
            return Ok(());
        }

        self.membership.record(&request.member)
    }

    // ── Internals ──────────────────────────────────────────────────

    /// Ask the listed members, in order, until one admits us.
    ///
    /// A member rejecting the secret does not end the search.
    /// `InvalidSecret` is returned only when nobody admitted and at
    /// least one member rejected the secret.
    async fn seek_admission(
        &self,
        peers: &[&NodeDescriptor],
        request: &AdmitRequest,
    ) -> ClusterResult<AdmitReply> {
        let mut skipped = Vec::new();
        let mut rejected = Vec::new();

        for peer in peers {
            if peer.addresses.is_empty() {
                skipped.push(format!("{}: no address", peer.hostname));
                continue;
            }
            for address in &peer.addresses {
                match self.peers.admit(address, request).await {
                    Ok(reply) => {
                        debug!(peer = %peer.hostname, %address, "admitted");
                        return Ok(reply);
                    }
                    Err(ClusterError::InvalidSecret) => {
                        warn!(peer = %peer.hostname, %address, "join secret rejected");
                        rejected.push(peer.hostname.clone());
                        break;
                    }
                    Err(e) if e.is_unreachable() => {
                        debug!(peer = %peer.hostname, %address, error = %e, "member skipped");
                        skipped.push(format!("{}@{address}: {e}", peer.hostname));
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        if !rejected.is_empty() {
            debug!(rejected_by = ?rejected, "no member admitted the join secret");
            return Err(ClusterError::InvalidSecret);
        }
        Err(ClusterError::NoReachableMembers(skipped.join("; ")))
    }

    /// Tell every other member about `me`, all at once. Best effort: the
    /// join has already been committed locally, so the whole round is
    /// bounded by one `announce_timeout`.
    async fn announce_to(&self, view: &[MemberRecord], me: &MemberRecord, secret: &Secret) {
        let request = AnnounceRequest {
            secret: secret.clone(),
            member: me.clone(),
        };

        let sends = view
            .iter()
            .filter(|m| m.table_key() != me.table_key())
            .map(|member| self.announce_one(member, &request));
        let round = futures::future::join_all(sends);

        match tokio::time::timeout(self.config.announce_timeout, round).await {
            Ok(outcomes) => {
                let undelivered = outcomes.iter().filter(|delivered| !**delivered).count();
                if undelivered > 0 {
                    warn!(undelivered, "could not announce join to every member");
                }
            }
            Err(_) => {
                warn!(
                    timeout = ?self.config.announce_timeout,
                    "announcements still pending, giving up"
                );
            }
        }
    }

    /// Announce to one member, trying its addresses in order.
    async fn announce_one(&self, member: &MemberRecord, request: &AnnounceRequest) -> bool {
        for address in &member.descriptor.addresses {
            match self.peers.announce(address, request).await {
                Ok(()) => return true,
                Err(e) => {
                    debug!(peer = %member.descriptor.hostname, %address, error = %e, "announce failed");
                }
            }
        }
        warn!(peer = %member.descriptor.hostname, "could not announce join to member");
        false
    }
}

impl<P: PeerClient> ClusterAgent for NodeAgent<P> {
    fn create(
        &self,
        descriptor: NodeDescriptor,
    ) -> impl Future<Output = ClusterResult<Secret>> + Send {
        NodeAgent::create(self, descriptor)
    }

    fn join(
        &self,
        secret: Secret,
        descriptor: NodeDescriptor,
        existing: Vec<NodeDescriptor>,
    ) -> impl Future<Output = ClusterResult<()>> + Send {
        async move {
            NodeAgent::join(self, secret, descriptor, existing).await?;
            Ok(())
        }
    }

    fn shutdown(&self) -> impl Future<Output = ClusterResult<()>> + Send {
        NodeAgent::shutdown(self)
    }

    fn destroy(&self) -> impl Future<Output = ClusterResult<()>> + Send {
        NodeAgent::destroy(self)
    }

    fn diagnostics(&self) -> impl Future<Output = ClusterResult<Diagnostics>> + Send {
        NodeAgent::diagnostics(self)
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
