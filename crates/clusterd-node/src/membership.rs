//! Membership store — the node's local view of the cluster.
//!
//! The view is keyed by hostname and only ever grows while the node is
//! active: joins and announcements insert or refresh entries, nothing
//! but `destroy` removes them.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use clusterd_state::{MemberRecord, NodeDescriptor, NodeId, StateStore};

use crate::error::ClusterResult;

pub struct MembershipStore {
    state: StateStore,
}

impl MembershipStore {
    pub fn new(state: StateStore) -> Self {
        Self { state }
    }

    /// Record a member reported by a peer, replacing any entry with the
    /// same hostname.
    pub fn record(&self, member: &MemberRecord) -> ClusterResult<()> {
        let previous = self.state.get_member(member.table_key())?;
        self.state.put_member(member)?;
        match previous {
            Some(prev) if prev.node_id == member.node_id => {
                debug!(hostname = %member.descriptor.hostname, "member refreshed");
            }
            _ => {
                info!(
                    hostname = %member.descriptor.hostname,
                    node_id = ?member.node_id,
                    "member recorded"
                );
            }
        }
        Ok(())
    }

    /// Entry describing this node.
    pub fn self_entry(descriptor: &NodeDescriptor, node_id: NodeId) -> MemberRecord {
        MemberRecord {
            descriptor: descriptor.clone(),
            node_id: Some(node_id),
            joined_at: epoch_secs(),
        }
    }

    /// A founder's view: only itself.
    pub fn founding_view(descriptor: &NodeDescriptor, node_id: NodeId) -> Vec<MemberRecord> {
        vec![Self::self_entry(descriptor, node_id)]
    }

    /// A joiner's view: the members the orchestrator listed, merged with
    /// the admitting peer's view, plus the joiner itself.
    ///
    /// Peer entries win over orchestrator entries for the same hostname
    /// unless they carry no identifier; the joiner's own entry always wins.
    pub fn joined_view(
        existing: &[NodeDescriptor],
        admitted: &[MemberRecord],
        me: MemberRecord,
    ) -> Vec<MemberRecord> {
        let now = epoch_secs();
        let mut view: BTreeMap<String, MemberRecord> = existing
            .iter()
            .map(|d| {
                (
                    d.hostname.clone(),
                    MemberRecord {
                        descriptor: d.clone(),
                        node_id: None,
                        joined_at: now,
                    },
                )
            })
            .collect();

        for member in admitted {
            let keep_existing = member.node_id.is_none()
                && view
                    .get(member.table_key())
                    .is_some_and(|m| m.node_id.is_some());
            if !keep_existing {
                view.insert(member.table_key().to_string(), member.clone());
            }
        }

        view.insert(me.table_key().to_string(), me);
        view.into_values().collect()
    }

    /// Identifiers already present in a view.
    pub fn taken_ids(members: &[MemberRecord]) -> Vec<NodeId> {
        members.iter().filter_map(|m| m.node_id).collect()
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
