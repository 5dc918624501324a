//! Domain types for the clusterd state store.
//!
//! These types represent what a node agent persists about itself and
//! about the cluster it belongs to. All types are serializable to/from
//! JSON, both for storage in redb tables and for the wire protocol.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Node descriptor ───────────────────────────────────────────────

/// How the orchestrator describes a node: its hostname plus the
/// addresses it can be reached on.
///
/// The hostname is the membership identity; addresses are routing data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub hostname: String,
    pub addresses: Vec<String>,
}

/// Reasons a descriptor is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("hostname must not be empty")]
    EmptyHostname,

    #[error("hostname {0:?} contains whitespace")]
    HostnameWhitespace(String),

    #[error("address #{index} of {hostname} is blank")]
    BlankAddress { hostname: String, index: usize },
}

impl NodeDescriptor {
    pub fn new(hostname: impl Into<String>, addresses: Vec<String>) -> Self {
        Self {
            hostname: hostname.into(),
            addresses,
        }
    }

    /// Check the descriptor is usable as a membership entry.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.hostname.is_empty() {
            return Err(DescriptorError::EmptyHostname);
        }
        if self.hostname.chars().any(char::is_whitespace) {
            return Err(DescriptorError::HostnameWhitespace(self.hostname.clone()));
        }
        if let Some(index) = self.addresses.iter().position(|a| a.trim().is_empty()) {
            return Err(DescriptorError::BlankAddress {
                hostname: self.hostname.clone(),
                index,
            });
        }
        Ok(())
    }
}

// ── Node identifier ───────────────────────────────────────────────

/// Cluster-unique node identifier.
///
/// The upper 32 bits carry the minting agent's random seed, the lower
/// 32 bits its allocation counter. Rendered as 16 lowercase hex digits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    pub fn new(seed: u32, counter: u32) -> Self {
        Self((u64::from(seed) << 32) | u64::from(counter))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for NodeId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Persisted state of the identifier allocator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentitySeed {
    pub seed: u32,
    /// Last counter value handed out; the next allocation uses `counter + 1`.
    pub counter: u32,
}

// ── Lifecycle ─────────────────────────────────────────────────────

/// Where a node is in its lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    /// Active; originated the cluster.
    Founder,
    /// Active; joined an existing cluster.
    Member,
    ShuttingDown,
    Destroyed,
}

impl LifecycleState {
    /// Founder or Member.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Founder | Self::Member)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Founder => "founder",
            Self::Member => "member",
            Self::ShuttingDown => "shutting_down",
            Self::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the node knows about itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LocalRecord {
    pub state: LifecycleState,
    /// Assigned on create/join, cleared on destroy.
    pub node_id: Option<NodeId>,
    /// Own descriptor as declared by the orchestrator.
    pub descriptor: Option<NodeDescriptor>,
    /// Hex SHA-256 digest of the live join secret.
    pub secret_digest: Option<String>,
    /// Number of lifecycle instances this agent has started.
    pub epoch: u64,
    /// Unix timestamp (seconds) of the last transition.
    pub updated_at: u64,
}

impl LocalRecord {
    pub fn hostname(&self) -> Option<&str> {
        self.descriptor.as_ref().map(|d| d.hostname.as_str())
    }
}

// ── Membership ────────────────────────────────────────────────────

/// One entry of a node's membership view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberRecord {
    pub descriptor: NodeDescriptor,
    /// Unknown for members the orchestrator listed but no peer has
    /// reported an identifier for yet.
    pub node_id: Option<NodeId>,
    /// Unix timestamp (seconds) the entry was recorded.
    pub joined_at: u64,
}

impl MemberRecord {
    pub fn table_key(&self) -> &str {
        &self.descriptor.hostname
    }
}
