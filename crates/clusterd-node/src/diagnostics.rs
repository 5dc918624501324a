//! Read-only snapshot of a node, rendered as stable `Key: value` lines.
//!
//! Orchestrators scrape the text form; the `Local node id:` line is
//! always present and its value is always the fourth space-separated
//! token (`none` before an identifier is assigned).

use std::fmt;

use serde::{Deserialize, Serialize};

use clusterd_state::{LifecycleState, LocalRecord, MemberRecord, NodeId};

/// Prefix of the line carrying the local node identifier.
pub const NODE_ID_LINE: &str = "Local node id:";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnostics {
    pub state: LifecycleState,
    pub node_id: Option<NodeId>,
    pub hostname: Option<String>,
    pub addresses: Vec<String>,
    pub epoch: u64,
    pub secret_held: bool,
    pub members: Vec<MemberRecord>,
}

impl Diagnostics {
    pub fn new(local: &LocalRecord, members: Vec<MemberRecord>) -> Self {
        Self {
            state: local.state,
            node_id: local.node_id,
            hostname: local.hostname().map(str::to_string),
            addresses: local
                .descriptor
                .as_ref()
                .map(|d| d.addresses.clone())
                .unwrap_or_default(),
            epoch: local.epoch,
            secret_held: local.secret_digest.is_some(),
            members,
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Lifecycle state: {}", self.state)?;
        match self.node_id {
            Some(id) => writeln!(f, "{NODE_ID_LINE} {id}")?,
            None => writeln!(f, "{NODE_ID_LINE} none")?,
        }
        writeln!(f, "Local hostname: {}", self.hostname.as_deref().unwrap_or("none"))?;
        if self.addresses.is_empty() {
            writeln!(f, "Local addresses: none")?;
        } else {
            writeln!(f, "Local addresses: {}", self.addresses.join(" "))?;
        }
        writeln!(f, "Lifecycle epoch: {}", self.epoch)?;
        writeln!(
            f,
            "Join secret: {}",
            if self.secret_held { "held" } else { "none" }
        )?;
        write!(f, "Members: {}", self.members.len())?;
        for member in &self.members {
            let id = member
                .node_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            write!(
                f,
                "\n  {} {} {}",
                member.descriptor.hostname,
                id,
                member.descriptor.addresses.join(" ")
            )?;
        }
        Ok(())
    }
}

/// Extract the node identifier from rendered diagnostics text.
pub fn parse_local_node_id(text: &str) -> Option<&str> {
    text.lines()
        .find(|line| line.starts_with(NODE_ID_LINE))
        .and_then(|line| line.split(' ').nth(3))
}
