//! Orchestrator-side bookkeeping for building a cluster.
//!
//! A [`ClusterSession`] carries the secret returned by `create` and the
//! ordered list of nodes joined so far, and passes both to every later
//! `join`.

use clusterd_state::NodeDescriptor;

use crate::agent::ClusterAgent;
use crate::error::ClusterResult;
use crate::secret::Secret;

#[derive(Debug, Clone)]
pub struct ClusterSession {
    secret: Secret,
    members: Vec<NodeDescriptor>,
}

impl ClusterSession {
    /// Found a cluster on `agent`, which is described by `founder`.
    pub async fn found<A: ClusterAgent>(agent: &A, founder: NodeDescriptor) -> ClusterResult<Self> {
        let secret = agent.create(founder.clone()).await?;
        Ok(Self {
            secret,
            members: vec![founder],
        })
    }

    /// Pick up a session whose secret and members were recorded elsewhere.
    pub fn resume(secret: Secret, members: Vec<NodeDescriptor>) -> Self {
        Self { secret, members }
    }

    /// Join `node` (served by `agent`) using the session's secret and
    /// current member list. The list grows only if the join succeeds.
    pub async fn join<A: ClusterAgent>(&mut self, agent: &A, node: NodeDescriptor) -> ClusterResult<()> {
        agent
            .join(self.secret.clone(), node.clone(), self.members.clone())
            .await?;
        self.members.push(node);
        Ok(())
    }

    pub fn secret(&self) -> &Secret {
        &self.secret
    }

    pub fn members(&self) -> &[NodeDescriptor] {
        &self.members
    }
}
