//! Identity registry — mints node identifiers.
//!
//! Identifiers combine a per-agent random seed (drawn once and
//! persisted) with a counter that only moves forward, so an agent never
//! hands out the same identifier twice, even across destroy/recreate.

use rand::RngCore;
use tracing::debug;

use clusterd_state::{IdentitySeed, NodeId, StateStore};

use crate::error::{ClusterError, ClusterResult};

pub struct IdentityRegistry {
    store: StateStore,
}

impl IdentityRegistry {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// Mint a fresh identifier that is not in `taken`.
    ///
    /// Fails with `AlreadyMember` while the node is active: an active
    /// lifecycle instance keeps the identifier it was given.
    pub fn allocate(&self, taken: &[NodeId]) -> ClusterResult<NodeId> {
        let local = self.store.local()?;
        if local.state.is_active() {
            return Err(ClusterError::AlreadyMember(format!(
                "identifier already assigned in state {}",
                local.state
            )));
        }

        let mut seed = match self.store.identity_seed()? {
            Some(seed) => seed,
            None => IdentitySeed {
                seed: rand::thread_rng().next_u32(),
                counter: 0,
            },
        };

        let node_id = loop {
            seed.counter = match seed.counter.checked_add(1) {
                Some(c) => c,
                None => {
                    // Counter exhausted: continue under a new seed.
                    seed.seed = rand::thread_rng().next_u32();
                    1
                }
            };
            let candidate = NodeId::new(seed.seed, seed.counter);
            if !taken.contains(&candidate) {
                break candidate;
            }
            debug!(%candidate, "identifier already taken, advancing");
        };

        self.store.put_identity_seed(&seed)?;
        debug!(%node_id, "identifier allocated");
        Ok(node_id)
    }
}
