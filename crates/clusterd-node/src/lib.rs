//! clusterd-node — the per-host agent of a clusterd cluster.
//!
//! Independently booted nodes are assembled into one cluster and taken
//! apart again through five commands: `create`, `join`, `shutdown`,
//! `destroy` and `diagnostics`.
//!
//! # Architecture
//!
//! ```text
//! Orchestrator (clusterctl / ClusterSession)
//!   └── ClusterAgent ──HTTP──▶ server (axum)
//!                                └── NodeAgent
//!                                    ├── lifecycle      transition table
//!                                    ├── IdentityRegistry  node ids
//!                                    ├── SecretAuthority   join secret
//!                                    ├── MembershipStore   local view
//!                                    └── PeerClient ──HTTP──▶ other NodeAgents
//! ```
//!
//! Each node's state machine is local; there is no global lock. Views
//! converge through post-join announcements.

pub mod agent;
pub mod diagnostics;
pub mod duration;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod membership;
pub mod peer;
pub mod secret;
pub mod server;
pub mod session;
pub mod transport;
pub mod wire;

pub use agent::{AgentConfig, ClusterAgent, NodeAgent};
pub use diagnostics::{Diagnostics, parse_local_node_id};
pub use duration::parse_duration;
pub use error::{ClusterError, ClusterResult, ErrorKind};
pub use peer::{LocalNetwork, PeerClient};
pub use secret::Secret;
pub use server::build_router;
pub use session::ClusterSession;
pub use transport::{DaemonClient, HttpPeerClient};
