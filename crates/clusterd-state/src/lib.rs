//! clusterd-state — embedded per-node state for clusterd.
//!
//! Backed by [redb](https://docs.rs/redb), persists everything a node
//! agent must remember across restarts: its lifecycle record, the
//! identity seed used to mint node identifiers, and its local view of
//! the cluster membership.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! The `local` table holds a handful of singleton records under fixed
//! keys; the `members` table is keyed by hostname.
//!
//! Lifecycle transitions go through [`StateStore::commit_transition`],
//! which writes the local record and the membership change in a single
//! write transaction.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::{MembersUpdate, StateStore};
pub use types::*;
