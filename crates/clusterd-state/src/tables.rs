//! redb table definitions for the clusterd state store.
//!
//! Both tables use `&str` keys and `&[u8]` values (JSON-serialized domain types).

use redb::TableDefinition;

/// Singleton records for the local node, keyed by [`NODE_KEY`] and [`IDENTITY_KEY`].
pub const LOCAL: TableDefinition<&str, &[u8]> = TableDefinition::new("local");

/// Membership view keyed by `{hostname}`.
pub const MEMBERS: TableDefinition<&str, &[u8]> = TableDefinition::new("members");

/// Key of the `LocalRecord` in [`LOCAL`].
pub const NODE_KEY: &str = "node";

/// Key of the `IdentitySeed` in [`LOCAL`].
pub const IDENTITY_KEY: &str = "identity";
