//! StateStore — redb-backed persistence for a clusterd node.
//!
//! Provides typed access to the local lifecycle record, the identity
//! seed and the membership view. All values are JSON-serialized into
//! redb's `&[u8]` value columns. The store supports both on-disk and
//! in-memory backends (the latter for testing and embedded clusters).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadTransaction, ReadableDatabase, ReadableTable, WriteTransaction};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// How a transition changes the membership view.
#[derive(Debug, Clone)]
pub enum MembersUpdate {
    /// Leave the view as it is.
    Keep,
    /// Drop the whole view and replace it with these entries.
    Replace(Vec<MemberRecord>),
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store.
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(LOCAL).map_err(map_err!(Table))?;
        txn.open_table(MEMBERS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Local record ───────────────────────────────────────────────

    /// Load the local record, or the default `Uninitialized` record if
    /// this node has never transitioned.
    pub fn local(&self) -> StateResult<LocalRecord> {
        Ok(self.get_local_value(NODE_KEY)?.unwrap_or_default())
    }

    /// Write the local record without touching the membership view.
    pub fn put_local(&self, record: &LocalRecord) -> StateResult<()> {
        self.commit_transition(record, MembersUpdate::Keep)
    }

    /// Write the local record and apply a membership change atomically.
    pub fn commit_transition(
        &self,
        record: &LocalRecord,
        members: MembersUpdate,
    ) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(LOCAL).map_err(map_err!(Table))?;
            table
                .insert(NODE_KEY, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        match &members {
            MembersUpdate::Keep => {}
            MembersUpdate::Replace(records) => {
                clear_members(&txn)?;
                write_members(&txn, records)?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(state = %record.state, epoch = record.epoch, "local record stored");
        Ok(())
    }

    // ── Identity seed ──────────────────────────────────────────────

    /// Get the identity allocator state, if one was ever stored.
    pub fn identity_seed(&self) -> StateResult<Option<IdentitySeed>> {
        self.get_local_value(IDENTITY_KEY)
    }

    /// Store the identity allocator state.
    pub fn put_identity_seed(&self, seed: &IdentitySeed) -> StateResult<()> {
        let value = serde_json::to_vec(seed).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(LOCAL).map_err(map_err!(Table))?;
            table
                .insert(IDENTITY_KEY, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Members ────────────────────────────────────────────────────

    /// Insert or update a single member entry.
    pub fn put_member(&self, member: &MemberRecord) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        write_members(&txn, std::slice::from_ref(member))?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(hostname = %member.descriptor.hostname, "member stored");
        Ok(())
    }

    /// Get a member by hostname.
    pub fn get_member(&self, hostname: &str) -> StateResult<Option<MemberRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(MEMBERS).map_err(map_err!(Table))?;
        match table.get(hostname).map_err(map_err!(Read))? {
            Some(guard) => {
                let member: MemberRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(member))
            }
            None => Ok(None),
        }
    }

    /// List the whole membership view, ordered by hostname.
    pub fn list_members(&self) -> StateResult<Vec<MemberRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        read_members(&txn)
    }

    /// The local record and the membership view, read in one transaction.
    pub fn snapshot(&self) -> StateResult<(LocalRecord, Vec<MemberRecord>)> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let local = read_local_value(&txn, NODE_KEY)?.unwrap_or_default();
        let members = read_members(&txn)?;
        Ok((local, members))
    }

    fn get_local_value<T: DeserializeOwned>(&self, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        read_local_value(&txn, key)
    }
}

fn read_local_value<T: DeserializeOwned>(txn: &ReadTransaction, key: &str) -> StateResult<Option<T>> {
    let table = txn.open_table(LOCAL).map_err(map_err!(Table))?;
    match table.get(key).map_err(map_err!(Read))? {
        Some(guard) => {
            let value: T = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn read_members(txn: &ReadTransaction) -> StateResult<Vec<MemberRecord>> {
    let table = txn.open_table(MEMBERS).map_err(map_err!(Table))?;
    let mut results = Vec::new();
    for entry in table.iter().map_err(map_err!(Read))? {
        let (_, value) = entry.map_err(map_err!(Read))?;
        let member: MemberRecord =
            serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
        results.push(member);
    }
    Ok(results)
}

fn write_members(txn: &WriteTransaction, members: &[MemberRecord]) -> StateResult<()> {
    let mut table = txn.open_table(MEMBERS).map_err(map_err!(Table))?;
    for member in members {
        let value = serde_json::to_vec(member).map_err(map_err!(Serialize))?;
        table
            .insert(member.table_key(), value.as_slice())
            .map_err(map_err!(Write))?;
    }
    Ok(())
}

fn clear_members(txn: &WriteTransaction) -> StateResult<()> {
    let mut table = txn.open_table(MEMBERS).map_err(map_err!(Table))?;
    let keys = table
        .iter()
        .map_err(map_err!(Read))?
        .map(|entry| {
            let (key, _) = entry.map_err(map_err!(Read))?;
            Ok(key.value().to_string())
        })
        .collect::<StateResult<Vec<String>>>()?;
    for key in &keys {
        table.remove(key.as_str()).map_err(map_err!(Write))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(hostname: &str, id: Option<u64>) -> MemberRecord {
        MemberRecord {
            descriptor: NodeDescriptor::new(hostname, vec!["10.0.0.1".to_string()]),
            node_id: id.map(NodeId::from),
            joined_at: 1000,
        }
    }

    fn founder_record() -> LocalRecord {
        LocalRecord {
            state: LifecycleState::Founder,
            node_id: Some(NodeId::new(1, 1)),
            descriptor: Some(NodeDescriptor::new("cluster1", vec![])),
            secret_digest: Some("abcd".to_string()),
            epoch: 1,
            updated_at: 1000,
        }
    }

    #[test]
    fn fresh_store_is_uninitialized() {
        let store = StateStore::open_in_memory().unwrap();
        let local = store.local().unwrap();
        assert_eq!(local.state, LifecycleState::Uninitialized);
        assert!(local.node_id.is_none());
        assert!(store.list_members().unwrap().is_empty());
        assert!(store.identity_seed().unwrap().is_none());
    }

    #[test]
    fn local_record_round_trip() {
        let store = StateStore::open_in_memory().unwrap();
        let record = founder_record();
        store.put_local(&record).unwrap();
        assert_eq!(store.local().unwrap(), record);
    }

    #[test]
    fn put_member_never_removes_members() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .commit_transition(&founder_record(), MembersUpdate::Replace(vec![member("cluster1", Some(1))]))
            .unwrap();
        store.put_member(&member("cluster2", Some(2))).unwrap();

        let hostnames: Vec<String> = store
            .list_members()
            .unwrap()
            .into_iter()
            .map(|m| m.descriptor.hostname)
            .collect();
        assert_eq!(hostnames, vec!["cluster1", "cluster2"]);
    }

    #[test]
    fn upsert_overwrites_same_hostname() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_member(&member("cluster2", None)).unwrap();
        store.put_member(&member("cluster2", Some(9))).unwrap();

        let all = store.list_members().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].node_id, Some(NodeId::from(9)));
    }

    #[test]
    fn replace_clears_previous_view() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .commit_transition(
                &founder_record(),
                MembersUpdate::Replace(vec![member("cluster1", Some(1)), member("cluster2", Some(2))]),
            )
            .unwrap();
        store
            .commit_transition(&LocalRecord::default(), MembersUpdate::Replace(vec![]))
            .unwrap();

        assert!(store.list_members().unwrap().is_empty());
        assert!(store.get_member("cluster1").unwrap().is_none());
        assert_eq!(store.local().unwrap().state, LifecycleState::Uninitialized);
    }

    #[test]
    fn replace_clears_every_previous_entry() {
        let store = StateStore::open_in_memory().unwrap();
        let view: Vec<MemberRecord> = (0..64)
            .map(|n| member(&format!("cluster{n}"), Some(n)))
            .collect();
        store
            .commit_transition(&founder_record(), MembersUpdate::Replace(view))
            .unwrap();
        store
            .commit_transition(&founder_record(), MembersUpdate::Replace(vec![member("cluster99", Some(99))]))
            .unwrap();

        let left = store.list_members().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].descriptor.hostname, "cluster99");
    }

    #[test]
    fn snapshot_reads_record_and_view_together() {
        let store = StateStore::open_in_memory().unwrap();
        let (local, members) = store.snapshot().unwrap();
        assert_eq!(local, LocalRecord::default());
        assert!(members.is_empty());

        store
            .commit_transition(&founder_record(), MembersUpdate::Replace(vec![member("cluster1", Some(1))]))
            .unwrap();
        let (local, members) = store.snapshot().unwrap();
        assert_eq!(local, founder_record());
        assert_eq!(members, vec![member("cluster1", Some(1))]);

        store
            .commit_transition(&LocalRecord::default(), MembersUpdate::Replace(vec![]))
            .unwrap();
        let (local, members) = store.snapshot().unwrap();
        assert_eq!(local.state, LifecycleState::Uninitialized);
        assert!(members.is_empty());
    }

    #[test]
    fn identity_seed_round_trip() {
        let store = StateStore::open_in_memory().unwrap();
        let seed = IdentitySeed { seed: 42, counter: 3 };
        store.put_identity_seed(&seed).unwrap();
        assert_eq!(store.identity_seed().unwrap(), Some(seed));
        // The seed lives beside, not inside, the lifecycle record.
        assert_eq!(store.local().unwrap(), LocalRecord::default());
    }

    #[test]
    fn persistent_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clusterd.redb");

        {
            let store = StateStore::open(&path).unwrap();
            store
                .commit_transition(&founder_record(), MembersUpdate::Replace(vec![member("cluster1", Some(1))]))
                .unwrap();
        }

        let store = StateStore::open(&path).unwrap();
        assert_eq!(store.local().unwrap(), founder_record());
        assert_eq!(store.list_members().unwrap().len(), 1);
    }
}
