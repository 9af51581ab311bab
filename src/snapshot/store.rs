use crate::snapshot::{DocumentKey, Snapshot, SnapshotError, SnapshotId, SnapshotProvider, Timestamp};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// In-memory snapshot chains keyed by document identity.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    chains: RwLock<HashMap<DocumentKey, Vec<Snapshot>>>,
    next_id: AtomicU64,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a snapshot with an explicit timestamp (replaying recorded
    /// history). The timestamp must be strictly after the chain's latest.
    pub fn create_next_at(
        &self,
        key: &DocumentKey,
        text: &str,
        timestamp: Timestamp,
    ) -> Result<Snapshot, SnapshotError> {
        let mut chains = self.chains.write().unwrap_or_else(PoisonError::into_inner);
        let chain = chains.entry(key.clone()).or_default();

        if let Some(latest) = chain.last() {
            if timestamp <= latest.timestamp() {
                return Err(SnapshotError::OutOfOrder {
                    key: key.clone(),
                    timestamp,
                    latest: latest.timestamp(),
                });
            }
        }

        let snapshot = Snapshot::new(
            SnapshotId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            key.clone(),
            Arc::from(text),
            timestamp,
            chain.last().map(Snapshot::id),
        );
        chain.push(snapshot.clone());
        Ok(snapshot)
    }

    /// Number of snapshots stored for `key`.
    pub fn chain_len(&self, key: &DocumentKey) -> usize {
        self.chains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map_or(0, Vec::len)
    }

    pub fn clear(&self) {
        self.chains
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or_default()
}

impl SnapshotProvider for MemorySnapshotStore {
    fn has_snapshot(&self, key: &DocumentKey) -> bool {
        self.chain_len(key) > 0
    }

    fn latest(&self, key: &DocumentKey) -> Result<Option<Snapshot>, SnapshotError> {
        Ok(self
            .chains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .and_then(|chain| chain.last().cloned()))
    }

    fn previous(&self, snapshot: &Snapshot) -> Result<Option<Snapshot>, SnapshotError> {
        let Some(previous_id) = snapshot.previous_id() else {
            return Ok(None);
        };
        let chains = self.chains.read().unwrap_or_else(PoisonError::into_inner);
        let chain = chains
            .get(snapshot.key())
            .ok_or_else(|| SnapshotError::UnknownDocument(snapshot.key().clone()))?;

        // Chains are appended in id order, so the predecessor is found by
        // binary search.
        chain
            .binary_search_by_key(&previous_id, Snapshot::id)
            .map(|idx| Some(chain[idx].clone()))
            .map_err(|_| SnapshotError::MissingSnapshot(previous_id))
    }

    fn create_next(&self, key: &DocumentKey, text: &str) -> Result<Snapshot, SnapshotError> {
        let latest = self.latest(key)?.map(|s| s.timestamp());
        let timestamp = match latest {
            Some(latest) => now_millis().max(latest + 1),
            None => now_millis(),
        };
        self.create_next_at(key, text, timestamp)
    }

    fn identities(&self) -> Vec<DocumentKey> {
        let mut keys: Vec<DocumentKey> = self
            .chains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, chain)| !chain.is_empty())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> DocumentKey {
        DocumentKey::new("app", "core", "cart.rs")
    }

    #[test]
    fn chain_links_backwards() {
        let store = MemorySnapshotStore::new();
        store.create_next_at(&key(), "v1", 10).unwrap();
        store.create_next_at(&key(), "v2", 20).unwrap();
        let v3 = store.create_next_at(&key(), "v3", 30).unwrap();

        let latest = store.latest(&key()).unwrap().unwrap();
        assert_eq!(latest, v3);

        let v2 = store.previous(&latest).unwrap().unwrap();
        assert_eq!(v2.text(), "v2");
        let v1 = store.previous(&v2).unwrap().unwrap();
        assert_eq!(v1.text(), "v1");
        assert!(store.previous(&v1).unwrap().is_none());
    }

    #[test]
    fn rejects_out_of_order_timestamps() {
        let store = MemorySnapshotStore::new();
        store.create_next_at(&key(), "v1", 10).unwrap();
        let result = store.create_next_at(&key(), "v2", 10);
        assert!(matches!(result, Err(SnapshotError::OutOfOrder { .. })));
    }

    #[test]
    fn create_next_keeps_time_strictly_increasing() {
        let store = MemorySnapshotStore::new();
        let far_future = now_millis() + 1_000_000;
        store.create_next_at(&key(), "v1", far_future).unwrap();
        let next = store.create_next(&key(), "v2").unwrap();
        assert_eq!(next.timestamp(), far_future + 1);
    }

    #[test]
    fn unknown_document_has_no_latest() {
        let store = MemorySnapshotStore::new();
        assert!(!store.has_snapshot(&key()));
        assert!(store.latest(&key()).unwrap().is_none());
        assert!(store.identities().is_empty());
    }

    #[test]
    fn ancestor_walks_steps() {
        let store = MemorySnapshotStore::new();
        for (i, text) in ["a", "b", "c", "d"].iter().enumerate() {
            store.create_next_at(&key(), text, i as u64 + 1).unwrap();
        }
        let head = store.latest(&key()).unwrap().unwrap();
        let two_back = crate::snapshot::ancestor(&store, &head, 2).unwrap().unwrap();
        assert_eq!(two_back.text(), "b");
        assert!(crate::snapshot::ancestor(&store, &head, 4).unwrap().is_none());
    }
}
