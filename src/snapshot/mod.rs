//! Per-file version chains.
//!
//! A [`Snapshot`] is one immutable version of one file. Snapshots of the same
//! [`DocumentKey`] form an append-only, strictly time-ordered chain linked
//! through `previous`. The tracker only reads chains through
//! [`SnapshotProvider`]; ingestion lives elsewhere.

pub mod history;
pub mod store;

pub use history::load_history_dir;
pub use store::MemorySnapshotStore;

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Identity of a tracked file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DocumentKey {
    pub solution: String,
    pub namespace: String,
    pub file: String,
}

impl DocumentKey {
    pub fn new(
        solution: impl Into<String>,
        namespace: impl Into<String>,
        file: impl Into<String>,
    ) -> Self {
        Self {
            solution: solution.into(),
            namespace: namespace.into(),
            file: file.into(),
        }
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.solution, self.namespace, self.file)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SnapshotId(pub u64);

/// Milliseconds on the store's clock; strictly increasing along a chain.
pub type Timestamp = u64;

#[derive(Debug, Clone)]
pub struct Snapshot {
    id: SnapshotId,
    key: DocumentKey,
    text: Arc<str>,
    timestamp: Timestamp,
    previous: Option<SnapshotId>,
}

impl Snapshot {
    pub(crate) fn new(
        id: SnapshotId,
        key: DocumentKey,
        text: Arc<str>,
        timestamp: Timestamp,
        previous: Option<SnapshotId>,
    ) -> Self {
        Self {
            id,
            key,
            text,
            timestamp,
            previous,
        }
    }

    pub fn id(&self) -> SnapshotId {
        self.id
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn previous_id(&self) -> Option<SnapshotId> {
        self.previous
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Snapshot {}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("no snapshot chain for {0}")]
    UnknownDocument(DocumentKey),

    #[error("snapshot {0:?} not found")]
    MissingSnapshot(SnapshotId),

    #[error("timestamp {timestamp} is not after the latest snapshot of {key} ({latest})")]
    OutOfOrder {
        key: DocumentKey,
        timestamp: Timestamp,
        latest: Timestamp,
    },

    #[error("snapshot storage unavailable: {0}")]
    Storage(String),
}

/// Read access to snapshot chains, plus the append used by ingestion.
pub trait SnapshotProvider: Send + Sync {
    fn has_snapshot(&self, key: &DocumentKey) -> bool;

    fn latest(&self, key: &DocumentKey) -> Result<Option<Snapshot>, SnapshotError>;

    fn previous(&self, snapshot: &Snapshot) -> Result<Option<Snapshot>, SnapshotError>;

    fn create_next(&self, key: &DocumentKey, text: &str) -> Result<Snapshot, SnapshotError>;

    /// Every identity with at least one snapshot.
    fn identities(&self) -> Vec<DocumentKey>;
}

/// Walk `steps` snapshots back from `snapshot`; `None` once the chain ends.
pub fn ancestor(
    provider: &dyn SnapshotProvider,
    snapshot: &Snapshot,
    steps: usize,
) -> Result<Option<Snapshot>, SnapshotError> {
    let mut current = snapshot.clone();
    for _ in 0..steps {
        match provider.previous(&current)? {
            Some(prev) => current = prev,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}
