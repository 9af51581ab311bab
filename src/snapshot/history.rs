use crate::snapshot::{DocumentKey, MemorySnapshotStore, SnapshotError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("no .rs versions found in {0}")]
    Empty(PathBuf),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Load a directory of file versions into `store` as one chain for `key`.
///
/// Every `.rs` file directly inside `dir` is one version; file names sort
/// oldest first (`0001.rs`, `0002.rs`, ...). Timestamps are the 1-based
/// position in that order. Returns the number of versions loaded.
pub fn load_history_dir(
    store: &MemorySnapshotStore,
    key: &DocumentKey,
    dir: &Path,
) -> Result<usize, HistoryError> {
    let mut versions = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|source| HistoryError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|s| s.to_str()) == Some("rs")
        {
            versions.push(entry.path().to_path_buf());
        }
    }

    if versions.is_empty() {
        return Err(HistoryError::Empty(dir.to_path_buf()));
    }
    versions.sort();

    for (idx, path) in versions.iter().enumerate() {
        let text = fs::read_to_string(path).map_err(|source| HistoryError::Io {
            path: path.clone(),
            source,
        })?;
        store.create_next_at(key, &text, idx as u64 + 1)?;
    }

    tracing::info!(document = %key, versions = versions.len(), "loaded history");
    Ok(versions.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotProvider;

    #[test]
    fn loads_versions_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("0002.rs"), "fn b() {}").unwrap();
        fs::write(dir.path().join("0001.rs"), "fn a() {}").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = MemorySnapshotStore::new();
        let key = DocumentKey::new("local", "history", "lib.rs");
        let count = load_history_dir(&store, &key, dir.path()).unwrap();

        assert_eq!(count, 2);
        let latest = store.latest(&key).unwrap().unwrap();
        assert_eq!(latest.text(), "fn b() {}");
        assert_eq!(latest.timestamp(), 2);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemorySnapshotStore::new();
        let key = DocumentKey::new("local", "history", "lib.rs");
        assert!(matches!(
            load_history_dir(&store, &key, dir.path()),
            Err(HistoryError::Empty(_))
        ));
    }
}
