//! On-disk snapshot store.
//!
//! One JSON file per node, replaced atomically on every save: the document
//! is written to a sibling temp file and renamed over the target, so a
//! crash mid-write can never leave a partial snapshot behind. A save
//! failure is fatal to the process (the runner propagates it); a missing
//! file on load just means a fresh node.

use paxchain_types::{LedgerSnapshot, NodeId};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding failed: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Durable whole-snapshot persistence for one node.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// The store for `node`, under `dir` (file `state_node_<id>.json`).
    pub fn for_node(dir: impl AsRef<Path>, node: NodeId) -> Self {
        SnapshotStore {
            path: dir.as_ref().join(format!("state_node_{node}.json")),
        }
    }

    /// The snapshot file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the snapshot durably (write-temp-then-rename).
    pub fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), StorageError> {
        let tmp = self.path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(snapshot)?;
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), depth = snapshot.depth(), "snapshot saved");
        Ok(())
    }

    /// The last successfully saved snapshot, or `None` if none exists.
    pub fn load(&self) -> Result<Option<LedgerSnapshot>, StorageError> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&data)?))
    }
}
