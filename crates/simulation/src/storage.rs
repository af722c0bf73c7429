//! In-memory snapshot store, one per simulated node.

use paxchain_types::LedgerSnapshot;

/// Stand-in for the on-disk snapshot file. Saves are whole-document
/// replacements, exactly like the production store's temp-file-and-rename.
#[derive(Debug, Default)]
pub struct SimStorage {
    snapshot: Option<LedgerSnapshot>,
    writes: u64,
}

impl SimStorage {
    pub fn new() -> Self {
        SimStorage::default()
    }

    /// Replace the stored snapshot.
    pub fn save(&mut self, snapshot: LedgerSnapshot) {
        self.snapshot = Some(snapshot);
        self.writes += 1;
    }

    /// The last saved snapshot, or the empty ledger if none was ever saved.
    pub fn load(&self) -> LedgerSnapshot {
        self.snapshot.clone().unwrap_or_default()
    }

    /// Whether anything was ever saved.
    pub fn is_empty(&self) -> bool {
        self.snapshot.is_none()
    }

    /// Number of saves, for asserting persist-after-commit behavior.
    pub fn writes(&self) -> u64 {
        self.writes
    }
}
