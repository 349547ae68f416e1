//! Last-known snapshot of a tracked record instance.

use trail_core::Snapshot;

/// Holds the snapshot of one record instance as of its last load or save.
///
/// Each record instance owns its own tracker; two instances of the same
/// database row never share state.
#[derive(Debug, Clone, Default)]
pub struct SnapshotTracker {
    current: Snapshot,
}

impl SnapshotTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored snapshot.
    pub fn record_snapshot(&mut self, attributes: Snapshot) {
        self.current = attributes;
    }

    /// Last recorded snapshot, empty if nothing was recorded yet.
    pub fn current_snapshot(&self) -> &Snapshot {
        &self.current
    }

    pub fn clear(&mut self) {
        self.current = Snapshot::new();
    }
}
