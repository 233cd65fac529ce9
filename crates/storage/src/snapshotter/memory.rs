// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use cairn_core::{RepositoryData, RepositorySnapshotter, SnapshotError, SnapshotIdentifier};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

/// Identifier kind for in-memory snapshots
pub const MEMORY_SNAPSHOT_KIND: u8 = 0x34;

#[derive(Default)]
struct Slots {
    pending: HashMap<SnapshotIdentifier, RepositoryData>,
    committed: Option<(SnapshotIdentifier, u64, RepositoryData)>,
    commits: usize,
}

/// Keeps snapshots in process memory
///
/// Clones share storage, so a test can hand one clone to an engine and
/// inspect or reuse the other after it shuts down.
#[derive(Clone, Default)]
pub struct InMemorySnapshotter {
    slots: Arc<Mutex<Slots>>,
    sequence: Arc<AtomicI64>,
}

impl InMemorySnapshotter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful commits so far
    pub fn commit_count(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).commits
    }
}

impl RepositorySnapshotter for InMemorySnapshotter {
    fn prepare(&self) -> SnapshotIdentifier {
        let timestamp = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        SnapshotIdentifier::new(MEMORY_SNAPSHOT_KIND, timestamp)
    }

    fn snapshot(&self, data: &RepositoryData, id: SnapshotIdentifier) -> Result<(), SnapshotError> {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pending
            .insert(id, data.clone());
        Ok(())
    }

    fn commit(&self, last_journal_version: u64, id: SnapshotIdentifier) -> Result<(), SnapshotError> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        match slots.pending.remove(&id) {
            Some(data) => {
                slots.committed = Some((id, last_journal_version, data));
                slots.commits += 1;
            }
            None => tracing::warn!(timestamp = id.timestamp, "no snapshot to commit"),
        }
        Ok(())
    }

    fn load(&self) -> Result<Option<RepositoryData>, SnapshotError> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Ok(slots.committed.as_ref().map(|(_, _, data)| data.clone()))
    }

    fn last_snapshot(&self) -> Option<SnapshotIdentifier> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.committed.as_ref().map(|(id, _, _)| *id)
    }

    fn last_journal_version_snapshotted(&self) -> u64 {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.committed.as_ref().map_or(0, |(_, version, _)| *version)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
