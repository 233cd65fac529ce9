// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot storage contract
//!
//! A snapshot is written in three steps: `prepare` hands out an identifier,
//! `snapshot` materializes repository data under it (possibly on a
//! background worker), and `commit` publishes it once the transaction that
//! triggered it is durable in the journal.

use crate::repository::RepositoryData;
use crate::serializer::SerializeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] SerializeError),
    #[error("invalid snapshot format: {0}")]
    InvalidFormat(String),
    #[error("snapshot not found: {0:?}")]
    NotFound(SnapshotIdentifier),
}

/// Correlates a prepared snapshot with its later commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotIdentifier {
    pub kind: u8,
    pub timestamp: i64,
}

impl SnapshotIdentifier {
    pub fn new(kind: u8, timestamp: i64) -> Self {
        Self { kind, timestamp }
    }
}

pub trait RepositorySnapshotter: Send + Sync {
    fn prepare(&self) -> SnapshotIdentifier;

    fn snapshot(&self, data: &RepositoryData, id: SnapshotIdentifier) -> Result<(), SnapshotError>;

    /// Publish a snapshot taken under `id`
    ///
    /// Must tolerate an `id` whose `snapshot` call failed or never ran.
    fn commit(&self, last_journal_version: u64, id: SnapshotIdentifier) -> Result<(), SnapshotError>;

    /// Load the newest readable snapshot, if any
    ///
    /// Afterwards `last_snapshot` and `last_journal_version_snapshotted`
    /// describe the snapshot that was returned.
    fn load(&self) -> Result<Option<RepositoryData>, SnapshotError>;

    fn last_snapshot(&self) -> Option<SnapshotIdentifier>;

    /// Journal store version recorded with the newest committed snapshot
    fn last_journal_version_snapshotted(&self) -> u64;
}
