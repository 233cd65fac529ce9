// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshots as files next to the journals
//!
//! Layout: `b"CSNP"`, format version (`u32`), CRC32 of the body (`u32`),
//! then the serialized repository. Files are written under a `tmp_` name
//! and renamed on commit, so a crash never leaves a half-written
//! snapshot under a final name.

use crate::error::StorageError;
use crate::naming::{FileSystemStorage, SnapshotFile};
use cairn_core::{
    Buffer, Clock, RepositoryData, RepositorySnapshotter, SerializerChain, SnapshotError,
    SnapshotIdentifier, SystemClock,
};
use std::fs::{self, File};
use std::io::Write;
use std::sync::{Arc, Mutex};

const MAGIC: &[u8; 4] = b"CSNP";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 12;

/// Identifier kind for file snapshots
pub const FILE_SNAPSHOT_KIND: u8 = 0x12;

#[derive(Debug, Clone, Copy)]
struct Committed {
    id: SnapshotIdentifier,
    journal_version: u64,
}

pub struct FileSnapshotter {
    storage: FileSystemStorage,
    chain: Arc<SerializerChain>,
    clock: Arc<dyn Clock>,
    last_timestamp: Mutex<i64>,
    committed: Mutex<Option<Committed>>,
}

impl FileSnapshotter {
    pub fn new(storage: FileSystemStorage, chain: Arc<SerializerChain>) -> Self {
        Self::with_clock(storage, chain, Arc::new(SystemClock))
    }

    pub fn with_clock(
        storage: FileSystemStorage,
        chain: Arc<SerializerChain>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let committed = match storage.snapshots() {
            Ok(snapshots) => snapshots.first().map(|s| Committed {
                id: SnapshotIdentifier::new(FILE_SNAPSHOT_KIND, s.timestamp),
                journal_version: s.journal_version,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "cannot list snapshots");
                None
            }
        };
        let last_timestamp = committed.map(|c| c.id.timestamp).unwrap_or(i64::MIN);
        Self {
            storage,
            chain,
            clock,
            last_timestamp: Mutex::new(last_timestamp),
            committed: Mutex::new(committed),
        }
    }

    fn read(&self, file: &SnapshotFile) -> Result<RepositoryData, SnapshotError> {
        let bytes = fs::read(&file.path)?;
        if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
            return Err(SnapshotError::InvalidFormat("bad magic".to_string()));
        }
        let mut header = Buffer::from_vec(bytes[4..HEADER_LEN].to_vec());
        let version = header
            .read_u32()
            .map_err(|e| SnapshotError::InvalidFormat(e.to_string()))?;
        if version != FORMAT_VERSION {
            return Err(SnapshotError::InvalidFormat(format!(
                "unsupported version: {version} (expected {FORMAT_VERSION})"
            )));
        }
        let stored_crc = header
            .read_u32()
            .map_err(|e| SnapshotError::InvalidFormat(e.to_string()))?;
        let body = &bytes[HEADER_LEN..];
        let computed_crc = crc32fast::hash(body);
        if stored_crc != computed_crc {
            return Err(SnapshotError::InvalidFormat(format!(
                "checksum mismatch: stored {stored_crc:#010x}, computed {computed_crc:#010x}"
            )));
        }
        let mut body = Buffer::from_vec(body.to_vec());
        Ok(self.chain.deserialize_repository(&mut body)?)
    }
}

impl RepositorySnapshotter for FileSnapshotter {
    fn prepare(&self) -> SnapshotIdentifier {
        let mut last = self.last_timestamp.lock().unwrap_or_else(|e| e.into_inner());
        let timestamp = self.clock.now_millis().max(last.saturating_add(1));
        *last = timestamp;
        SnapshotIdentifier::new(FILE_SNAPSHOT_KIND, timestamp)
    }

    fn snapshot(&self, data: &RepositoryData, id: SnapshotIdentifier) -> Result<(), SnapshotError> {
        let mut body = Buffer::with_capacity(64 * 1024);
        self.chain.serialize_repository(data, &mut body)?;

        let mut out = Buffer::with_capacity(HEADER_LEN + body.len());
        out.write_bytes(MAGIC);
        out.write_u32(FORMAT_VERSION);
        out.write_u32(crc32fast::hash(body.as_slice()));
        out.write_bytes(body.as_slice());

        let path = self.storage.tmp_snapshot_path(id.timestamp);
        let mut file = File::create(&path)?;
        file.write_all(out.as_slice())?;
        file.sync_all()?;
        tracing::debug!(
            path = %path.display(),
            entities = data.len(),
            bytes = out.len(),
            "wrote snapshot"
        );
        Ok(())
    }

    fn commit(&self, last_journal_version: u64, id: SnapshotIdentifier) -> Result<(), SnapshotError> {
        let tmp = self.storage.tmp_snapshot_path(id.timestamp);
        if !tmp.exists() {
            tracing::warn!(timestamp = id.timestamp, "no snapshot to commit");
            return Ok(());
        }
        let target = self.storage.snapshot_path(last_journal_version, id.timestamp);
        fs::rename(&tmp, &target)?;
        *self.committed.lock().unwrap_or_else(|e| e.into_inner()) = Some(Committed {
            id,
            journal_version: last_journal_version,
        });
        tracing::info!(
            path = %target.display(),
            journal_version = last_journal_version,
            "committed snapshot"
        );
        Ok(())
    }

    fn load(&self) -> Result<Option<RepositoryData>, SnapshotError> {
        for file in self.storage.snapshots().map_err(storage_error)? {
            match self.read(&file) {
                Ok(data) => {
                    *self.committed.lock().unwrap_or_else(|e| e.into_inner()) = Some(Committed {
                        id: SnapshotIdentifier::new(FILE_SNAPSHOT_KIND, file.timestamp),
                        journal_version: file.journal_version,
                    });
                    tracing::info!(
                        path = %file.path.display(),
                        entities = data.len(),
                        "loaded snapshot"
                    );
                    return Ok(Some(data));
                }
                Err(e) => {
                    tracing::warn!(path = %file.path.display(), error = %e, "skipping unreadable snapshot");
                }
            }
        }
        Ok(None)
    }

    fn last_snapshot(&self) -> Option<SnapshotIdentifier> {
        self.committed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .map(|c| c.id)
    }

    fn last_journal_version_snapshotted(&self) -> u64 {
        self.committed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .map(|c| c.journal_version)
            .unwrap_or(0)
    }
}

fn storage_error(e: StorageError) -> SnapshotError {
    let StorageError::Io(io) = e;
    SnapshotError::Io(io)
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
