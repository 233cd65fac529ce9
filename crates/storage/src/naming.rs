// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-system layout of journal stores and snapshots
//!
//! Names follow `{kind}-{yyyy_mm_dd}-{version:020}-{number:020}` where
//! `kind` is `tx`, `evn`, or `snp`. For journals `number` is the last
//! transaction id when the store was opened; for snapshots it is the
//! snapshot timestamp. Files still being written carry a `tmp_` prefix.

use crate::error::StorageError;
use crate::reader::TornSegment;
use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

const TMP_PREFIX: &str = "tmp_";
const TORN_SUFFIX: &str = ".torn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Transactions,
    Events,
    Snapshot,
}

impl SegmentKind {
    pub fn prefix(self) -> &'static str {
        match self {
            SegmentKind::Transactions => "tx",
            SegmentKind::Events => "evn",
            SegmentKind::Snapshot => "snp",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "tx" => Some(SegmentKind::Transactions),
            "evn" => Some(SegmentKind::Events),
            "snp" => Some(SegmentKind::Snapshot),
            _ => None,
        }
    }
}

/// Parsed segment file name
#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedName {
    kind: SegmentKind,
    date: String,
    version: u64,
    number: u64,
    tmp: bool,
}

fn format_name(kind: SegmentKind, date: &str, version: u64, number: u64) -> String {
    format!("{}-{}-{:020}-{:020}", kind.prefix(), date, version, number)
}

fn parse_name(name: &str) -> Option<ParsedName> {
    let (tmp, rest) = match name.strip_prefix(TMP_PREFIX) {
        Some(rest) => (true, rest),
        None => (false, name),
    };
    let mut parts = rest.split('-');
    let kind = SegmentKind::from_prefix(parts.next()?)?;
    let date = parts.next()?.to_string();
    let version = parts.next()?.parse().ok()?;
    let number = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(ParsedName {
        kind,
        date,
        version,
        number,
        tmp,
    })
}

/// One journal store: a transaction segment and an events segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalStore {
    pub version: u64,
    pub last_transaction_id: u64,
    pub transactions: PathBuf,
    pub events: PathBuf,
}

impl JournalStore {
    pub fn tmp_path(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!("{TMP_PREFIX}{name}"))
    }
}

/// A committed snapshot file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    pub path: PathBuf,
    pub journal_version: u64,
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    dir: PathBuf,
}

impl FileSystemStorage {
    pub fn new(dir: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn today() -> String {
        Utc::now().format("%Y_%m_%d").to_string()
    }

    fn date_of(timestamp: i64) -> String {
        DateTime::from_timestamp_millis(timestamp)
            .unwrap_or_default()
            .format("%Y_%m_%d")
            .to_string()
    }

    fn entries(&self) -> Result<Vec<(PathBuf, ParsedName)>, StorageError> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(parsed) = parse_name(&name) {
                entries.push((entry.path(), parsed));
            }
        }
        Ok(entries)
    }

    /// Published journal stores in version order
    pub fn journal_stores(&self) -> Result<Vec<JournalStore>, StorageError> {
        let mut stores: Vec<JournalStore> = Vec::new();
        let entries = self.entries()?;
        for (path, parsed) in &entries {
            if parsed.tmp || parsed.kind != SegmentKind::Transactions {
                continue;
            }
            let events = self.dir.join(format_name(
                SegmentKind::Events,
                &parsed.date,
                parsed.version,
                parsed.number,
            ));
            stores.push(JournalStore {
                version: parsed.version,
                last_transaction_id: parsed.number,
                transactions: path.clone(),
                events,
            });
        }
        stores.sort_by_key(|s| s.version);
        Ok(stores)
    }

    /// Events segment paths in version order, including ones without a
    /// transaction segment
    pub fn events_segments(&self) -> Result<Vec<PathBuf>, StorageError> {
        let mut segments: Vec<_> = self
            .entries()?
            .into_iter()
            .filter(|(_, p)| !p.tmp && p.kind == SegmentKind::Events)
            .map(|(path, p)| (p.version, path))
            .collect();
        segments.sort();
        Ok(segments.into_iter().map(|(_, path)| path).collect())
    }

    pub fn last_store_version(&self) -> Result<u64, StorageError> {
        Ok(self
            .entries()?
            .iter()
            .filter(|(_, p)| p.kind != SegmentKind::Snapshot)
            .map(|(_, p)| p.version)
            .max()
            .unwrap_or(0))
    }

    /// Describe the store after the newest one on disk; nothing is created
    pub fn next_store(&self, last_transaction_id: u64) -> Result<JournalStore, StorageError> {
        let version = self.last_store_version()? + 1;
        let date = Self::today();
        Ok(JournalStore {
            version,
            last_transaction_id,
            transactions: self.dir.join(format_name(
                SegmentKind::Transactions,
                &date,
                version,
                last_transaction_id,
            )),
            events: self.dir.join(format_name(
                SegmentKind::Events,
                &date,
                version,
                last_transaction_id,
            )),
        })
    }

    /// Rename `tmp_` journal segments to their final names; empty ones are deleted
    pub fn publish_tmp_segments(&self) -> Result<usize, StorageError> {
        let mut published = 0;
        for (path, parsed) in self.entries()? {
            if !parsed.tmp || parsed.kind == SegmentKind::Snapshot {
                continue;
            }
            if fs::metadata(&path)?.len() == 0 {
                fs::remove_file(&path)?;
                continue;
            }
            publish(&path);
            published += 1;
        }
        Ok(published)
    }

    /// Delete snapshots that never reached commit
    pub fn discard_tmp_snapshots(&self) -> Result<usize, StorageError> {
        let mut discarded = 0;
        for (path, parsed) in self.entries()? {
            if parsed.tmp && parsed.kind == SegmentKind::Snapshot {
                tracing::warn!(path = %path.display(), "discarding incomplete snapshot");
                fs::remove_file(&path)?;
                discarded += 1;
            }
        }
        Ok(discarded)
    }

    /// Cut a torn segment back to its readable prefix and set aside the
    /// segments after it, so later restarts replay what this one did
    pub fn repair(&self, torn: &TornSegment) -> Result<(), StorageError> {
        let file = OpenOptions::new().write(true).open(&torn.path)?;
        file.set_len(torn.valid_len)?;
        file.sync_all()?;
        tracing::warn!(
            path = %torn.path.display(),
            valid_len = torn.valid_len,
            "cut torn journal segment"
        );
        for path in &torn.unreached {
            let mut aside = path.clone().into_os_string();
            aside.push(TORN_SUFFIX);
            fs::rename(path, &aside)?;
            tracing::warn!(path = %path.display(), "set aside segment past a torn record");
        }
        Ok(())
    }

    pub fn tmp_snapshot_path(&self, timestamp: i64) -> PathBuf {
        let name = format_name(SegmentKind::Snapshot, &Self::date_of(timestamp), 0, timestamp as u64);
        self.dir.join(format!("{TMP_PREFIX}{name}"))
    }

    pub fn snapshot_path(&self, journal_version: u64, timestamp: i64) -> PathBuf {
        self.dir.join(format_name(
            SegmentKind::Snapshot,
            &Self::date_of(timestamp),
            journal_version,
            timestamp as u64,
        ))
    }

    /// Committed snapshots, newest first
    pub fn snapshots(&self) -> Result<Vec<SnapshotFile>, StorageError> {
        let mut snapshots: Vec<SnapshotFile> = self
            .entries()?
            .into_iter()
            .filter(|(_, p)| !p.tmp && p.kind == SegmentKind::Snapshot)
            .map(|(path, p)| SnapshotFile {
                path,
                journal_version: p.version,
                timestamp: p.number as i64,
            })
            .collect();
        snapshots.sort_by(|a, b| {
            (b.journal_version, b.timestamp).cmp(&(a.journal_version, a.timestamp))
        });
        Ok(snapshots)
    }
}

/// Strip the `tmp_` prefix from a finished segment, logging failures
pub(crate) fn publish(tmp: &Path) {
    let Some(name) = tmp.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return;
    };
    let Some(final_name) = name.strip_prefix(TMP_PREFIX) else {
        return;
    };
    let target = tmp.with_file_name(final_name);
    match fs::rename(tmp, &target) {
        Ok(()) => tracing::debug!(path = %target.display(), "published segment"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::error!(path = %tmp.display(), error = %e, "failed to publish segment"),
    }
}

#[cfg(test)]
#[path = "naming_tests.rs"]
mod tests;
