// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sequential reader over a journal segment
//!
//! Stops at the first record whose length prefix or body is incomplete;
//! everything before it is the valid prefix of the segment.

use cairn_core::Buffer;
use std::path::{Path, PathBuf};

/// Where a replay hit a torn record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TornSegment {
    pub path: PathBuf,
    /// Length of the readable prefix
    pub valid_len: u64,
    /// Later segments the replay never reached
    pub unreached: Vec<PathBuf>,
}

pub struct JournalReader {
    path: PathBuf,
    bytes: Vec<u8>,
    position: usize,
    truncated: bool,
}

impl JournalReader {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        Ok(Self::from_bytes(path, std::fs::read(path)?))
    }

    pub(crate) fn from_bytes(path: &Path, bytes: Vec<u8>) -> Self {
        Self {
            path: path.to_path_buf(),
            bytes,
            position: 0,
            truncated: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte offset just past the last complete record
    pub fn last_valid_position(&self) -> usize {
        self.position
    }

    /// True once a torn record was hit
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    fn stop(&mut self, reason: &'static str) -> Option<Buffer> {
        if !self.truncated {
            tracing::warn!(
                path = %self.path.display(),
                offset = self.position,
                discarded = self.bytes.len() - self.position,
                reason,
                "journal segment is truncated"
            );
        }
        self.truncated = true;
        None
    }
}

impl Iterator for JournalReader {
    type Item = Buffer;

    fn next(&mut self) -> Option<Buffer> {
        if self.truncated {
            return None;
        }
        let remaining = self.bytes.len() - self.position;
        if remaining == 0 {
            return None;
        }
        if remaining < 4 {
            return self.stop("short length prefix");
        }
        let mut prefix = [0u8; 4];
        prefix.copy_from_slice(&self.bytes[self.position..self.position + 4]);
        let len = u32::from_le_bytes(prefix) as usize;
        if len == 0 {
            return self.stop("zero length record");
        }
        if len > remaining - 4 {
            return self.stop("incomplete record");
        }

        let start = self.position + 4;
        let record = self.bytes[start..start + len].to_vec();
        self.position = start + len;
        Some(Buffer::from_vec(record))
    }
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
