// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed journal segment

use cairn_core::{Channel, ChannelError, ChannelMode};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Append-only segment file with `u32` length-prefixed records
pub struct FileChannel {
    name: String,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    size: u64,
    mode: ChannelMode,
}

impl FileChannel {
    /// Open or create a segment for appending
    pub fn open(path: &Path, mode: ChannelMode) -> Result<Self, ChannelError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let size = file.metadata()?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            name,
            path: path.to_path_buf(),
            writer: Some(BufWriter::with_capacity(64 * 1024, file)),
            size,
            mode,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sync(&mut self) -> Result<(), ChannelError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
            if self.mode == ChannelMode::Fsync {
                writer.get_ref().sync_data()?;
            }
        }
        Ok(())
    }
}

impl Channel for FileChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, record: &[u8], end_of_batch: bool) -> Result<(), ChannelError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ChannelError::Closed(self.name.clone()))?;
        writer.write_all(&(record.len() as u32).to_le_bytes())?;
        writer.write_all(record)?;
        self.size += 4 + record.len() as u64;

        if end_of_batch {
            self.sync()?;
        }
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    fn close(&mut self) -> Result<(), ChannelError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for FileChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileChannel")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
