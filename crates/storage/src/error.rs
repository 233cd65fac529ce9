// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use cairn_core::{ChannelError, SerializeError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors from the journal write path
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journaler must be in writing mode")]
    NotWriting,
    #[error("illegal journaler state: {0}")]
    IllegalState(String),
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
    #[error("serialization error: {0}")]
    Serialize(#[from] SerializeError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    /// A complete record on disk that the chain cannot read
    #[error("cannot decode record in {} at offset {offset}: {source}", .path.display())]
    Undecodable {
        path: PathBuf,
        offset: usize,
        source: SerializeError,
    },
}

/// Errors from journal and snapshot file management
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
