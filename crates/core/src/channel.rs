// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only byte channel contract
//!
//! A channel is one journal segment. Every record written through it is
//! framed with a 4-byte little-endian length prefix so readers can detect
//! a torn tail.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("channel {0} is closed")]
    Closed(String),
}

pub trait Channel: Send {
    /// Identifier used in logs (usually the segment file name)
    fn name(&self) -> &str;

    /// Append one length-prefixed record
    ///
    /// `end_of_batch` marks the last record of a batch; durable channels
    /// flush (and optionally sync) at that point.
    fn write(&mut self, record: &[u8], end_of_batch: bool) -> Result<(), ChannelError>;

    /// Bytes written to the segment so far, including length prefixes
    fn size(&self) -> u64;

    fn is_open(&self) -> bool;

    fn close(&mut self) -> Result<(), ChannelError>;
}
