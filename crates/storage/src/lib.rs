// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

//! cairn-storage: durable journals and snapshots on the local file system
//!
//! Journals are split into segments (stores). Each store is a pair of
//! files, `tx-…` for transactions and `evn-…` for event confirmations,
//! written under a `tmp_` name and renamed once the journal rolls past it.

mod channel;
mod error;
mod journaler;
mod manager;
mod naming;
mod reader;
mod snapshotter;

pub use channel::FileChannel;
pub use error::{JournalError, StorageError};
pub use journaler::Journaler;
pub use manager::{JournalsManager, Replay};
pub use naming::{FileSystemStorage, JournalStore, SegmentKind, SnapshotFile};
pub use reader::{JournalReader, TornSegment};
pub use snapshotter::{FileSnapshotter, InMemorySnapshotter};
