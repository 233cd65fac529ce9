// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repository snapshotters

mod file;
mod memory;

pub use file::FileSnapshotter;
pub use memory::InMemorySnapshotter;
