// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Journal record types

use crate::value::{Payload, Value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Flag carried by system-initiated snapshot transactions
pub const SNAPSHOTTING_FLAG: u64 = 0x345;

/// Flag on an events commit record whose publication failed
pub const ASYNC_ERROR_FLAG: u64 = 0x1;

/// One durable transaction: its id, time, and the ordered commits it applied
#[derive(Debug, Clone)]
pub struct TransactionCommitInfo {
    pub transaction_id: u64,
    pub time: i64,
    pub flag: u64,
    pub tag: u64,
    pub commits: Vec<Arc<dyn Value>>,
}

impl TransactionCommitInfo {
    pub fn new(transaction_id: u64, time: i64, commits: Vec<Arc<dyn Value>>) -> Self {
        Self {
            transaction_id,
            time,
            flag: 0,
            tag: 0,
            commits,
        }
    }

    pub fn with_flag(mut self, flag: u64) -> Self {
        self.flag = flag;
        self
    }

    pub fn with_tag(mut self, tag: u64) -> Self {
        self.tag = tag;
        self
    }

    pub fn has_flag(&self, flag: u64) -> bool {
        self.flag & flag == flag
    }
}

/// Confirmation that a transaction's events reached the event bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventsCommitInfo {
    pub transaction_id: u64,
    pub time: i64,
    pub flag: u64,
}

impl EventsCommitInfo {
    pub fn new(transaction_id: u64, time: i64, flag: u64) -> Self {
        Self {
            transaction_id,
            time,
            flag,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.flag & ASYNC_ERROR_FLAG == ASYNC_ERROR_FLAG
    }
}

/// Reserved repository entity recording the last transaction in a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub last_transaction_id: u64,
}

impl SystemInfo {
    /// Entity id under which the record is stored
    pub const ID: u64 = 0;
}

impl Payload for SystemInfo {
    const TYPE_NAME: &'static str = "cairn.SystemInfo";
}
