// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event reconciliation during restore
//!
//! First the events journal is scanned with [`RestorerEventBus::process_next_event`]
//! to find transactions whose events may not have gone out. Then, while
//! transactions are replayed, [`RestorerEventBus::publish_event`] lets an
//! event through only when its transaction is newer than anything in the
//! events journal or falls in one of the unconfirmed ranges.

use crate::error::PublishError;
use crate::events::EventBus;
use cairn_core::{EventsCommitInfo, LongRange, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct RestorerEventBus {
    inner: Arc<dyn EventBus>,
    unpublished: BTreeSet<LongRange>,
    current_transaction_id: u64,
    last_transaction_id: Option<u64>,
    max_transaction_id: Option<u64>,
}

impl RestorerEventBus {
    pub fn new(inner: Arc<dyn EventBus>) -> Self {
        Self {
            inner,
            unpublished: BTreeSet::new(),
            current_transaction_id: 0,
            last_transaction_id: None,
            max_transaction_id: None,
        }
    }

    pub fn process_next_event(&mut self, info: &EventsCommitInfo) {
        let id = info.transaction_id;
        if info.is_failed() {
            tracing::info!(transaction_id = id, "events of transaction were not published");
            self.unpublished.insert(LongRange::single(id));
        } else {
            match self.last_transaction_id {
                Some(last) if id <= last => {
                    tracing::warn!(transaction_id = id, last, "events commit id went backwards");
                }
                Some(last) if id - last > 1 => {
                    tracing::debug!(from = last + 1, to = id - 1, "missing transaction events");
                    self.unpublished.insert(LongRange::new(last + 1, id - 1));
                }
                _ => {}
            }
            self.confirm(id);
        }
        self.last_transaction_id = Some(id);
        self.max_transaction_id = Some(self.max_transaction_id.map_or(id, |max| max.max(id)));
    }

    /// Remove `id` from every range covering it
    fn confirm(&mut self, id: u64) {
        let covering: Vec<LongRange> = self
            .unpublished
            .iter()
            .filter(|r| r.contains(id))
            .copied()
            .collect();
        for range in covering {
            self.unpublished.remove(&range);
            let (below, above) = range.split(id);
            self.unpublished.extend(below);
            self.unpublished.extend(above);
        }
    }

    pub fn set_current_transaction_id(&mut self, transaction_id: u64) {
        self.current_transaction_id = transaction_id;
    }

    pub fn current_transaction_id(&self) -> u64 {
        self.current_transaction_id
    }

    pub fn max_transaction_id(&self) -> Option<u64> {
        self.max_transaction_id
    }

    /// True when the current transaction's events must go out again
    ///
    /// Ranges wholly below the current transaction are pruned.
    fn should_publish(&mut self) -> bool {
        let current = self.current_transaction_id;
        if self.max_transaction_id.is_none_or(|max| current > max) {
            return true;
        }
        while let Some(range) = self.unpublished.first().copied() {
            if !range.higher(current) {
                return range.contains(current);
            }
            self.unpublished.pop_first();
        }
        false
    }

    /// Forward `event` to the live bus if it was not confirmed before
    ///
    /// Returns whether the event was forwarded.
    pub fn publish_event(&mut self, event: Arc<dyn Value>) -> Result<bool, PublishError> {
        if !self.should_publish() {
            return Ok(false);
        }
        self.inner.publish(event)?;
        Ok(true)
    }

    pub fn unpublished(&self) -> &BTreeSet<LongRange> {
        &self.unpublished
    }

    pub fn clear(&mut self) {
        self.unpublished.clear();
    }
}

#[cfg(test)]
#[path = "restorer_tests.rs"]
mod tests;
