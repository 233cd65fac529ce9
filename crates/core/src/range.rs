// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Closed ranges of transaction ids

use std::fmt;

/// Closed interval `[lo, hi]`, ordered by its lower bound
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LongRange {
    pub lo: u64,
    pub hi: u64,
}

impl LongRange {
    pub fn new(lo: u64, hi: u64) -> Self {
        debug_assert!(lo <= hi, "range bounds out of order");
        Self { lo, hi }
    }

    pub fn single(value: u64) -> Self {
        Self::new(value, value)
    }

    pub fn contains(&self, value: u64) -> bool {
        self.lo <= value && value <= self.hi
    }

    /// True when `value` lies entirely above this range
    pub fn higher(&self, value: u64) -> bool {
        value > self.hi
    }

    /// Remove `value` from the range, returning what remains on each side
    pub fn split(&self, value: u64) -> (Option<LongRange>, Option<LongRange>) {
        if !self.contains(value) {
            return (Some(*self), None);
        }
        let below = (value > self.lo).then(|| LongRange::new(self.lo, value - 1));
        let above = (value < self.hi).then(|| LongRange::new(value + 1, self.hi));
        (below, above)
    }

    /// Number of ids covered
    pub fn width(&self) -> u64 {
        self.hi - self.lo + 1
    }
}

impl fmt::Debug for LongRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..={}]", self.lo, self.hi)
    }
}

#[cfg(test)]
#[path = "range_tests.rs"]
mod tests;
