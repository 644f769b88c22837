//! Bounded history of accepted cycles.
//!
//! The history is the sliding-window substrate for the statistics engine:
//!
//! - **Bounded capacity**: never holds more than its capacity (500 by default)
//! - **FIFO eviction**: appending past capacity drops exactly the oldest record
//! - **Insertion order**: records are never re-sorted, even if upstream
//!   timestamps are inconsistent
//!
//! # Example
//!
//! ```rust,ignore
//! use cycle_twin::twin::{CycleRecord, Endpoint, HistoryBuffer};
//!
//! let mut history = HistoryBuffer::new();
//! history.append(CycleRecord::new(Endpoint::Top, 0, 1000, 2900, 0));
//! assert_eq!(history.recent(20).len(), 1);
//! ```

use crate::twin::types::CycleRecord;
use std::collections::VecDeque;

/// Default number of cycles retained.
pub const HISTORY_CAPACITY: usize = 500;

/// A fixed-capacity, FIFO-evicting sequence of [`CycleRecord`]s.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    records: VecDeque<CycleRecord>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Creates an empty history with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    /// Creates an empty history holding at most `capacity` records.
    ///
    /// # Panics
    ///
    /// Panics if capacity is 0.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "History capacity must be greater than 0");
        Self { records: VecDeque::with_capacity(capacity), capacity }
    }

    /// Appends a record, evicting the oldest one if the buffer is full.
    ///
    /// Returns the evicted record, if any.
    pub fn append(&mut self, record: CycleRecord) -> Option<CycleRecord> {
        let evicted = if self.records.len() >= self.capacity {
            self.records.pop_front()
        } else {
            None
        };
        self.records.push_back(record);
        evicted
    }

    /// Returns the last `n` records, oldest first.
    ///
    /// If `n` exceeds the current length, every record is returned.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<&CycleRecord> {
        let skip = self.records.len().saturating_sub(n);
        self.records.iter().skip(skip).collect()
    }

    /// Most recently appended record.
    #[must_use]
    pub fn latest(&self) -> Option<&CycleRecord> {
        self.records.back()
    }

    /// Oldest retained record.
    #[must_use]
    pub fn oldest(&self) -> Option<&CycleRecord> {
        self.records.front()
    }

    /// Number of retained records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no cycles have been retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Maximum number of retained records.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterates records from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &CycleRecord> {
        self.records.iter()
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::twin::types::Endpoint;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// History never exceeds its capacity.
        #[test]
        fn prop_history_never_exceeds_capacity(
            capacity in 1usize..600,
            appends in 0usize..1500
        ) {
            let mut h = HistoryBuffer::with_capacity(capacity);

            for i in 0..appends {
                h.append(CycleRecord::new(Endpoint::Base, 0, 1, 2, i as i64));
            }

            prop_assert_eq!(h.len(), appends.min(capacity));
        }

        /// recent(n) is always the tail of everything appended.
        #[test]
        fn prop_recent_is_tail(
            capacity in 1usize..50,
            stamps in prop::collection::vec(any::<i32>(), 0..120),
            n in 0usize..60
        ) {
            let mut h = HistoryBuffer::with_capacity(capacity);
            for &s in &stamps {
                h.append(CycleRecord::new(Endpoint::Top, 0, 1, 2, i64::from(s)));
            }

            let got: Vec<i64> = h.recent(n).iter().map(|c| c.captured_at_ms).collect();
            let kept = stamps.len().min(capacity).min(n);
            let expected: Vec<i64> = stamps[stamps.len() - kept..].iter().map(|&s| i64::from(s)).collect();

            prop_assert_eq!(got, expected);
        }
    }
}
