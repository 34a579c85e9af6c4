//! Crash History
//!
//! Fixed-capacity, most-recent-first record of resolved crash points.

use std::collections::VecDeque;

/// Default number of crash points retained.
pub const DEFAULT_HISTORY_CAPACITY: usize = 5;

/// Ring buffer of the most recent crash points.
#[derive(Clone, Debug)]
pub struct HistoryLedger {
    entries: VecDeque<f64>,
    capacity: usize,
}

impl HistoryLedger {
    /// Create an empty ledger holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be positive");
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Record a crash point, evicting the oldest entry when full.
    pub fn append(&mut self, crash_point: f64) {
        self.entries.push_front(crash_point);
        if self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
    }

    /// Copy of the entries, most recent first.
    pub fn to_vec(&self) -> Vec<f64> {
        self.entries.iter().copied().collect()
    }

    /// Most recent crash point.
    pub fn latest(&self) -> Option<f64> {
        self.entries.front().copied()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
