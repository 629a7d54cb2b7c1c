//! Cooperative timer queue on virtual time
//!
//! Every deferred action in the pipeline (calibration decay, rate-shaped
//! delivery, intent ticks) is a task in one queue. Time only moves when the
//! owner calls [`TimerQueue::pop_due`], so a cancel issued before the due time
//! always wins and tests can fast-forward deterministically.

use std::collections::{BTreeMap, HashMap};

/// Handle returned by [`TimerQueue::schedule`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Pending tasks ordered by due time, then by scheduling order
#[derive(Debug)]
pub struct TimerQueue<T> {
    now_ms: u64,
    next_id: u64,
    pending: BTreeMap<(u64, TimerId), T>,
    due_index: HashMap<TimerId, u64>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            next_id: 0,
            pending: BTreeMap::new(),
            due_index: HashMap::new(),
        }
    }

    /// Current virtual time in milliseconds
    pub fn now(&self) -> u64 {
        self.now_ms
    }

    /// Schedule `task` to become due `delay_ms` from now
    pub fn schedule(&mut self, delay_ms: u64, task: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let due = self.now_ms.saturating_add(delay_ms);
        self.pending.insert((due, id), task);
        self.due_index.insert(id, due);
        id
    }

    /// Cancel a pending timer. Cancelling a fired or already cancelled timer is
    /// a no-op and returns `None`.
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        let due = self.due_index.remove(&id)?;
        self.pending.remove(&(due, id))
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.due_index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Due time of the earliest pending timer
    pub fn next_due(&self) -> Option<u64> {
        self.pending.keys().next().map(|(due, _)| *due)
    }

    /// Pop the earliest task due at or before `until_ms`, moving the clock to
    /// its due time. Returns `None` (and moves the clock to `until_ms`) once
    /// nothing else is due.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<(TimerId, T)> {
        let key = match self.pending.keys().next() {
            Some(&(due, id)) if due <= until_ms => (due, id),
            _ => {
                self.now_ms = self.now_ms.max(until_ms);
                return None;
            }
        };
        let task = self.pending.remove(&key)?;
        self.due_index.remove(&key.1);
        self.now_ms = self.now_ms.max(key.0);
        Some((key.1, task))
    }
}
