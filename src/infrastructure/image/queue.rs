//! Two-level priority queue feeding the fetch pool.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Scheduling priority of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Visible items; dispatched before any queued low priority work.
    High,
    /// Background prefetch.
    #[default]
    Low,
}

/// FIFO within a priority, high before low. Never reorders dispatched work.
#[derive(Debug)]
pub struct FetchQueue<T> {
    high: VecDeque<T>,
    low: VecDeque<T>,
}

impl<T> FetchQueue<T> {
    /// Creates an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            high: VecDeque::new(),
            low: VecDeque::new(),
        }
    }

    /// Appends a task behind others of the same priority.
    pub fn push(&mut self, task: T, priority: Priority) {
        match priority {
            Priority::High => self.high.push_back(task),
            Priority::Low => self.low.push_back(task),
        }
    }

    /// Takes the next task to dispatch.
    pub fn pop(&mut self) -> Option<T> {
        self.high.pop_front().or_else(|| self.low.pop_front())
    }

    /// Removes and returns every task matching `pred`, keeping queue order
    /// for the rest.
    pub fn take_where(&mut self, mut pred: impl FnMut(&T) -> bool) -> Vec<T> {
        let mut taken = Vec::new();
        for lane in [&mut self.high, &mut self.low] {
            let mut kept = VecDeque::with_capacity(lane.len());
            for task in lane.drain(..) {
                if pred(&task) {
                    taken.push(task);
                } else {
                    kept.push_back(task);
                }
            }
            *lane = kept;
        }
        taken
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.high.len() + self.low.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.high.is_empty() && self.low.is_empty()
    }
}

impl<T> Default for FetchQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
