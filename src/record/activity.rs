use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed-capacity buffer that evicts the oldest item when full.
///
/// Items come back in insertion order, oldest first. `len() <= capacity()`
/// always holds.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    buffer: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Pushes an item, returning the evicted one if the buffer was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.buffer.len() >= self.capacity {
            self.buffer.pop_front()
        } else {
            None
        };
        self.buffer.push_back(item);
        evicted
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffer.iter()
    }

    /// The newest `n` items, oldest of them first.
    pub fn latest(&self, n: usize) -> impl Iterator<Item = &T> {
        self.buffer.iter().skip(self.buffer.len().saturating_sub(n))
    }
}

impl<T> RingBuffer<T> {
    /// Rebuilds a buffer from persisted items, keeping only the newest.
    pub fn from_items(capacity: usize, items: impl IntoIterator<Item = T>) -> Self {
        let mut ring = Self::new(capacity);
        for item in items {
            ring.push(item);
        }
        ring
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Created,
    Approved,
    AutoApproved,
    Rejected,
    Retried,
    Published,
    Failed,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Created => write!(f, "created"),
            Action::Approved => write!(f, "approved"),
            Action::AutoApproved => write!(f, "auto_approved"),
            Action::Rejected => write!(f, "rejected"),
            Action::Retried => write!(f, "retried"),
            Action::Published => write!(f, "published"),
            Action::Failed => write!(f, "failed"),
        }
    }
}

/// One line of the operator-facing activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub record_id: String,
    pub action: Action,
    #[serde(default)]
    pub detail: String,
}

impl AuditEntry {
    pub fn new(record_id: &str, action: Action, detail: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            record_id: record_id.to_string(),
            action,
            detail: detail.into(),
        }
    }
}
