//! Presentation delay queue
//!
//! Events show up in the text feed immediately but are only revealed on the
//! map once `timestamp + delay` has passed. The queue is ticked at a fixed
//! cadence; each tick promotes everything that has become due.

use crate::event::{AttackEvent, EventKey};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::Duration;

/// An event waiting for its reveal time.
#[derive(Clone, Debug)]
pub struct PendingVisualEvent {
    pub event: AttackEvent,
    pub enqueued_at: DateTime<Utc>,
}

impl PendingVisualEvent {
    fn due_at(&self, delay: chrono::Duration) -> DateTime<Utc> {
        self.event
            .timestamp
            .checked_add_signed(delay)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

pub struct DelayQueue {
    delay: chrono::Duration,
    pending: Vec<PendingVisualEvent>,
    keys: HashSet<EventKey>,
}

impl DelayQueue {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay: chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero()),
            pending: Vec::new(),
            keys: HashSet::new(),
        }
    }

    /// Queue an event for reveal. An event whose key is already pending is
    /// the same logical event and is ignored; returns whether it was added.
    pub fn enqueue(&mut self, event: AttackEvent, now: DateTime<Utc>) -> bool {
        if !self.keys.insert(event.key()) {
            tracing::debug!(key = %event.key(), "duplicate pending event ignored");
            return false;
        }
        self.pending.push(PendingVisualEvent { event, enqueued_at: now });
        true
    }

    /// Remove and return every event due at `now`, oldest first.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<AttackEvent> {
        let delay = self.delay;
        let (mut due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| p.due_at(delay) <= now);
        self.pending = waiting;

        due.sort_by_key(|p| p.event.timestamp);
        due.into_iter()
            .map(|p| {
                self.keys.remove(&p.event.key());
                let waited = (now - p.enqueued_at).num_seconds();
                tracing::debug!(key = %p.event.key(), waited_secs = waited, "event due");
                p.event
            })
            .collect()
    }

    /// When the next pending event becomes due.
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.pending.iter().map(|p| p.due_at(self.delay)).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
