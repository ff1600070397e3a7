//! Mailbox depth monitoring for the session actor.
//!
//! The handle records an enqueue before sending and the actor records a
//! dequeue when it takes a request, so `current_depth` counts requests that
//! are queued or waiting on a full channel.

use crate::observability::metrics;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    /// Below half of capacity.
    Normal,
    /// At or above half of capacity.
    Warning,
    /// At or above capacity; callers are waiting for a slot.
    Critical,
}

/// Mailbox monitor shared between the session handle and actor.
#[derive(Debug)]
pub struct MailboxMonitor {
    capacity: usize,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
    messages_dropped: AtomicU64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
        }
    }

    /// Record a request about to be sent.
    pub fn record_enqueue(&self) {
        let new_depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_depth.fetch_max(new_depth, Ordering::Relaxed);
        metrics::set_mailbox_depth(new_depth);

        match self.level_for_depth(new_depth) {
            MailboxLevel::Critical => warn!(
                target: "live.mailbox",
                depth = new_depth,
                capacity = self.capacity,
                "Session mailbox full, callers waiting"
            ),
            MailboxLevel::Warning => debug!(
                target: "live.mailbox",
                depth = new_depth,
                "Session mailbox depth elevated"
            ),
            MailboxLevel::Normal => {}
        }
    }

    /// Record a request taken by the actor.
    pub fn record_dequeue(&self) {
        let previous = self.saturating_decrement();
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        metrics::set_mailbox_depth(previous.saturating_sub(1));
    }

    /// Record a request that never reached the actor.
    pub fn record_drop(&self) {
        self.saturating_decrement();
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
        warn!(
            target: "live.mailbox",
            dropped = self.messages_dropped.load(Ordering::Relaxed),
            "Session request dropped, actor stopped"
        );
    }

    fn saturating_decrement(&self) -> usize {
        self.depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| {
                Some(d.saturating_sub(1))
            })
            .unwrap_or(0)
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn current_level(&self) -> MailboxLevel {
        self.level_for_depth(self.current_depth())
    }

    fn level_for_depth(&self, depth: usize) -> MailboxLevel {
        if depth >= self.capacity {
            MailboxLevel::Critical
        } else if depth * 2 >= self.capacity {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}
