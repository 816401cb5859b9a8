//! Per-account event queues behind one shared debounce deadline
//!
//! Every accepted event pushes the deadline out to `now + debounce`, whichever
//! account it belongs to. When the deadline passes, every queue is drained at
//! once. A steady stream for one account therefore also holds back the queued
//! events of every other account.

use chrono::{DateTime, Utc};
use pabx_ami::AmiMessage;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// A raw event and the wall-clock time it was queued
#[derive(Debug, Clone)]
pub struct BufferedEntry {
    pub event: AmiMessage,
    pub arrived_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct EventBuffer {
    debounce: Duration,
    queues: HashMap<String, Vec<BufferedEntry>>,
    deadline: Option<Instant>,
}

impl EventBuffer {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            queues: HashMap::new(),
            deadline: None,
        }
    }

    /// Queue an event for `account_code` and reset the shared deadline
    pub fn push(&mut self, account_code: impl Into<String>, event: AmiMessage) {
        self.queues
            .entry(account_code.into())
            .or_default()
            .push(BufferedEntry {
                event,
                arrived_at: Utc::now(),
            });
        self.deadline = Some(Instant::now() + self.debounce);
    }

    /// When the next flush is due, if anything is queued
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Drain every queue and clear the deadline
    pub fn take_all(&mut self) -> HashMap<String, Vec<BufferedEntry>> {
        self.deadline = None;
        std::mem::take(&mut self.queues)
    }

    /// Total queued events
    pub fn len(&self) -> usize {
        self.queues.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    pub fn queued_for(&self, account_code: &str) -> usize {
        self.queues.get(account_code).map_or(0, Vec::len)
    }
}
