//! Named lock entities with FIFO wait semantics (`spec.md` §3, §4.4).

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::LockId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockStatus {
    Held,
    Released,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lock {
    pub id: LockId,
    pub key: String,
    pub holder: String,
    pub status: LockStatus,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Lock {
    pub fn new(key: impl Into<String>, holder: impl Into<String>, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            id: LockId::new(),
            key: key.into(),
            holder: holder.into(),
            status: LockStatus::Held,
            acquired_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == LockStatus::Held && now >= self.expires_at
    }

    pub fn release(&mut self) {
        self.status = LockStatus::Released;
    }

    pub fn expire(&mut self) {
        self.status = LockStatus::Expired;
    }
}

/// A single key's FIFO wait queue. Waiters are never granted out of order
/// (`spec.md` §4.4's deadlock-avoidance note: never block a holder behind a
/// later-arriving waiter).
#[derive(Debug, Default)]
pub struct LockWaitQueue {
    waiters: VecDeque<String>,
}

impl LockWaitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, holder: impl Into<String>) {
        self.waiters.push_back(holder.into());
    }

    pub fn peek_next(&self) -> Option<&str> {
        self.waiters.front().map(String::as_str)
    }

    pub fn dequeue(&mut self) -> Option<String> {
        self.waiters.pop_front()
    }

    pub fn remove(&mut self, holder: &str) {
        self.waiters.retain(|h| h != holder);
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_expires_after_ttl() {
        let lock = Lock::new("schema-migration", "pilot-1", chrono::Duration::seconds(-1));
        assert!(lock.is_expired(Utc::now()));
    }

    #[test]
    fn wait_queue_grants_in_fifo_order() {
        let mut queue = LockWaitQueue::new();
        queue.enqueue("pilot-1");
        queue.enqueue("pilot-2");
        queue.enqueue("pilot-3");
        assert_eq!(queue.peek_next(), Some("pilot-1"));
        assert_eq!(queue.dequeue(), Some("pilot-1".to_string()));
        assert_eq!(queue.peek_next(), Some("pilot-2"));
    }

    #[test]
    fn wait_queue_removes_cancelled_waiter_without_disturbing_order() {
        let mut queue = LockWaitQueue::new();
        queue.enqueue("pilot-1");
        queue.enqueue("pilot-2");
        queue.remove("pilot-1");
        assert_eq!(queue.peek_next(), Some("pilot-2"));
        assert_eq!(queue.len(), 1);
    }
}
