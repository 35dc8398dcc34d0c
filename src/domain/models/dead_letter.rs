//! Dead-letter queue and circuit-breaker records (`SPEC_FULL.md` §3/§10).
//!
//! Grounded on `event_store.rs`'s `DeadLetterEntry`/`CircuitBreakerRecord`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::EventId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub id: EventId,
    pub original_event_id: EventId,
    pub mailbox: String,
    pub failure_reason: String,
    pub delivery_attempts: u32,
    pub first_failed_at: DateTime<Utc>,
    pub last_failed_at: DateTime<Utc>,
}

impl DeadLetterEntry {
    pub fn new(original_event_id: EventId, mailbox: impl Into<String>, failure_reason: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EventId::new(),
            original_event_id,
            mailbox: mailbox.into(),
            failure_reason: failure_reason.into(),
            delivery_attempts: 1,
            first_failed_at: now,
            last_failed_at: now,
        }
    }

    pub fn record_retry_failure(&mut self, reason: impl Into<String>) {
        self.delivery_attempts += 1;
        self.failure_reason = reason.into();
        self.last_failed_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Per-mailbox circuit breaker: trips `Open` after `failure_threshold`
/// consecutive delivery failures, and probes with a single delivery
/// (`HalfOpen`) after `cooldown` elapses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerRecord {
    pub mailbox: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub opened_at: Option<DateTime<Utc>>,
    pub cooldown: chrono::Duration,
}

impl CircuitBreakerRecord {
    pub fn new(mailbox: impl Into<String>, failure_threshold: u32, cooldown: chrono::Duration) -> Self {
        Self {
            mailbox: mailbox.into(),
            state: CircuitState::Closed,
            consecutive_failures: 0,
            failure_threshold,
            opened_at: None,
            cooldown,
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.state = CircuitState::Closed;
        self.opened_at = None;
    }

    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        self.consecutive_failures += 1;
        if self.state == CircuitState::HalfOpen || self.consecutive_failures >= self.failure_threshold {
            self.state = CircuitState::Open;
            self.opened_at = Some(now);
        }
    }

    /// Whether delivery should be attempted right now, transitioning
    /// `Open -> HalfOpen` once the cooldown has elapsed.
    pub fn should_attempt(&mut self, now: DateTime<Utc>) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                if let Some(opened_at) = self.opened_at {
                    if now - opened_at >= self.cooldown {
                        self.state = CircuitState::HalfOpen;
                        return true;
                    }
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_opens_after_threshold_failures() {
        let mut cb = CircuitBreakerRecord::new("mailbox-a", 3, chrono::Duration::seconds(30));
        let now = Utc::now();
        cb.record_failure(now);
        cb.record_failure(now);
        assert_eq!(cb.state, CircuitState::Closed);
        cb.record_failure(now);
        assert_eq!(cb.state, CircuitState::Open);
    }

    #[test]
    fn circuit_half_opens_after_cooldown_and_closes_on_success() {
        let mut cb = CircuitBreakerRecord::new("mailbox-a", 1, chrono::Duration::seconds(10));
        let t0 = Utc::now();
        cb.record_failure(t0);
        assert!(!cb.should_attempt(t0));
        let t1 = t0 + chrono::Duration::seconds(11);
        assert!(cb.should_attempt(t1));
        assert_eq!(cb.state, CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state, CircuitState::Closed);
    }
}
