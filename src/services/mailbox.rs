//! Per-pilot mailbox with long-poll delivery (`spec.md` §4.3).
//!
//! Adapts the publish/subscribe model in `event_bus.rs` into a cursor-based
//! mailbox: each mailbox tracks its own read cursor (a `Sequence`) into the
//! `System`/`Pilot` streams and is woken by a `tokio::sync::Notify` rather
//! than polling, giving at-least-once delivery without busy-waiting.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::domain::errors::{FleetError, FleetResult};
use crate::domain::ids::Sequence;
use crate::domain::models::{Event, StreamType};
use crate::domain::ports::EventRepository;

struct MailboxState {
    cursor: Sequence,
    notify: Arc<Notify>,
}

/// In-process mailbox directory. Cursors are kept in memory; the backing
/// event log is the durable source of truth, so a crash simply resets every
/// mailbox to its last-persisted cursor on restart (persisted cursors are
/// the caller's responsibility via `advance`).
pub struct MailboxService<R: EventRepository> {
    repository: Arc<R>,
    mailboxes: Mutex<HashMap<String, MailboxState>>,
}

impl<R: EventRepository> MailboxService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository, mailboxes: Mutex::new(HashMap::new()) }
    }

    async fn notify_for(&self, mailbox: &str) -> Arc<Notify> {
        let mut mailboxes = self.mailboxes.lock().await;
        mailboxes
            .entry(mailbox.to_string())
            .or_insert_with(|| MailboxState { cursor: Sequence::ZERO, notify: Arc::new(Notify::new()) })
            .notify
            .clone()
    }

    /// Wake every waiter on `mailbox` — called after `post`/`broadcast`
    /// appends a new event to the underlying stream.
    pub async fn wake(&self, mailbox: &str) {
        let notify = self.notify_for(mailbox).await;
        notify.notify_waiters();
    }

    /// Post a single event addressed to one pilot's mailbox (stream id is
    /// the pilot's callsign within the `Pilot` stream).
    pub async fn post(&self, stream_id: &str, event: Event) -> FleetResult<Event> {
        let appended = self.repository.append(event).await?;
        self.wake(stream_id).await;
        Ok(appended)
    }

    /// Poll for events past `since`, blocking up to `timeout` for new
    /// arrivals if none are immediately available (`spec.md` §4.3's
    /// long-poll operation).
    pub async fn poll(
        &self,
        stream_type: StreamType,
        stream_id: &str,
        since: Sequence,
        timeout: Duration,
    ) -> FleetResult<Vec<Event>> {
        let pending = self.repository.replay_since(stream_type, stream_id, since).await?;
        if !pending.is_empty() {
            return Ok(pending);
        }

        let notify = self.notify_for(stream_id).await;
        let waited = tokio::time::timeout(timeout, notify.notified()).await;
        match waited {
            Ok(()) => self.repository.replay_since(stream_type, stream_id, since).await,
            Err(_) => Ok(Vec::new()),
        }
    }

    /// Advance a mailbox's cursor once its caller has durably processed
    /// events up to `new_cursor`. Rejects going backwards.
    pub async fn advance(&self, mailbox: &str, new_cursor: Sequence) -> FleetResult<()> {
        let mut mailboxes = self.mailboxes.lock().await;
        let state = mailboxes
            .entry(mailbox.to_string())
            .or_insert_with(|| MailboxState { cursor: Sequence::ZERO, notify: Arc::new(Notify::new()) });
        if new_cursor < state.cursor {
            return Err(FleetError::PreconditionFailed(format!(
                "cannot move mailbox {mailbox} cursor backwards: {new_cursor} < {}",
                state.cursor
            )));
        }
        state.cursor = new_cursor;
        debug!(mailbox, cursor = %new_cursor, "mailbox cursor advanced");
        Ok(())
    }

    pub async fn cursor(&self, mailbox: &str) -> Sequence {
        self.mailboxes.lock().await.get(mailbox).map_or(Sequence::ZERO, |s| s.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::EventId;
    use crate::domain::models::EventPayload;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeEventRepository {
        events: StdMutex<Vec<Event>>,
    }

    #[async_trait]
    impl EventRepository for FakeEventRepository {
        async fn append(&self, event: Event) -> FleetResult<Event> {
            self.events.lock().unwrap().push(event.clone());
            Ok(event)
        }
        async fn get(&self, _event_id: EventId) -> FleetResult<Option<Event>> {
            Ok(None)
        }
        async fn query(&self, _filter: crate::domain::ports::EventFilter) -> FleetResult<Vec<Event>> {
            Ok(self.events.lock().unwrap().clone())
        }
        async fn latest_sequence(&self, _stream_type: StreamType, _stream_id: &str) -> FleetResult<Sequence> {
            Ok(Sequence::ZERO)
        }
        async fn replay_since(&self, stream_type: StreamType, stream_id: &str, since: Sequence) -> FleetResult<Vec<Event>> {
            Ok(self
                .events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.stream_type == stream_type && e.stream_id == stream_id && e.sequence > since)
                .cloned()
                .collect())
        }
        async fn detect_sequence_gaps(&self, _stream_type: StreamType, _stream_id: &str) -> FleetResult<Vec<Sequence>> {
            Ok(Vec::new())
        }
        async fn count(&self) -> FleetResult<u64> {
            Ok(0)
        }
        async fn prune_older_than(&self, _cutoff: chrono::DateTime<Utc>) -> FleetResult<u64> {
            Ok(0)
        }
    }

    fn sample_event(stream_id: &str, sequence: u64) -> Event {
        Event {
            event_id: EventId::new(),
            stream_type: StreamType::Pilot,
            stream_id: stream_id.to_string(),
            sequence: Sequence(sequence),
            occurred_at: Utc::now(),
            recorded_at: Utc::now(),
            causation_id: None,
            correlation_id: None,
            metadata: None,
            schema_version: 1,
            payload: EventPayload::PilotHeartbeat { callsign: stream_id.to_string() },
        }
    }

    #[tokio::test]
    async fn poll_returns_immediately_when_events_already_pending() {
        let repo = Arc::new(FakeEventRepository::default());
        repo.append(sample_event("viper-1", 1)).await.unwrap();
        let mailbox = MailboxService::new(repo);
        let events = mailbox
            .poll(StreamType::Pilot, "viper-1", Sequence::ZERO, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn poll_times_out_with_no_events() {
        let repo = Arc::new(FakeEventRepository::default());
        let mailbox = MailboxService::new(repo);
        let events = mailbox
            .poll(StreamType::Pilot, "viper-1", Sequence::ZERO, Duration::from_millis(20))
            .await
            .unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn advance_rejects_moving_cursor_backwards() {
        let mailbox = MailboxService::new(Arc::new(FakeEventRepository::default()));
        mailbox.advance("viper-1", Sequence(5)).await.unwrap();
        assert!(mailbox.advance("viper-1", Sequence(2)).await.is_err());
    }
}
