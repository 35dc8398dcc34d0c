//! Event log service: append, query, and schema validation (`spec.md` §4.2).
//!
//! Grounded on `event_store.rs`'s `EventStore` trait and its
//! `InMemoryEventStore` reference implementation; sequencing here is
//! strictly per-stream rather than global.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::errors::{FleetError, FleetResult};
use crate::domain::ids::EventId;
use crate::domain::models::{Event, EventPayload, StreamType};
use crate::domain::ports::{EventFilter, EventRepository};

/// The set of `event_type` discriminants the log accepts. Anything else is
/// rejected before it reaches the repository, keeping every event readable
/// by every consumer built against this schema.
fn known_event_types() -> &'static HashSet<&'static str> {
    static TYPES: std::sync::OnceLock<HashSet<&'static str>> = std::sync::OnceLock::new();
    TYPES.get_or_init(|| {
        [
            "mission_submitted",
            "mission_decomposed",
            "mission_state_changed",
            "sortie_opened",
            "sortie_blocked",
            "sortie_closed",
            "work_order_submitted",
            "task_assignment",
            "work_order_state_changed",
            "work_order_failed",
            "pilot_registered",
            "pilot_deregistered",
            "pilot_heartbeat",
            "file_reserved",
            "file_released",
            "file_conflict",
            "lock_acquired",
            "lock_released",
            "checkpoint_created",
            "fleet_recovered",
            "context_injected",
            "pattern_learned",
            "pattern_outcome_recorded",
        ]
        .into_iter()
        .collect()
    })
}

pub struct EventLog<R: EventRepository> {
    repository: Arc<R>,
}

impl<R: EventRepository> EventLog<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Append an event to `stream_id`'s stream. Sequence is assigned as
    /// `latest_sequence + 1`; the repository is responsible for making that
    /// assignment atomic with the insert so concurrent appenders never
    /// collide (`spec.md` §4.2).
    pub async fn append(
        &self,
        stream_type: StreamType,
        stream_id: impl Into<String>,
        payload: EventPayload,
        causation_id: Option<EventId>,
        correlation_id: Option<Uuid>,
    ) -> FleetResult<Event> {
        let event_type = payload.event_type();
        if !known_event_types().contains(event_type) {
            return Err(FleetError::InvalidInput(format!("unknown event_type: {event_type}")));
        }

        let stream_id = stream_id.into();
        let next_sequence = self.repository.latest_sequence(stream_type, &stream_id).await?.next();

        let now = Utc::now();
        let event = Event {
            event_id: EventId::new(),
            stream_type,
            stream_id,
            sequence: next_sequence,
            occurred_at: now,
            recorded_at: now,
            causation_id,
            correlation_id,
            metadata: None,
            schema_version: 1,
            payload,
        };

        let appended = self.repository.append(event).await?;
        debug!(event_id = %appended.event_id, event_type, sequence = %appended.sequence, "event appended");
        Ok(appended)
    }

    pub async fn get(&self, event_id: EventId) -> FleetResult<Event> {
        self.repository
            .get(event_id)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("event {event_id}")))
    }

    pub async fn query(&self, filter: EventFilter) -> FleetResult<Vec<Event>> {
        self.repository.query(filter).await
    }

    pub async fn replay_since(
        &self,
        stream_type: StreamType,
        stream_id: &str,
        since: crate::domain::ids::Sequence,
    ) -> FleetResult<Vec<Event>> {
        self.repository.replay_since(stream_type, stream_id, since).await
    }

    /// Run a gap check and log a warning for every stream that has lost a
    /// write; used by the inactivity/health monitor (`spec.md` §4.8).
    pub async fn audit_stream(&self, stream_type: StreamType, stream_id: &str) -> FleetResult<Vec<crate::domain::ids::Sequence>> {
        let gaps = self.repository.detect_sequence_gaps(stream_type, stream_id).await?;
        if !gaps.is_empty() {
            warn!(?stream_type, stream_id, gap_count = gaps.len(), "sequence gaps detected in event stream");
        }
        Ok(gaps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::Sequence;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeEventRepository {
        events: Mutex<Vec<Event>>,
    }

    #[async_trait]
    impl EventRepository for FakeEventRepository {
        async fn append(&self, event: Event) -> FleetResult<Event> {
            self.events.lock().unwrap().push(event.clone());
            Ok(event)
        }

        async fn get(&self, event_id: EventId) -> FleetResult<Option<Event>> {
            Ok(self.events.lock().unwrap().iter().find(|e| e.event_id == event_id).cloned())
        }

        async fn query(&self, _filter: EventFilter) -> FleetResult<Vec<Event>> {
            Ok(self.events.lock().unwrap().clone())
        }

        async fn latest_sequence(&self, stream_type: StreamType, stream_id: &str) -> FleetResult<Sequence> {
            Ok(self
                .events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.stream_type == stream_type && e.stream_id == stream_id)
                .map(|e| e.sequence)
                .max()
                .unwrap_or(Sequence::ZERO))
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
            Ok(self.events.lock().unwrap().len() as u64)
        }

        async fn prune_older_than(&self, _cutoff: chrono::DateTime<Utc>) -> FleetResult<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn append_assigns_strictly_increasing_per_stream_sequence() {
        let log = EventLog::new(Arc::new(FakeEventRepository::default()));
        let e1 = log
            .append(StreamType::Mission, "msn-1", EventPayload::MissionSubmitted { title: "a".into() }, None, None)
            .await
            .unwrap();
        let e2 = log
            .append(StreamType::Mission, "msn-1", EventPayload::SortieOpened, None, None)
            .await
            .unwrap();
        assert_eq!(e1.sequence, Sequence::ZERO.next());
        assert_eq!(e2.sequence, e1.sequence.next());
    }

    #[tokio::test]
    async fn sequences_are_independent_per_stream() {
        let log = EventLog::new(Arc::new(FakeEventRepository::default()));
        log.append(StreamType::Mission, "msn-1", EventPayload::SortieOpened, None, None).await.unwrap();
        let e = log
            .append(StreamType::Mission, "msn-2", EventPayload::SortieOpened, None, None)
            .await
            .unwrap();
        assert_eq!(e.sequence, Sequence::ZERO.next());
    }
}
