//! Event log repository port (`spec.md` §4.2).

use async_trait::async_trait;

use crate::domain::errors::FleetResult;
use crate::domain::ids::{EventId, Sequence};
use crate::domain::models::{Event, StreamType};

/// Filter criteria for querying the event log.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub stream_type: Option<StreamType>,
    pub stream_id: Option<String>,
    pub event_type: Option<String>,
    pub since_sequence: Option<Sequence>,
    pub limit: Option<usize>,
}

/// Repository interface for the append-only event log.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Append an event to its stream, assigning the next per-stream
    /// sequence number atomically with the insert.
    async fn append(&self, event: Event) -> FleetResult<Event>;

    async fn get(&self, event_id: EventId) -> FleetResult<Option<Event>>;

    async fn query(&self, filter: EventFilter) -> FleetResult<Vec<Event>>;

    /// Latest sequence number recorded for a stream, or `Sequence::ZERO` if
    /// the stream has no events yet.
    async fn latest_sequence(&self, stream_type: StreamType, stream_id: &str) -> FleetResult<Sequence>;

    /// All events with `sequence > since`, ordered by sequence, used by
    /// checkpoint replay and mailbox catch-up.
    async fn replay_since(&self, stream_type: StreamType, stream_id: &str, since: Sequence) -> FleetResult<Vec<Event>>;

    /// Detect missing sequence numbers in a stream (indicates a lost write).
    async fn detect_sequence_gaps(&self, stream_type: StreamType, stream_id: &str) -> FleetResult<Vec<Sequence>>;

    async fn count(&self) -> FleetResult<u64>;

    async fn prune_older_than(&self, cutoff: chrono::DateTime<chrono::Utc>) -> FleetResult<u64>;
}
