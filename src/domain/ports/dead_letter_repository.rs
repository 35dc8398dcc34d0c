//! Dead-letter queue and circuit-breaker repository port
//! (`SPEC_FULL.md` §3/§10).

use async_trait::async_trait;

use crate::domain::errors::FleetResult;
use crate::domain::ids::EventId;
use crate::domain::models::{CircuitBreakerRecord, DeadLetterEntry};

#[async_trait]
pub trait DeadLetterRepository: Send + Sync {
    async fn create(&self, entry: &DeadLetterEntry) -> FleetResult<()>;

    async fn update(&self, entry: &DeadLetterEntry) -> FleetResult<()>;

    async fn list(&self, mailbox: Option<&str>) -> FleetResult<Vec<DeadLetterEntry>>;

    async fn delete(&self, id: EventId) -> FleetResult<()>;

    async fn get_circuit(&self, mailbox: &str) -> FleetResult<Option<CircuitBreakerRecord>>;

    async fn save_circuit(&self, circuit: &CircuitBreakerRecord) -> FleetResult<()>;
}
