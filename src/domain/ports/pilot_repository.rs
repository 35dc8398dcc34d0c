//! Pilot registry repository port (`spec.md` §4.5).

use async_trait::async_trait;

use crate::domain::errors::FleetResult;
use crate::domain::ids::PilotId;
use crate::domain::models::{Pilot, PilotStatus};

#[async_trait]
pub trait PilotRepository: Send + Sync {
    async fn register(&self, pilot: &Pilot) -> FleetResult<()>;

    async fn get(&self, id: PilotId) -> FleetResult<Option<Pilot>>;

    async fn get_by_callsign(&self, callsign: &str) -> FleetResult<Option<Pilot>>;

    async fn update(&self, pilot: &Pilot) -> FleetResult<()>;

    async fn list(&self) -> FleetResult<Vec<Pilot>>;

    async fn list_by_status(&self, status: PilotStatus) -> FleetResult<Vec<Pilot>>;

    /// Pilots whose `last_heartbeat` is older than `cutoff`, used by the
    /// heartbeat-timeout monitor to force-reassign their in-flight work.
    async fn list_stale(&self, cutoff: chrono::DateTime<chrono::Utc>) -> FleetResult<Vec<Pilot>>;

    async fn deregister(&self, id: PilotId) -> FleetResult<()>;
}
