//! File reservation repository port (`spec.md` §4.4).

use async_trait::async_trait;

use crate::domain::errors::FleetResult;
use crate::domain::ids::ReservationId;
use crate::domain::models::Reservation;

#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn create(&self, reservation: &Reservation) -> FleetResult<()>;

    async fn get(&self, id: ReservationId) -> FleetResult<Option<Reservation>>;

    async fn update(&self, reservation: &Reservation) -> FleetResult<()>;

    /// All currently-active reservations, used to check pattern conflicts
    /// before granting a new one.
    async fn list_active(&self) -> FleetResult<Vec<Reservation>>;

    async fn list_active_for_holder(&self, holder: &str) -> FleetResult<Vec<Reservation>>;

    /// Active reservations whose `expires_at` has passed, for the TTL
    /// sweeper.
    async fn list_expired(&self, now: chrono::DateTime<chrono::Utc>) -> FleetResult<Vec<Reservation>>;
}
