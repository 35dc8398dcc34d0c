//! Mission and sortie repository ports (`spec.md` §4.7).

use async_trait::async_trait;

use crate::domain::errors::FleetResult;
use crate::domain::ids::{MissionId, SortieId};
use crate::domain::models::{Mission, MissionStatus, Sortie, SortieStatus};

#[derive(Debug, Clone, Default)]
pub struct MissionFilter {
    pub status: Option<MissionStatus>,
}

#[async_trait]
pub trait MissionRepository: Send + Sync {
    async fn create(&self, mission: &Mission) -> FleetResult<()>;

    async fn get(&self, id: MissionId) -> FleetResult<Option<Mission>>;

    async fn update(&self, mission: &Mission) -> FleetResult<()>;

    async fn list(&self, filter: MissionFilter) -> FleetResult<Vec<Mission>>;
}

#[async_trait]
pub trait SortieRepository: Send + Sync {
    async fn create(&self, sortie: &Sortie) -> FleetResult<()>;

    async fn get(&self, id: SortieId) -> FleetResult<Option<Sortie>>;

    async fn update(&self, sortie: &Sortie) -> FleetResult<()>;

    async fn list_by_mission(&self, mission_id: MissionId) -> FleetResult<Vec<Sortie>>;

    async fn list_by_status(&self, status: SortieStatus) -> FleetResult<Vec<Sortie>>;
}
