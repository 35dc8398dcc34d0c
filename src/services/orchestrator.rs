//! Mission decomposition and sortie lifecycle orchestration (`spec.md` §4.7).

use std::sync::Arc;

use tracing::info;

use crate::domain::errors::{FleetError, FleetResult};
use crate::domain::ids::{MissionId, SortieId};
use crate::domain::models::{Mission, MissionPriority, MissionStatus, Sortie, SortieStatus};
use crate::domain::ports::{MissionRepository, SortieRepository};

pub struct Orchestrator<M: MissionRepository, S: SortieRepository> {
    missions: Arc<M>,
    sorties: Arc<S>,
}

impl<M: MissionRepository, S: SortieRepository> Orchestrator<M, S> {
    pub fn new(missions: Arc<M>, sorties: Arc<S>) -> Self {
        Self { missions, sorties }
    }

    pub async fn submit_mission(&self, title: &str, priority: MissionPriority) -> FleetResult<Mission> {
        let mission = Mission::new(title, priority);
        self.missions.create(&mission).await?;
        info!(mission_id = %mission.id, title, "mission submitted");
        Ok(mission)
    }

    /// Decompose a mission into `count` open sorties, starting the mission
    /// if it is still `Pending` (`spec.md` §4.7).
    pub async fn decompose(&self, mission_id: MissionId, count: usize) -> FleetResult<Vec<Sortie>> {
        let mut mission = self
            .missions
            .get(mission_id)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("mission {mission_id}")))?;

        if mission.status == MissionStatus::Pending {
            mission.transition(MissionStatus::InProgress)?;
            self.missions.update(&mission).await?;
        }

        let mut sorties = Vec::with_capacity(count);
        for _ in 0..count {
            let sortie = Sortie::new(Some(mission_id));
            self.sorties.create(&sortie).await?;
            sorties.push(sortie);
        }
        info!(%mission_id, sortie_count = count, "mission decomposed");
        Ok(sorties)
    }

    pub async fn close_sortie(&self, sortie_id: SortieId) -> FleetResult<()> {
        let mut sortie = self
            .sorties
            .get(sortie_id)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("sortie {sortie_id}")))?;
        sortie.transition(SortieStatus::Closed)?;
        self.sorties.update(&sortie).await?;

        if let Some(mission_id) = sortie.mission_id {
            self.maybe_complete_mission(mission_id).await?;
        }
        Ok(())
    }

    /// A mission completes once every one of its sorties is `Closed`.
    async fn maybe_complete_mission(&self, mission_id: MissionId) -> FleetResult<()> {
        let sorties = self.sorties.list_by_mission(mission_id).await?;
        if sorties.is_empty() || sorties.iter().any(|s| s.status != SortieStatus::Closed) {
            return Ok(());
        }
        let mut mission = self
            .missions
            .get(mission_id)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("mission {mission_id}")))?;
        if mission.status == MissionStatus::InProgress {
            mission.transition(MissionStatus::Completed)?;
            self.missions.update(&mission).await?;
            info!(%mission_id, "mission completed");
        }
        Ok(())
    }

    pub async fn block_sortie(&self, sortie_id: SortieId, reason: impl Into<String>) -> FleetResult<()> {
        let mut sortie = self
            .sorties
            .get(sortie_id)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("sortie {sortie_id}")))?;
        sortie.block(reason)?;
        self.sorties.update(&sortie).await
    }

    pub async fn cancel_mission(&self, mission_id: MissionId) -> FleetResult<()> {
        let mut mission = self
            .missions
            .get(mission_id)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("mission {mission_id}")))?;
        mission.transition(MissionStatus::Cancelled)?;
        self.missions.update(&mission).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeMissions {
        missions: Mutex<HashMap<MissionId, Mission>>,
    }

    #[async_trait]
    impl MissionRepository for FakeMissions {
        async fn create(&self, mission: &Mission) -> FleetResult<()> {
            self.missions.lock().unwrap().insert(mission.id, mission.clone());
            Ok(())
        }
        async fn get(&self, id: MissionId) -> FleetResult<Option<Mission>> {
            Ok(self.missions.lock().unwrap().get(&id).cloned())
        }
        async fn update(&self, mission: &Mission) -> FleetResult<()> {
            self.missions.lock().unwrap().insert(mission.id, mission.clone());
            Ok(())
        }
        async fn list(&self, _filter: crate::domain::ports::MissionFilter) -> FleetResult<Vec<Mission>> {
            Ok(self.missions.lock().unwrap().values().cloned().collect())
        }
    }

    #[derive(Default)]
    struct FakeSorties {
        sorties: Mutex<HashMap<SortieId, Sortie>>,
    }

    #[async_trait]
    impl SortieRepository for FakeSorties {
        async fn create(&self, sortie: &Sortie) -> FleetResult<()> {
            self.sorties.lock().unwrap().insert(sortie.id, sortie.clone());
            Ok(())
        }
        async fn get(&self, id: SortieId) -> FleetResult<Option<Sortie>> {
            Ok(self.sorties.lock().unwrap().get(&id).cloned())
        }
        async fn update(&self, sortie: &Sortie) -> FleetResult<()> {
            self.sorties.lock().unwrap().insert(sortie.id, sortie.clone());
            Ok(())
        }
        async fn list_by_mission(&self, mission_id: MissionId) -> FleetResult<Vec<Sortie>> {
            Ok(self.sorties.lock().unwrap().values().filter(|s| s.mission_id == Some(mission_id)).cloned().collect())
        }
        async fn list_by_status(&self, status: SortieStatus) -> FleetResult<Vec<Sortie>> {
            Ok(self.sorties.lock().unwrap().values().filter(|s| s.status == status).cloned().collect())
        }
    }

    #[tokio::test]
    async fn decompose_starts_mission_and_creates_sorties() {
        let missions = Arc::new(FakeMissions::default());
        let sorties = Arc::new(FakeSorties::default());
        let orchestrator = Orchestrator::new(missions.clone(), sorties.clone());

        let mission = orchestrator.submit_mission("ship feature", MissionPriority::High).await.unwrap();
        let created = orchestrator.decompose(mission.id, 3).await.unwrap();

        assert_eq!(created.len(), 3);
        let updated = missions.get(mission.id).await.unwrap().unwrap();
        assert_eq!(updated.status, MissionStatus::InProgress);
    }

    #[tokio::test]
    async fn mission_completes_once_all_sorties_close() {
        let missions = Arc::new(FakeMissions::default());
        let sorties = Arc::new(FakeSorties::default());
        let orchestrator = Orchestrator::new(missions.clone(), sorties.clone());

        let mission = orchestrator.submit_mission("ship feature", MissionPriority::Medium).await.unwrap();
        let created = orchestrator.decompose(mission.id, 2).await.unwrap();

        for sortie in &created {
            let mut s = sorties.get(sortie.id).await.unwrap().unwrap();
            s.transition(SortieStatus::InProgress).unwrap();
            sorties.update(&s).await.unwrap();
            orchestrator.close_sortie(sortie.id).await.unwrap();
        }

        let updated = missions.get(mission.id).await.unwrap().unwrap();
        assert_eq!(updated.status, MissionStatus::Completed);
    }
}
