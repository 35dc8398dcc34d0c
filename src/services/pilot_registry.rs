//! Pilot registration, heartbeats, and health aggregation (`spec.md` §4.5).
//!
//! Grounded on `agent_service.rs`'s `AgentService`: registration is
//! idempotent by callsign (re-registering updates capabilities rather than
//! erroring), and deregistration requires the pilot to have no active
//! assignment load.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::errors::{FleetError, FleetResult};
use crate::domain::ids::PilotId;
use crate::domain::models::{Capability, HealthStatus, Pilot, PilotHealth, PilotStatus};
use crate::domain::ports::PilotRepository;

pub struct PilotRegistry<R: PilotRepository> {
    repository: Arc<R>,
    heartbeat_timeout: chrono::Duration,
}

impl<R: PilotRepository> PilotRegistry<R> {
    pub fn new(repository: Arc<R>, heartbeat_timeout: chrono::Duration) -> Self {
        Self { repository, heartbeat_timeout }
    }

    /// Register a pilot, or update its capabilities/agent type if the
    /// callsign is already known (`spec.md` §4.5).
    pub async fn register(
        &self,
        callsign: &str,
        agent_type: &str,
        max_workload: u32,
        capabilities: Vec<Capability>,
    ) -> FleetResult<Pilot> {
        if let Some(mut existing) = self.repository.get_by_callsign(callsign).await? {
            existing.agent_type = agent_type.to_string();
            existing.max_workload = max_workload;
            existing.capabilities = capabilities;
            existing.heartbeat();
            self.repository.update(&existing).await?;
            info!(callsign, "pilot re-registered");
            return Ok(existing);
        }

        let mut pilot = Pilot::new(callsign, agent_type, max_workload);
        pilot.capabilities = capabilities;
        self.repository.register(&pilot).await?;
        info!(callsign, agent_type, "pilot registered");
        Ok(pilot)
    }

    pub async fn heartbeat(&self, id: PilotId, health: PilotHealth) -> FleetResult<HealthStatus> {
        let mut pilot = self.repository.get(id).await?.ok_or_else(|| FleetError::NotFound(format!("pilot {id}")))?;
        pilot.heartbeat();
        pilot.health = health;
        self.repository.update(&pilot).await?;
        Ok(health.aggregate())
    }

    /// Deregister a pilot; refuses while it still has workload assigned,
    /// unless `force` is set (used for admin cleanup of a crashed pilot).
    pub async fn deregister(&self, id: PilotId, force: bool) -> FleetResult<()> {
        let pilot = self.repository.get(id).await?.ok_or_else(|| FleetError::NotFound(format!("pilot {id}")))?;
        if pilot.current_workload > 0 && !force {
            return Err(FleetError::Conflict(format!(
                "pilot {} still has {} assignment(s); reassign before deregistering",
                pilot.callsign, pilot.current_workload
            )));
        }
        self.repository.deregister(id).await
    }

    pub async fn list(&self) -> FleetResult<Vec<Pilot>> {
        self.repository.list().await
    }

    pub async fn list_available(&self) -> FleetResult<Vec<Pilot>> {
        let idle = self.repository.list_by_status(PilotStatus::Idle).await?;
        let busy = self.repository.list_by_status(PilotStatus::Busy).await?;
        Ok(idle.into_iter().chain(busy).filter(Pilot::has_free_capacity).collect())
    }

    /// Mark pilots whose heartbeat has gone silent as `Offline`, returning
    /// them so the caller (the scheduler/orchestrator) can reassign their
    /// in-flight work.
    pub async fn sweep_stale(&self) -> FleetResult<Vec<Pilot>> {
        let cutoff = Utc::now() - self.heartbeat_timeout;
        let stale = self.repository.list_stale(cutoff).await?;
        let mut marked = Vec::with_capacity(stale.len());
        for mut pilot in stale {
            if pilot.status != PilotStatus::Offline {
                warn!(callsign = pilot.callsign, "pilot heartbeat timed out, marking offline");
                pilot.status = PilotStatus::Offline;
                self.repository.update(&pilot).await?;
            }
            marked.push(pilot);
        }
        Ok(marked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakePilotRepository {
        pilots: Mutex<Vec<Pilot>>,
    }

    #[async_trait]
    impl PilotRepository for FakePilotRepository {
        async fn register(&self, pilot: &Pilot) -> FleetResult<()> {
            self.pilots.lock().unwrap().push(pilot.clone());
            Ok(())
        }
        async fn get(&self, id: PilotId) -> FleetResult<Option<Pilot>> {
            Ok(self.pilots.lock().unwrap().iter().find(|p| p.pilot_id == id).cloned())
        }
        async fn get_by_callsign(&self, callsign: &str) -> FleetResult<Option<Pilot>> {
            Ok(self.pilots.lock().unwrap().iter().find(|p| p.callsign == callsign).cloned())
        }
        async fn update(&self, pilot: &Pilot) -> FleetResult<()> {
            let mut pilots = self.pilots.lock().unwrap();
            if let Some(existing) = pilots.iter_mut().find(|p| p.pilot_id == pilot.pilot_id) {
                *existing = pilot.clone();
            }
            Ok(())
        }
        async fn list(&self) -> FleetResult<Vec<Pilot>> {
            Ok(self.pilots.lock().unwrap().clone())
        }
        async fn list_by_status(&self, status: PilotStatus) -> FleetResult<Vec<Pilot>> {
            Ok(self.pilots.lock().unwrap().iter().filter(|p| p.status == status).cloned().collect())
        }
        async fn list_stale(&self, cutoff: chrono::DateTime<Utc>) -> FleetResult<Vec<Pilot>> {
            Ok(self.pilots.lock().unwrap().iter().filter(|p| p.last_heartbeat < cutoff).cloned().collect())
        }
        async fn deregister(&self, id: PilotId) -> FleetResult<()> {
            self.pilots.lock().unwrap().retain(|p| p.pilot_id != id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn re_registering_same_callsign_updates_capabilities() {
        let registry = PilotRegistry::new(Arc::new(FakePilotRepository::default()), chrono::Duration::minutes(2));
        registry.register("viper-1", "backend", 3, vec![]).await.unwrap();
        let updated = registry
            .register("viper-1", "backend", 5, vec![Capability::new("rust", vec!["rust".into()])])
            .await
            .unwrap();
        assert_eq!(updated.max_workload, 5);
        assert_eq!(updated.capabilities.len(), 1);
    }

    #[tokio::test]
    async fn deregister_refuses_while_workload_outstanding_unless_forced() {
        let registry = PilotRegistry::new(Arc::new(FakePilotRepository::default()), chrono::Duration::minutes(2));
        let mut pilot = registry.register("viper-1", "backend", 3, vec![]).await.unwrap();
        pilot.current_workload = 1;
        registry.repository.update(&pilot).await.unwrap();

        assert!(registry.deregister(pilot.pilot_id, false).await.is_err());
        assert!(registry.deregister(pilot.pilot_id, true).await.is_ok());
    }

    #[tokio::test]
    async fn sweep_stale_marks_pilots_offline() {
        let registry = PilotRegistry::new(Arc::new(FakePilotRepository::default()), chrono::Duration::seconds(1));
        let pilot = registry.register("viper-1", "backend", 3, vec![]).await.unwrap();
        {
            let mut pilots = registry.repository.pilots.lock().unwrap();
            pilots[0].last_heartbeat = Utc::now() - chrono::Duration::minutes(5);
        }
        let stale = registry.sweep_stale().await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].pilot_id, pilot.pilot_id);
    }
}
