//! `FleetService`: the transport-neutral composition root (`spec.md` §6,
//! `SPEC_FULL.md` §6). One async method per row of the operations table;
//! the CLI in `cli` maps a subset of these to subcommands.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::domain::errors::FleetResult;
use crate::domain::ids::{CheckpointId, MissionId, PatternId, PilotId, ReservationId, WorkOrderId};
use crate::domain::models::{
    Capability, Checkpoint, CheckpointTrigger, CircuitBreakerRecord, DeadLetterEntry, LearnedPattern, Lock,
    MailboxSnapshot, Mission, MissionPriority, Pilot, PilotHealth, Reservation, ResumePlan, StreamType, WorkOrder,
    WorkOrderStatus,
};
use crate::domain::ports::{
    CheckpointRepository, DeadLetterRepository, LockRepository, MissionFilter, MissionRepository, PatternRepository,
    PilotRepository, ReservationRepository, WorkOrderFilter, WorkOrderRepository,
};
use crate::infrastructure::config::FleetConfig;
use crate::infrastructure::database::{
    SqliteCheckpointRepository, SqliteDeadLetterRepository, SqliteEventRepository, SqliteLockRepository,
    SqliteMissionRepository, SqlitePatternRepository, SqlitePilotRepository, SqliteReservationRepository,
    SqliteSortieRepository, SqliteWorkOrderRepository,
};
use crate::services::{
    CheckpointService, DeadLetterService, DependencyResolver, EventLog, LearningService, LockService, MailboxService,
    Orchestrator, PatternTypeMetrics, PilotRegistry, ReservationService, ScoreCalculator, Scheduler,
};

pub struct FleetService {
    config: FleetConfig,
    work_orders: Arc<SqliteWorkOrderRepository>,
    missions: Arc<SqliteMissionRepository>,
    pilots_repo: Arc<SqlitePilotRepository>,
    reservations_repo: Arc<SqliteReservationRepository>,
    locks_repo: Arc<SqliteLockRepository>,
    checkpoints_repo: Arc<SqliteCheckpointRepository>,
    patterns_repo: Arc<SqlitePatternRepository>,
    dead_letters_repo: Arc<SqliteDeadLetterRepository>,

    event_log: EventLog<SqliteEventRepository>,
    mailbox: MailboxService<SqliteEventRepository>,
    reservations: ReservationService<SqliteReservationRepository>,
    locks: LockService<SqliteLockRepository>,
    pilot_registry: PilotRegistry<SqlitePilotRepository>,
    scheduler: Scheduler<SqliteWorkOrderRepository, SqlitePilotRepository>,
    orchestrator: Orchestrator<SqliteMissionRepository, SqliteSortieRepository>,
    checkpoint: CheckpointService<
        SqliteCheckpointRepository,
        SqliteEventRepository,
        SqliteMissionRepository,
        SqliteWorkOrderRepository,
        SqliteReservationRepository,
        SqliteSortieRepository,
        SqliteLockRepository,
        SqlitePatternRepository,
    >,
    learning: LearningService<SqlitePatternRepository>,
    dead_letter: DeadLetterService<SqliteDeadLetterRepository, SqliteEventRepository>,
    dependency_resolver: DependencyResolver,
}

impl FleetService {
    pub fn new(pool: SqlitePool, config: FleetConfig) -> Self {
        let events = Arc::new(SqliteEventRepository::new(pool.clone()));
        let work_orders = Arc::new(SqliteWorkOrderRepository::new(pool.clone()));
        let missions = Arc::new(SqliteMissionRepository::new(pool.clone()));
        let sorties = Arc::new(SqliteSortieRepository::new(pool.clone()));
        let pilots_repo = Arc::new(SqlitePilotRepository::new(pool.clone()));
        let reservations_repo = Arc::new(SqliteReservationRepository::new(pool.clone()));
        let locks_repo = Arc::new(SqliteLockRepository::new(pool.clone()));
        let checkpoints_repo = Arc::new(SqliteCheckpointRepository::new(pool.clone()));
        let patterns_repo = Arc::new(SqlitePatternRepository::new(pool.clone()));
        let dead_letters_repo = Arc::new(SqliteDeadLetterRepository::new(pool));

        let heartbeat_timeout = config.heartbeat_timeout();
        let reservation_ttl = config.reservation_ttl();

        Self {
            event_log: EventLog::new(events.clone()),
            mailbox: MailboxService::new(events.clone()),
            reservations: ReservationService::new(reservations_repo.clone(), reservation_ttl),
            locks: LockService::new(locks_repo.clone()),
            pilot_registry: PilotRegistry::new(pilots_repo.clone(), heartbeat_timeout),
            scheduler: Scheduler::new(work_orders.clone(), pilots_repo.clone(), ScoreCalculator::default()),
            orchestrator: Orchestrator::new(missions.clone(), sorties.clone()),
            checkpoint: CheckpointService::new(
                checkpoints_repo.clone(),
                events.clone(),
                missions.clone(),
                work_orders.clone(),
                reservations_repo.clone(),
                sorties.clone(),
                locks_repo.clone(),
                patterns_repo.clone(),
            ),
            learning: LearningService::new(patterns_repo.clone()),
            dead_letter: DeadLetterService::new(
                dead_letters_repo.clone(),
                events.clone(),
                config.task_retry_limit,
                3,
                chrono::Duration::seconds(30),
            ),
            work_orders,
            missions,
            pilots_repo,
            reservations_repo,
            locks_repo,
            checkpoints_repo,
            patterns_repo,
            dead_letters_repo,
            dependency_resolver: DependencyResolver::new(),
            config,
        }
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    // ---- Work orders ----

    pub async fn create_work_order(&self, work_order: WorkOrder) -> FleetResult<WorkOrder> {
        if !work_order.dependencies.is_empty() {
            let existing = self.work_orders.list(WorkOrderFilter::default()).await?;
            self.dependency_resolver.validate_dependencies(&work_order, &existing)?;

            let mut probe = existing;
            probe.push(work_order.clone());
            if let Some(cycle) = self.dependency_resolver.detect_cycle(&probe) {
                return Err(crate::domain::errors::FleetError::InvalidInput(format!(
                    "circular dependency detected: {cycle:?}"
                )));
            }
        }
        self.work_orders.create(&work_order).await?;
        Ok(work_order)
    }

    pub async fn get_work_order(&self, id: WorkOrderId) -> FleetResult<Option<WorkOrder>> {
        self.work_orders.get(id).await
    }

    pub async fn list_work_orders(&self, filter: WorkOrderFilter) -> FleetResult<Vec<WorkOrder>> {
        self.work_orders.list(filter).await
    }

    pub async fn patch_work_order_status(&self, id: WorkOrderId, status: WorkOrderStatus) -> FleetResult<WorkOrder> {
        let mut work_order = self
            .work_orders
            .get(id)
            .await?
            .ok_or_else(|| crate::domain::errors::FleetError::NotFound(format!("work order {id} not found")))?;
        work_order.transition(status)?;
        self.work_orders.update(&work_order).await?;
        Ok(work_order)
    }

    pub async fn delete_work_order(&self, id: WorkOrderId) -> FleetResult<()> {
        let mut work_order = self
            .work_orders
            .get(id)
            .await?
            .ok_or_else(|| crate::domain::errors::FleetError::NotFound(format!("work order {id} not found")))?;
        work_order.transition(WorkOrderStatus::Cancelled)?;
        self.work_orders.update(&work_order).await
    }

    pub async fn dispatch(&self, max_assignments: usize) -> FleetResult<usize> {
        Ok(self.scheduler.dispatch(max_assignments).await?.len())
    }

    /// Wire `depends_on` as a dependency of `work_order_id`, rejecting the
    /// edge if it would close a cycle or name a work order that does not
    /// exist.
    pub async fn add_work_order_dependency(&self, work_order_id: WorkOrderId, depends_on: WorkOrderId) -> FleetResult<()> {
        let mut existing = self.work_orders.list(WorkOrderFilter::default()).await?;
        let dependent = existing
            .iter()
            .find(|w| w.id == work_order_id)
            .cloned()
            .ok_or_else(|| crate::domain::errors::FleetError::NotFound(format!("work order {work_order_id}")))?;
        if !existing.iter().any(|w| w.id == depends_on) {
            return Err(crate::domain::errors::FleetError::InvalidInput(format!(
                "dependency work order {depends_on} not found"
            )));
        }

        let mut probe = dependent.clone();
        probe.dependencies.push(depends_on);
        existing.retain(|w| w.id != work_order_id);
        existing.push(probe);
        if let Some(cycle) = self.dependency_resolver.detect_cycle(&existing) {
            return Err(crate::domain::errors::FleetError::InvalidInput(format!(
                "circular dependency detected: {cycle:?}"
            )));
        }

        self.work_orders.add_dependency(work_order_id, depends_on).await
    }

    // ---- Reservations ----

    pub async fn list_reservations(&self) -> FleetResult<Vec<Reservation>> {
        self.reservations_repo.list_active().await
    }

    pub async fn reserve(&self, path_pattern: &str, holder: &str, exclusive: bool) -> FleetResult<Reservation> {
        self.reservations.acquire(path_pattern, holder, exclusive).await
    }

    pub async fn release_reservation(&self, id: ReservationId) -> FleetResult<()> {
        self.reservations.release(id).await.map(|_| ())
    }

    // ---- Locks ----

    /// Every currently held lock. There is no dedicated "list active" query
    /// in the repository, so this reuses `list_expired` against a cutoff far
    /// in the future, which matches every lock that still has a row.
    pub async fn list_locks(&self) -> FleetResult<Vec<Lock>> {
        let far_future = chrono::Utc::now() + chrono::Duration::days(365 * 100);
        self.locks_repo.list_expired(far_future).await
    }

    pub async fn acquire_lock(&self, key: &str, holder: &str) -> FleetResult<Lock> {
        self.locks.acquire(key, holder, self.config.lock_ttl()).await
    }

    pub async fn release_lock(&self, key: &str, holder: &str) -> FleetResult<()> {
        self.locks.release(key, holder).await.map(|_| ())
    }

    // ---- Pilots ----

    pub async fn list_pilots(&self) -> FleetResult<Vec<Pilot>> {
        self.pilot_registry.list().await
    }

    pub async fn get_pilot_by_callsign(&self, callsign: &str) -> FleetResult<Option<Pilot>> {
        self.pilots_repo.get_by_callsign(callsign).await
    }

    pub async fn register_pilot(
        &self,
        callsign: &str,
        agent_type: &str,
        max_workload: u32,
        capabilities: Vec<Capability>,
    ) -> FleetResult<Pilot> {
        self.pilot_registry.register(callsign, agent_type, max_workload, capabilities).await
    }

    pub async fn heartbeat_pilot(
        &self,
        id: PilotId,
        health: PilotHealth,
    ) -> FleetResult<crate::domain::models::HealthStatus> {
        self.pilot_registry.heartbeat(id, health).await
    }

    // ---- Missions ----

    pub async fn submit_mission(&self, title: &str, priority: MissionPriority) -> FleetResult<Mission> {
        self.orchestrator.submit_mission(title, priority).await
    }

    pub async fn list_missions(&self, filter: MissionFilter) -> FleetResult<Vec<Mission>> {
        self.missions.list(filter).await
    }

    pub async fn get_mission(&self, id: MissionId) -> FleetResult<Option<Mission>> {
        self.missions.get(id).await
    }

    // ---- Checkpoints ----

    pub async fn create_checkpoint(
        &self,
        mission_id: Option<MissionId>,
        trigger: CheckpointTrigger,
    ) -> FleetResult<Checkpoint> {
        let mailbox_snapshots = self.snapshot_mailboxes().await?;
        self.checkpoint.create_checkpoint(mission_id, trigger, mailbox_snapshots).await
    }

    /// Every registered pilot's mailbox cursor plus the events it has not
    /// yet delivered, for inclusion in a checkpoint snapshot (`spec.md`
    /// §4.8). Cursors live only in `MailboxService`'s in-memory state, so
    /// this is the one place that can assemble them.
    async fn snapshot_mailboxes(&self) -> FleetResult<Vec<MailboxSnapshot>> {
        let pilots = self.pilots_repo.list().await?;
        let mut snapshots = Vec::with_capacity(pilots.len());
        for pilot in pilots {
            let cursor = self.mailbox.cursor(&pilot.callsign).await;
            let undelivered = self.event_log.replay_since(StreamType::Pilot, &pilot.callsign, cursor).await?;
            snapshots.push(MailboxSnapshot { pilot_callsign: pilot.callsign, cursor, undelivered });
        }
        Ok(snapshots)
    }

    pub async fn get_checkpoint(&self, id: CheckpointId) -> FleetResult<Option<Checkpoint>> {
        self.checkpoints_repo.get(id).await
    }

    pub async fn get_latest_checkpoint(&self) -> FleetResult<Option<Checkpoint>> {
        self.checkpoints_repo.get_latest().await
    }

    pub async fn list_checkpoints(&self, limit: usize) -> FleetResult<Vec<Checkpoint>> {
        self.checkpoints_repo.list(limit).await
    }

    pub async fn dry_run_resume(&self, id: CheckpointId) -> FleetResult<ResumePlan> {
        self.checkpoint.dry_run_resume(id).await
    }

    pub async fn resume(&self, id: CheckpointId) -> FleetResult<ResumePlan> {
        self.checkpoint.resume(id).await
    }

    // ---- Learning ----

    pub async fn list_patterns(&self, pattern_type: &str) -> FleetResult<Vec<LearnedPattern>> {
        self.patterns_repo.list_by_type(pattern_type).await
    }

    pub async fn create_pattern(
        &self,
        pattern_type: &str,
        trigger_words: Vec<String>,
        approach: &str,
    ) -> FleetResult<LearnedPattern> {
        self.learning.learn(pattern_type, trigger_words, approach).await
    }

    pub async fn get_pattern(&self, id: PatternId) -> FleetResult<Option<LearnedPattern>> {
        self.patterns_repo.get(id).await
    }

    pub async fn delete_pattern(&self, id: PatternId) -> FleetResult<()> {
        self.learning.delete(id).await
    }

    pub async fn get_learning_metrics(&self) -> FleetResult<Vec<PatternTypeMetrics>> {
        self.learning.get_metrics().await
    }

    // ---- Ambient operations surface (`SPEC_FULL.md` §10) ----

    pub async fn list_dead_letters(&self, mailbox: Option<&str>) -> FleetResult<Vec<DeadLetterEntry>> {
        self.dead_letter.list(mailbox).await
    }

    pub async fn retry_dead_letter(&self, id: crate::domain::ids::EventId, mailbox: &str) -> FleetResult<()> {
        self.dead_letter.retry(id, mailbox).await
    }

    pub async fn worker_health(&self, mailbox: &str) -> FleetResult<Option<CircuitBreakerRecord>> {
        self.dead_letters_repo.get_circuit(mailbox).await
    }

    pub fn event_log(&self) -> &EventLog<SqliteEventRepository> {
        &self.event_log
    }

    pub fn mailbox(&self) -> &MailboxService<SqliteEventRepository> {
        &self.mailbox
    }
}
