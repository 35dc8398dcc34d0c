//! Checkpoint creation, dry-run resume planning, and inactivity monitoring
//! (`spec.md` §4.8).

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::errors::{FleetError, FleetResult};
use crate::domain::ids::{CheckpointId, MissionId, Sequence};
use crate::domain::models::{
    Checkpoint, CheckpointTrigger, MailboxSnapshot, Mission, PatternRef, RecoveryContext, ResumePlan, Sortie,
    SortieStatus, StreamType, WorkOrder, WorkOrderStatus,
};
use crate::domain::ports::{
    CheckpointRepository, EventRepository, LockRepository, MissionRepository, PatternRepository, ReservationRepository,
    SortieRepository, WorkOrderRepository,
};
use crate::services::event_log::EventLog;

pub struct CheckpointService<C, E, M, W, R, S, L, Pt>
where
    C: CheckpointRepository,
    E: EventRepository,
    M: MissionRepository,
    W: WorkOrderRepository,
    R: ReservationRepository,
    S: SortieRepository,
    L: LockRepository,
    Pt: PatternRepository,
{
    checkpoints: Arc<C>,
    events: Arc<E>,
    event_log: EventLog<E>,
    missions: Arc<M>,
    work_orders: Arc<W>,
    reservations: Arc<R>,
    sorties: Arc<S>,
    locks: Arc<L>,
    patterns: Arc<Pt>,
}

impl<C, E, M, W, R, S, L, Pt> CheckpointService<C, E, M, W, R, S, L, Pt>
where
    C: CheckpointRepository,
    E: EventRepository,
    M: MissionRepository,
    W: WorkOrderRepository,
    R: ReservationRepository,
    S: SortieRepository,
    L: LockRepository,
    Pt: PatternRepository,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        checkpoints: Arc<C>,
        events: Arc<E>,
        missions: Arc<M>,
        work_orders: Arc<W>,
        reservations: Arc<R>,
        sorties: Arc<S>,
        locks: Arc<L>,
        patterns: Arc<Pt>,
    ) -> Self {
        let event_log = EventLog::new(events.clone());
        Self { checkpoints, events, event_log, missions, work_orders, reservations, sorties, locks, patterns }
    }

    /// Snapshot the current fleet state at the current event-log watermark:
    /// missions, work orders, sorties, held reservations/locks, each pilot
    /// mailbox's cursor and undelivered events, a recovery context, and
    /// learned-pattern version references (`spec.md` §4.8).
    pub async fn create_checkpoint(
        &self,
        mission_id: Option<MissionId>,
        trigger: CheckpointTrigger,
        mailbox_snapshots: Vec<MailboxSnapshot>,
    ) -> FleetResult<Checkpoint> {
        let missions: Vec<Mission> = match mission_id {
            Some(id) => self.missions.get(id).await?.into_iter().collect(),
            None => self.missions.list(Default::default()).await?,
        };
        let work_orders = self.work_orders.list(Default::default()).await?;

        let mut sorties: Vec<Sortie> = Vec::new();
        for mission in &missions {
            sorties.extend(self.sorties.list_by_mission(mission.id).await?);
        }

        let active_reservations = self.reservations.list_active().await?;
        let far_future = Utc::now() + chrono::Duration::days(365 * 100);
        let held_locks = self.locks.list_expired(far_future).await?;

        let patterns = self.patterns.list_all().await?;
        let pattern_refs: Vec<PatternRef> =
            patterns.into_iter().map(|p| PatternRef { pattern_hash: p.pattern_hash, version: p.version }).collect();

        let recovery_context = build_recovery_context(&missions, &work_orders, &sorties, &active_reservations);
        let watermark = self.events.count().await.map(Sequence)?;

        let snapshot = serde_json::json!({
            "missions": missions,
            "work_orders": work_orders,
            "sorties": sorties,
            "reservations": active_reservations,
            "locks": held_locks,
            "mailboxes": mailbox_snapshots,
            "recovery_context": recovery_context,
            "patterns": pattern_refs,
        });

        let checkpoint = Checkpoint::new(mission_id, trigger, watermark, snapshot);
        self.checkpoints.create(&checkpoint).await?;
        info!(checkpoint_id = %checkpoint.id, ?trigger, "checkpoint created");
        Ok(checkpoint)
    }

    /// Compute what a resume from `checkpoint_id` would do, without
    /// mutating any live state (`spec.md` §4.8's dry-run operation).
    pub async fn dry_run_resume(&self, checkpoint_id: CheckpointId) -> FleetResult<ResumePlan> {
        let checkpoint = self
            .checkpoints
            .get(checkpoint_id)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("checkpoint {checkpoint_id}")))?;

        let snapshot_work_orders: Vec<WorkOrder> = checkpoint
            .snapshot
            .get("work_orders")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let snapshot_missions: Vec<Mission> = checkpoint
            .snapshot
            .get("missions")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        let requeue = snapshot_work_orders.iter().filter(|w| !w.status.is_terminal()).count();
        let active_reservations = self.reservations.list_active().await?;

        let current_watermark = self.events.count().await.map(Sequence)?;
        let events_to_replay = current_watermark.0.saturating_sub(checkpoint.event_watermark.0);

        Ok(ResumePlan {
            checkpoint_id,
            missions_to_restore: snapshot_missions.len(),
            work_orders_to_requeue: requeue,
            reservations_to_drop: active_reservations.len(),
            events_to_replay,
        })
    }

    /// Actually resume from `checkpoint_id` (`spec.md` §4.8 steps 2, 6, 7):
    /// rejects an already-consumed checkpoint with `PreconditionFailed` and
    /// has no side effects in that case; otherwise requeues non-terminal
    /// work orders to `Pending`, drops every active reservation, marks the
    /// checkpoint consumed, moves the mission back to `in_progress`, and
    /// emits `fleet_recovered`.
    pub async fn resume(&self, checkpoint_id: CheckpointId) -> FleetResult<ResumePlan> {
        let checkpoint = self
            .checkpoints
            .get(checkpoint_id)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("checkpoint {checkpoint_id}")))?;

        if checkpoint.consumed_at.is_some() {
            return Err(FleetError::PreconditionFailed(format!("checkpoint {checkpoint_id} already consumed")));
        }

        let plan = self.dry_run_resume(checkpoint_id).await?;

        let snapshot_work_orders: Vec<WorkOrder> = checkpoint
            .snapshot
            .get("work_orders")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        for mut wo in snapshot_work_orders {
            if !wo.status.is_terminal() && wo.status != WorkOrderStatus::Pending {
                wo.status = WorkOrderStatus::Pending;
                self.work_orders.update(&wo).await?;
            }
        }

        if let Some(mission_id) = checkpoint.mission_id {
            if let Some(mut mission) = self.missions.get(mission_id).await? {
                mission.resume_in_progress();
                self.missions.update(&mission).await?;
            }
        }

        let mut consumed = checkpoint.clone();
        consumed.consumed_at = Some(Utc::now());
        self.checkpoints.update(&consumed).await?;

        self.event_log
            .append(
                StreamType::Checkpoint,
                checkpoint_id.to_string(),
                crate::domain::models::EventPayload::FleetRecovered { checkpoint_id: checkpoint_id.0 },
                None,
                None,
            )
            .await?;

        warn!(%checkpoint_id, "fleet resumed from checkpoint, active reservations dropped");
        Ok(plan)
    }
}

/// Assemble a recovery context from the snapshot's own data: last 10
/// completed work orders as steps taken, every non-terminal work order as a
/// next step, every blocked sortie's reason as a blocker, and every
/// reservation's path as a touched path (`spec.md` §4.8).
fn build_recovery_context(
    missions: &[Mission],
    work_orders: &[WorkOrder],
    sorties: &[Sortie],
    reservations: &[crate::domain::models::Reservation],
) -> RecoveryContext {
    let mut completed: Vec<&WorkOrder> = work_orders.iter().filter(|w| w.status == WorkOrderStatus::Completed).collect();
    completed.sort_by_key(|w| w.updated_at);
    let last_steps = completed.iter().rev().take(10).rev().map(|w| w.description.clone()).collect();

    let next_steps =
        work_orders.iter().filter(|w| !w.status.is_terminal()).map(|w| format!("{}: {}", w.work_type, w.description)).collect();

    let blockers =
        sorties.iter().filter(|s| s.status == SortieStatus::Blocked).filter_map(|s| s.blocked_reason.clone()).collect();

    let touched_paths: Vec<String> = {
        let mut paths: Vec<String> = reservations.iter().map(|r| r.path_pattern.clone()).collect();
        paths.sort();
        paths.dedup();
        paths
    };

    let summary = format!(
        "{} mission(s), {} work order(s) ({} completed)",
        missions.len(),
        work_orders.len(),
        completed.len()
    );

    RecoveryContext { summary, last_steps, next_steps, blockers, touched_paths }
}

/// Whether no event has been recorded in `threshold`, used by the
/// inactivity monitor (`spec.md` §4.8) to decide when to force a
/// checkpoint. Free function since it needs no repository access.
pub fn is_inactive(last_event_at: chrono::DateTime<Utc>, threshold: chrono::Duration) -> bool {
    Utc::now() - last_event_at >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactivity_threshold_trips_after_silence() {
        let quiet_since = Utc::now() - chrono::Duration::minutes(10);
        assert!(is_inactive(quiet_since, chrono::Duration::minutes(5)));
        assert!(!is_inactive(Utc::now(), chrono::Duration::minutes(5)));
    }
}
