//! Work order assignment scheduler (`spec.md` §4.6).
//!
//! Combines `dependency_resolver`'s readiness check with `priority`'s
//! scoring to pick the best pilot for each ready work order, and drives the
//! retry/backoff policy on failure using the `backoff` crate the way the
//! teacher's retry paths do.

use std::sync::Arc;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use tracing::{info, warn};

use crate::domain::errors::{FleetError, FleetResult};
use crate::domain::ids::{PilotId, WorkOrderId};
use crate::domain::models::{Assignment, Pilot, WorkOrder, WorkOrderStatus};
use crate::domain::ports::{PilotRepository, WorkOrderRepository};
use crate::services::priority::ScoreCalculator;

pub struct Scheduler<W: WorkOrderRepository, P: PilotRepository> {
    work_orders: Arc<W>,
    pilots: Arc<P>,
    scorer: ScoreCalculator,
}

impl<W: WorkOrderRepository, P: PilotRepository> Scheduler<W, P> {
    pub fn new(work_orders: Arc<W>, pilots: Arc<P>, scorer: ScoreCalculator) -> Self {
        Self { work_orders, pilots, scorer }
    }

    /// Assign as many ready work orders as possible to available pilots,
    /// highest score first, returning the assignments made.
    pub async fn dispatch(&self, max_assignments: usize) -> FleetResult<Vec<Assignment>> {
        let ready = self.work_orders.get_ready(max_assignments).await?;
        let mut made = Vec::new();

        for work_order in ready {
            let available: Vec<Pilot> = self
                .pilots
                .list_by_status(crate::domain::models::PilotStatus::Idle)
                .await?
                .into_iter()
                .chain(self.pilots.list_by_status(crate::domain::models::PilotStatus::Busy).await?)
                .filter(Pilot::has_free_capacity)
                .collect();

            let ranked = self.scorer.rank(&available, &work_order);
            let Some(best) = ranked.first() else {
                continue;
            };

            let assignment = self.assign(work_order.id, best.pilot_id).await?;
            made.push(assignment);
        }
        Ok(made)
    }

    pub async fn assign(&self, work_order_id: WorkOrderId, pilot_id: PilotId) -> FleetResult<Assignment> {
        let mut work_order = self
            .work_orders
            .get(work_order_id)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("work order {work_order_id}")))?;
        work_order.transition(WorkOrderStatus::Assigned)?;

        let mut pilot = self
            .pilots
            .get(pilot_id)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("pilot {pilot_id}")))?;
        if !pilot.has_free_capacity() {
            return Err(FleetError::Conflict(format!("pilot {} has no free capacity", pilot.callsign)));
        }
        pilot.current_workload += 1;
        pilot.status = crate::domain::models::PilotStatus::Busy;

        let assignment = Assignment::new(work_order_id, pilot_id);
        self.work_orders.update(&work_order).await?;
        self.pilots.update(&pilot).await?;
        self.work_orders.create_assignment(&assignment).await?;

        info!(%work_order_id, pilot = pilot.callsign, "work order assigned");
        Ok(assignment)
    }

    /// Revert a stale `Assigned` work order back to `Pending` once the
    /// assignment timeout elapses without an `accept` (`spec.md` §4.6).
    pub async fn revert_timed_out_assignment(&self, work_order_id: WorkOrderId) -> FleetResult<()> {
        let mut work_order = self
            .work_orders
            .get(work_order_id)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("work order {work_order_id}")))?;
        work_order.transition(WorkOrderStatus::Pending)?;
        self.work_orders.update(&work_order).await?;
        warn!(%work_order_id, "assignment timed out, reverted to pending");
        Ok(())
    }

    /// Record a failure and, if retryable, compute the next backoff delay
    /// before the work order becomes eligible for re-dispatch.
    pub async fn record_failure(&self, work_order_id: WorkOrderId, error: impl Into<String>) -> FleetResult<Option<std::time::Duration>> {
        let mut work_order = self
            .work_orders
            .get(work_order_id)
            .await?
            .ok_or_else(|| FleetError::NotFound(format!("work order {work_order_id}")))?;

        let retryable = work_order.record_failure(error)?;
        self.work_orders.update(&work_order).await?;

        if !retryable {
            return Ok(None);
        }

        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(std::time::Duration::from_secs(5))
            .with_multiplier(2.0)
            .with_max_interval(std::time::Duration::from_secs(300))
            .build();
        for _ in 0..work_order.retry_count.saturating_sub(1) {
            backoff.next_backoff();
        }
        Ok(backoff.next_backoff())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::AssignmentId;
    use crate::domain::models::MissionPriority;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeWorkOrders {
        work_orders: Mutex<HashMap<WorkOrderId, WorkOrder>>,
        assignments: Mutex<Vec<Assignment>>,
    }

    #[async_trait]
    impl WorkOrderRepository for FakeWorkOrders {
        async fn create(&self, wo: &WorkOrder) -> FleetResult<()> {
            self.work_orders.lock().unwrap().insert(wo.id, wo.clone());
            Ok(())
        }
        async fn get(&self, id: WorkOrderId) -> FleetResult<Option<WorkOrder>> {
            Ok(self.work_orders.lock().unwrap().get(&id).cloned())
        }
        async fn update(&self, wo: &WorkOrder) -> FleetResult<()> {
            self.work_orders.lock().unwrap().insert(wo.id, wo.clone());
            Ok(())
        }
        async fn list(&self, _filter: crate::domain::ports::WorkOrderFilter) -> FleetResult<Vec<WorkOrder>> {
            Ok(self.work_orders.lock().unwrap().values().cloned().collect())
        }
        async fn get_ready(&self, limit: usize) -> FleetResult<Vec<WorkOrder>> {
            Ok(self
                .work_orders
                .lock()
                .unwrap()
                .values()
                .filter(|w| w.status == WorkOrderStatus::Pending && w.dependencies.is_empty())
                .take(limit)
                .cloned()
                .collect())
        }
        async fn get_dependencies(&self, _id: WorkOrderId) -> FleetResult<Vec<WorkOrderId>> {
            Ok(vec![])
        }
        async fn get_dependents(&self, _id: WorkOrderId) -> FleetResult<Vec<WorkOrderId>> {
            Ok(vec![])
        }
        async fn add_dependency(&self, _id: WorkOrderId, _dep: WorkOrderId) -> FleetResult<()> {
            Ok(())
        }
        async fn create_assignment(&self, assignment: &Assignment) -> FleetResult<()> {
            self.assignments.lock().unwrap().push(assignment.clone());
            Ok(())
        }
        async fn update_assignment(&self, assignment: &Assignment) -> FleetResult<()> {
            let mut assignments = self.assignments.lock().unwrap();
            if let Some(existing) = assignments.iter_mut().find(|a| a.assignment_id == assignment.assignment_id) {
                *existing = assignment.clone();
            }
            Ok(())
        }
        async fn get_assignment(&self, id: AssignmentId) -> FleetResult<Option<Assignment>> {
            Ok(self.assignments.lock().unwrap().iter().find(|a| a.assignment_id == id).cloned())
        }
        async fn get_active_assignment_for(&self, work_order_id: WorkOrderId) -> FleetResult<Option<Assignment>> {
            Ok(self.assignments.lock().unwrap().iter().find(|a| a.work_order_id == work_order_id).cloned())
        }
        async fn count_by_status(&self) -> FleetResult<HashMap<WorkOrderStatus, u64>> {
            Ok(HashMap::new())
        }
    }

    #[derive(Default)]
    struct FakePilots {
        pilots: Mutex<HashMap<PilotId, Pilot>>,
    }

    #[async_trait]
    impl PilotRepository for FakePilots {
        async fn register(&self, pilot: &Pilot) -> FleetResult<()> {
            self.pilots.lock().unwrap().insert(pilot.pilot_id, pilot.clone());
            Ok(())
        }
        async fn get(&self, id: PilotId) -> FleetResult<Option<Pilot>> {
            Ok(self.pilots.lock().unwrap().get(&id).cloned())
        }
        async fn get_by_callsign(&self, callsign: &str) -> FleetResult<Option<Pilot>> {
            Ok(self.pilots.lock().unwrap().values().find(|p| p.callsign == callsign).cloned())
        }
        async fn update(&self, pilot: &Pilot) -> FleetResult<()> {
            self.pilots.lock().unwrap().insert(pilot.pilot_id, pilot.clone());
            Ok(())
        }
        async fn list(&self) -> FleetResult<Vec<Pilot>> {
            Ok(self.pilots.lock().unwrap().values().cloned().collect())
        }
        async fn list_by_status(&self, status: crate::domain::models::PilotStatus) -> FleetResult<Vec<Pilot>> {
            Ok(self.pilots.lock().unwrap().values().filter(|p| p.status == status).cloned().collect())
        }
        async fn list_stale(&self, _cutoff: chrono::DateTime<chrono::Utc>) -> FleetResult<Vec<Pilot>> {
            Ok(vec![])
        }
        async fn deregister(&self, id: PilotId) -> FleetResult<()> {
            self.pilots.lock().unwrap().remove(&id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn dispatch_assigns_ready_work_order_to_available_pilot() {
        let work_orders = Arc::new(FakeWorkOrders::default());
        let pilots = Arc::new(FakePilots::default());

        let wo = WorkOrder::new("build", "build the thing", MissionPriority::High, 2);
        work_orders.create(&wo).await.unwrap();
        let pilot = Pilot::new("viper-1", "backend", 3);
        pilots.register(&pilot).await.unwrap();

        let scheduler = Scheduler::new(work_orders.clone(), pilots.clone(), ScoreCalculator::default());
        let made = scheduler.dispatch(10).await.unwrap();

        assert_eq!(made.len(), 1);
        let updated = work_orders.get(wo.id).await.unwrap().unwrap();
        assert_eq!(updated.status, WorkOrderStatus::Assigned);
    }

    #[tokio::test]
    async fn record_failure_returns_backoff_when_retries_remain() {
        let work_orders = Arc::new(FakeWorkOrders::default());
        let pilots = Arc::new(FakePilots::default());
        let mut wo = WorkOrder::new("build", "build", MissionPriority::Medium, 2);
        wo.transition(WorkOrderStatus::Assigned).unwrap();
        wo.transition(WorkOrderStatus::Accepted).unwrap();
        wo.transition(WorkOrderStatus::InProgress).unwrap();
        work_orders.create(&wo).await.unwrap();

        let scheduler = Scheduler::new(work_orders, pilots, ScoreCalculator::default());
        let delay = scheduler.record_failure(wo.id, "boom").await.unwrap();
        assert!(delay.is_some());
    }
}
