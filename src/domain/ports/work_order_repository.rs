//! Work order, assignment, and dependency repository port (`spec.md` §4.6).

use async_trait::async_trait;

use crate::domain::errors::FleetResult;
use crate::domain::ids::{AssignmentId, SortieId, WorkOrderId};
use crate::domain::models::{Assignment, WorkOrder, WorkOrderStatus};

#[derive(Debug, Clone, Default)]
pub struct WorkOrderFilter {
    pub status: Option<WorkOrderStatus>,
    pub sortie_id: Option<SortieId>,
    pub preferred_agent_type: Option<String>,
}

#[async_trait]
pub trait WorkOrderRepository: Send + Sync {
    async fn create(&self, work_order: &WorkOrder) -> FleetResult<()>;

    async fn get(&self, id: WorkOrderId) -> FleetResult<Option<WorkOrder>>;

    async fn update(&self, work_order: &WorkOrder) -> FleetResult<()>;

    async fn list(&self, filter: WorkOrderFilter) -> FleetResult<Vec<WorkOrder>>;

    /// Work orders with all dependencies resolved, ordered by computed
    /// priority score descending, capped at `limit`.
    async fn get_ready(&self, limit: usize) -> FleetResult<Vec<WorkOrder>>;

    async fn get_dependencies(&self, work_order_id: WorkOrderId) -> FleetResult<Vec<WorkOrderId>>;

    async fn get_dependents(&self, work_order_id: WorkOrderId) -> FleetResult<Vec<WorkOrderId>>;

    async fn add_dependency(&self, work_order_id: WorkOrderId, depends_on: WorkOrderId) -> FleetResult<()>;

    async fn create_assignment(&self, assignment: &Assignment) -> FleetResult<()>;

    async fn update_assignment(&self, assignment: &Assignment) -> FleetResult<()>;

    async fn get_assignment(&self, assignment_id: AssignmentId) -> FleetResult<Option<Assignment>>;

    async fn get_active_assignment_for(&self, work_order_id: WorkOrderId) -> FleetResult<Option<Assignment>>;

    async fn count_by_status(&self) -> FleetResult<std::collections::HashMap<WorkOrderStatus, u64>>;
}
