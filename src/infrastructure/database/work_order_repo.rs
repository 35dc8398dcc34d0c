//! sqlx-backed `WorkOrderRepository` (`spec.md` §4.6).

use std::collections::HashMap;

use sqlx::{Row, SqlitePool};

use crate::domain::errors::{FleetError, FleetResult};
use crate::domain::ids::{AssignmentId, WorkOrderId};
use crate::domain::models::mission::MissionPriority;
use crate::domain::models::{Assignment, WorkOrder, WorkOrderStatus};
use crate::domain::ports::{WorkOrderFilter, WorkOrderRepository};
use crate::infrastructure::database::utils::parse_datetime;

pub struct SqliteWorkOrderRepository {
    pool: SqlitePool,
}

impl SqliteWorkOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn row_to_work_order(&self, row: &sqlx::sqlite::SqliteRow) -> FleetResult<WorkOrder> {
        let id: WorkOrderId = row.get::<String, _>("id").parse()?;
        let dependencies = self.get_dependencies(id).await?;
        Ok(WorkOrder {
            id,
            sortie_id: row.get::<Option<String>, _>("sortie_id").as_deref().map(str::parse).transpose()?,
            work_type: row.get("work_type"),
            description: row.get("description"),
            status: parse_status(row.get::<String, _>("status").as_str())?,
            priority: parse_priority(row.get::<String, _>("priority").as_str())?,
            preferred_agent_type: row.get("preferred_agent_type"),
            assigned_to: row.get("assigned_to"),
            retry_count: row.get::<i64, _>("retry_count") as u32,
            retry_limit: row.get::<i64, _>("retry_limit") as u32,
            last_error: row.get("last_error"),
            dependencies,
            created_at: parse_datetime(row.get::<String, _>("created_at").as_str()).map_err(|e| FleetError::Internal(e.to_string()))?,
            updated_at: parse_datetime(row.get::<String, _>("updated_at").as_str()).map_err(|e| FleetError::Internal(e.to_string()))?,
        })
    }

    fn row_to_assignment(row: &sqlx::sqlite::SqliteRow) -> FleetResult<Assignment> {
        Ok(Assignment {
            assignment_id: row.get::<String, _>("assignment_id").parse()?,
            work_order_id: row.get::<String, _>("work_order_id").parse()?,
            pilot_id: row.get::<String, _>("pilot_id").parse()?,
            assigned_at: parse_datetime(row.get::<String, _>("assigned_at").as_str()).map_err(|e| FleetError::Internal(e.to_string()))?,
            accepted_at: row.get::<Option<String>, _>("accepted_at").as_deref().map(parse_datetime).transpose().map_err(|e| FleetError::Internal(e.to_string()))?,
            completed_at: row.get::<Option<String>, _>("completed_at").as_deref().map(parse_datetime).transpose().map_err(|e| FleetError::Internal(e.to_string()))?,
            estimated_completion: row.get::<Option<String>, _>("estimated_completion").as_deref().map(parse_datetime).transpose().map_err(|e| FleetError::Internal(e.to_string()))?,
            progress_percent: row.get::<i64, _>("progress_percent") as u8,
            error_details: row.get("error_details"),
        })
    }
}

fn parse_status(s: &str) -> FleetResult<WorkOrderStatus> {
    match s {
        "pending" => Ok(WorkOrderStatus::Pending),
        "assigned" => Ok(WorkOrderStatus::Assigned),
        "accepted" => Ok(WorkOrderStatus::Accepted),
        "in_progress" => Ok(WorkOrderStatus::InProgress),
        "completed" => Ok(WorkOrderStatus::Completed),
        "failed" => Ok(WorkOrderStatus::Failed),
        "cancelled" => Ok(WorkOrderStatus::Cancelled),
        other => Err(FleetError::Internal(format!("unknown work order status in storage: {other}"))),
    }
}

fn status_str(status: WorkOrderStatus) -> &'static str {
    match status {
        WorkOrderStatus::Pending => "pending",
        WorkOrderStatus::Assigned => "assigned",
        WorkOrderStatus::Accepted => "accepted",
        WorkOrderStatus::InProgress => "in_progress",
        WorkOrderStatus::Completed => "completed",
        WorkOrderStatus::Failed => "failed",
        WorkOrderStatus::Cancelled => "cancelled",
    }
}

fn parse_priority(s: &str) -> FleetResult<MissionPriority> {
    match s {
        "critical" => Ok(MissionPriority::Critical),
        "high" => Ok(MissionPriority::High),
        "medium" => Ok(MissionPriority::Medium),
        "low" => Ok(MissionPriority::Low),
        other => Err(FleetError::Internal(format!("unknown priority in storage: {other}"))),
    }
}

fn priority_str(priority: MissionPriority) -> &'static str {
    match priority {
        MissionPriority::Critical => "critical",
        MissionPriority::High => "high",
        MissionPriority::Medium => "medium",
        MissionPriority::Low => "low",
    }
}

#[async_trait::async_trait]
impl WorkOrderRepository for SqliteWorkOrderRepository {
    async fn create(&self, work_order: &WorkOrder) -> FleetResult<()> {
        sqlx::query(
            "INSERT INTO work_orders (
                id, sortie_id, work_type, description, status, priority, preferred_agent_type,
                assigned_to, retry_count, retry_limit, last_error, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(work_order.id.to_string())
        .bind(work_order.sortie_id.map(|id| id.to_string()))
        .bind(&work_order.work_type)
        .bind(&work_order.description)
        .bind(status_str(work_order.status))
        .bind(priority_str(work_order.priority))
        .bind(&work_order.preferred_agent_type)
        .bind(&work_order.assigned_to)
        .bind(work_order.retry_count as i64)
        .bind(work_order.retry_limit as i64)
        .bind(&work_order.last_error)
        .bind(work_order.created_at.to_rfc3339())
        .bind(work_order.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        for dep in &work_order.dependencies {
            self.add_dependency(work_order.id, *dep).await?;
        }
        Ok(())
    }

    async fn get(&self, id: WorkOrderId) -> FleetResult<Option<WorkOrder>> {
        let row = sqlx::query("SELECT * FROM work_orders WHERE id = ?").bind(id.to_string()).fetch_optional(&self.pool).await?;
        match row {
            Some(row) => Ok(Some(self.row_to_work_order(&row).await?)),
            None => Ok(None),
        }
    }

    async fn update(&self, work_order: &WorkOrder) -> FleetResult<()> {
        sqlx::query(
            "UPDATE work_orders SET sortie_id = ?, work_type = ?, description = ?, status = ?, priority = ?,
                preferred_agent_type = ?, assigned_to = ?, retry_count = ?, retry_limit = ?, last_error = ?,
                updated_at = ? WHERE id = ?",
        )
        .bind(work_order.sortie_id.map(|id| id.to_string()))
        .bind(&work_order.work_type)
        .bind(&work_order.description)
        .bind(status_str(work_order.status))
        .bind(priority_str(work_order.priority))
        .bind(&work_order.preferred_agent_type)
        .bind(&work_order.assigned_to)
        .bind(work_order.retry_count as i64)
        .bind(work_order.retry_limit as i64)
        .bind(&work_order.last_error)
        .bind(work_order.updated_at.to_rfc3339())
        .bind(work_order.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self, filter: WorkOrderFilter) -> FleetResult<Vec<WorkOrder>> {
        let mut sql = String::from("SELECT * FROM work_orders WHERE 1 = 1");
        if filter.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        if filter.sortie_id.is_some() {
            sql.push_str(" AND sortie_id = ?");
        }
        if filter.preferred_agent_type.is_some() {
            sql.push_str(" AND preferred_agent_type = ?");
        }
        sql.push_str(" ORDER BY created_at");

        let mut query = sqlx::query(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status_str(status));
        }
        if let Some(sortie_id) = filter.sortie_id {
            query = query.bind(sortie_id.to_string());
        }
        if let Some(agent_type) = filter.preferred_agent_type {
            query = query.bind(agent_type);
        }

        let rows = query.fetch_all(&self.pool).await?;
        let mut work_orders = Vec::with_capacity(rows.len());
        for row in &rows {
            work_orders.push(self.row_to_work_order(row).await?);
        }
        Ok(work_orders)
    }

    async fn get_ready(&self, limit: usize) -> FleetResult<Vec<WorkOrder>> {
        let rows = sqlx::query(
            "SELECT * FROM work_orders wo
             WHERE wo.status = 'pending'
               AND NOT EXISTS (
                   SELECT 1 FROM task_dependencies d
                   JOIN work_orders dep ON dep.id = d.depends_on_task_id
                   WHERE d.task_id = wo.id AND dep.status != 'completed'
               )
             ORDER BY CASE wo.priority
                 WHEN 'critical' THEN 0 WHEN 'high' THEN 1 WHEN 'medium' THEN 2 ELSE 3 END,
                 wo.created_at
             LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut work_orders = Vec::with_capacity(rows.len());
        for row in &rows {
            work_orders.push(self.row_to_work_order(row).await?);
        }
        Ok(work_orders)
    }

    async fn get_dependencies(&self, work_order_id: WorkOrderId) -> FleetResult<Vec<WorkOrderId>> {
        let rows = sqlx::query("SELECT depends_on_task_id FROM task_dependencies WHERE task_id = ?")
            .bind(work_order_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| r.get::<String, _>("depends_on_task_id").parse().map_err(FleetError::from)).collect()
    }

    async fn get_dependents(&self, work_order_id: WorkOrderId) -> FleetResult<Vec<WorkOrderId>> {
        let rows = sqlx::query("SELECT task_id FROM task_dependencies WHERE depends_on_task_id = ?")
            .bind(work_order_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| r.get::<String, _>("task_id").parse().map_err(FleetError::from)).collect()
    }

    async fn add_dependency(&self, work_order_id: WorkOrderId, depends_on: WorkOrderId) -> FleetResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO task_dependencies (task_id, depends_on_task_id, dependency_type, status)
             VALUES (?, ?, 'completion', 'pending')",
        )
        .bind(work_order_id.to_string())
        .bind(depends_on.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_assignment(&self, assignment: &Assignment) -> FleetResult<()> {
        sqlx::query(
            "INSERT INTO assignments (
                assignment_id, work_order_id, pilot_id, assigned_at, accepted_at, completed_at,
                estimated_completion, progress_percent, error_details
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(assignment.assignment_id.to_string())
        .bind(assignment.work_order_id.to_string())
        .bind(assignment.pilot_id.to_string())
        .bind(assignment.assigned_at.to_rfc3339())
        .bind(assignment.accepted_at.map(|dt| dt.to_rfc3339()))
        .bind(assignment.completed_at.map(|dt| dt.to_rfc3339()))
        .bind(assignment.estimated_completion.map(|dt| dt.to_rfc3339()))
        .bind(assignment.progress_percent as i64)
        .bind(&assignment.error_details)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_assignment(&self, assignment: &Assignment) -> FleetResult<()> {
        sqlx::query(
            "UPDATE assignments SET accepted_at = ?, completed_at = ?, estimated_completion = ?,
                progress_percent = ?, error_details = ? WHERE assignment_id = ?",
        )
        .bind(assignment.accepted_at.map(|dt| dt.to_rfc3339()))
        .bind(assignment.completed_at.map(|dt| dt.to_rfc3339()))
        .bind(assignment.estimated_completion.map(|dt| dt.to_rfc3339()))
        .bind(assignment.progress_percent as i64)
        .bind(&assignment.error_details)
        .bind(assignment.assignment_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_assignment(&self, assignment_id: AssignmentId) -> FleetResult<Option<Assignment>> {
        let row = sqlx::query("SELECT * FROM assignments WHERE assignment_id = ?")
            .bind(assignment_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_assignment).transpose()
    }

    async fn get_active_assignment_for(&self, work_order_id: WorkOrderId) -> FleetResult<Option<Assignment>> {
        let row = sqlx::query(
            "SELECT * FROM assignments WHERE work_order_id = ? AND completed_at IS NULL ORDER BY assigned_at DESC LIMIT 1",
        )
        .bind(work_order_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_assignment).transpose()
    }

    async fn count_by_status(&self) -> FleetResult<HashMap<WorkOrderStatus, u64>> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM work_orders GROUP BY status").fetch_all(&self.pool).await?;
        let mut counts = HashMap::new();
        for row in &rows {
            let status = parse_status(row.get::<String, _>("status").as_str())?;
            counts.insert(status, row.get::<i64, _>("n") as u64);
        }
        Ok(counts)
    }
}
