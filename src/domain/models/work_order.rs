//! Work order, assignment, and task-dependency entities (`spec.md` §3, §4.6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{FleetError, FleetResult};
use crate::domain::ids::{AssignmentId, PilotId, SortieId, WorkOrderId};
use crate::domain::models::mission::MissionPriority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    Pending,
    Assigned,
    Accepted,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl WorkOrderStatus {
    /// Valid forward transitions, including the `failed -> pending` retry
    /// edge from `spec.md` §3.
    pub const fn can_transition_to(self, next: Self) -> bool {
        use WorkOrderStatus::{Accepted, Assigned, Cancelled, Completed, Failed, InProgress, Pending};
        matches!(
            (self, next),
            (Pending, Assigned)
                | (Assigned, Accepted)
                | (Assigned, Pending) // assignment timeout revert
                | (Accepted, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (Failed, Pending) // retry within limit
                | (Pending, Cancelled)
                | (Assigned, Cancelled)
                | (Accepted, Cancelled)
                | (InProgress, Cancelled)
        )
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: WorkOrderId,
    pub sortie_id: Option<SortieId>,
    pub work_type: String,
    pub description: String,
    pub status: WorkOrderStatus,
    pub priority: MissionPriority,
    pub preferred_agent_type: Option<String>,
    pub assigned_to: Option<String>,
    pub retry_count: u32,
    pub retry_limit: u32,
    pub last_error: Option<String>,
    pub dependencies: Vec<WorkOrderId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkOrder {
    pub fn new(
        work_type: impl Into<String>,
        description: impl Into<String>,
        priority: MissionPriority,
        retry_limit: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: WorkOrderId::new(),
            sortie_id: None,
            work_type: work_type.into(),
            description: description.into(),
            status: WorkOrderStatus::Pending,
            priority,
            preferred_agent_type: None,
            assigned_to: None,
            retry_count: 0,
            retry_limit,
            last_error: None,
            dependencies: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition(&mut self, next: WorkOrderStatus) -> FleetResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(FleetError::Conflict(format!(
                "work order {} cannot transition {:?} -> {:?}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record a failure; returns whether the work order is retryable
    /// (`retry_count` stays below `retry_limit`) per `spec.md` §4.6.
    pub fn record_failure(&mut self, error: impl Into<String>) -> FleetResult<bool> {
        self.transition(WorkOrderStatus::Failed)?;
        self.last_error = Some(error.into());
        if self.retry_count < self.retry_limit {
            self.retry_count += 1;
            self.transition(WorkOrderStatus::Pending)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Tokenize `work_type`/`description` into lowercase trigger words for
    /// capability matching (`spec.md` §4.6).
    pub fn trigger_words(&self) -> std::collections::HashSet<String> {
        let text = format!("{} {}", self.work_type, self.description);
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    Completion,
    Success,
    Data,
    Resource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyStatus {
    Pending,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDependency {
    pub task_id: WorkOrderId,
    pub depends_on_task_id: WorkOrderId,
    pub dependency_type: DependencyType,
    pub status: DependencyStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub assignment_id: AssignmentId,
    pub work_order_id: WorkOrderId,
    pub pilot_id: PilotId,
    pub assigned_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub estimated_completion: Option<DateTime<Utc>>,
    pub progress_percent: u8,
    pub error_details: Option<String>,
}

impl Assignment {
    pub fn new(work_order_id: WorkOrderId, pilot_id: PilotId) -> Self {
        Self {
            assignment_id: AssignmentId::new(),
            work_order_id,
            pilot_id,
            assigned_at: Utc::now(),
            accepted_at: None,
            completed_at: None,
            estimated_completion: None,
            progress_percent: 0,
            error_details: None,
        }
    }

    pub fn set_progress(&mut self, percent: u8) -> FleetResult<()> {
        if percent > 100 {
            return Err(FleetError::InvalidInput(format!(
                "progress_percent {percent} out of range [0,100]"
            )));
        }
        self.progress_percent = percent;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_order_retries_within_limit_then_fails_terminally() {
        let mut wo = WorkOrder::new("implement REST endpoint", "desc", MissionPriority::High, 2);
        wo.transition(WorkOrderStatus::Assigned).unwrap();
        wo.transition(WorkOrderStatus::Accepted).unwrap();
        wo.transition(WorkOrderStatus::InProgress).unwrap();

        assert!(wo.record_failure("boom").unwrap());
        assert_eq!(wo.status, WorkOrderStatus::Pending);
        assert_eq!(wo.retry_count, 1);

        wo.transition(WorkOrderStatus::Assigned).unwrap();
        wo.transition(WorkOrderStatus::Accepted).unwrap();
        wo.transition(WorkOrderStatus::InProgress).unwrap();
        assert!(wo.record_failure("boom again").unwrap());
        assert_eq!(wo.retry_count, 2);

        wo.transition(WorkOrderStatus::Assigned).unwrap();
        wo.transition(WorkOrderStatus::Accepted).unwrap();
        wo.transition(WorkOrderStatus::InProgress).unwrap();
        assert!(!wo.record_failure("final boom").unwrap());
        assert_eq!(wo.status, WorkOrderStatus::Failed);
        assert!(wo.status.is_terminal());
    }

    #[test]
    fn trigger_words_lowercase_and_split_on_punctuation() {
        let wo = WorkOrder::new("Implement REST-endpoint", "Add /users route", MissionPriority::Medium, 3);
        let words = wo.trigger_words();
        assert!(words.contains("implement"));
        assert!(words.contains("rest"));
        assert!(words.contains("endpoint"));
        assert!(words.contains("users"));
    }

    #[test]
    fn assignment_rejects_out_of_range_progress() {
        let mut a = Assignment::new(WorkOrderId::new(), PilotId::new());
        assert!(a.set_progress(101).is_err());
        assert!(a.set_progress(100).is_ok());
    }
}
