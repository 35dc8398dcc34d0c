//! Mission and sortie entities and state machines (`spec.md` §3, §4.7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{FleetError, FleetResult};
use crate::domain::ids::{MissionId, SortieId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl MissionPriority {
    pub const fn weight(self) -> f64 {
        match self {
            Self::Critical => 1.0,
            Self::High => 0.75,
            Self::Medium => 0.5,
            Self::Low => 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Archived,
}

impl MissionStatus {
    /// Valid forward transitions per `spec.md` §4.7.
    pub const fn can_transition_to(self, next: Self) -> bool {
        use MissionStatus::{Archived, Cancelled, Completed, Failed, InProgress, Pending};
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Cancelled)
                | (Completed, Archived)
                | (Failed, Archived)
                | (Cancelled, Archived)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub id: MissionId,
    pub title: String,
    pub description: Option<String>,
    pub status: MissionStatus,
    pub priority: MissionPriority,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Mission {
    pub fn new(title: impl Into<String>, priority: MissionPriority) -> Self {
        Self {
            id: MissionId::new(),
            title: title.into(),
            description: None,
            status: MissionStatus::Pending,
            priority,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Force the mission back to `in_progress` as part of a checkpoint
    /// resume (`spec.md` §4.8 step 7), bypassing the forward-only state
    /// machine: a resumed mission was interrupted mid-flight, not advanced
    /// through a normal transition.
    pub fn resume_in_progress(&mut self) {
        self.status = MissionStatus::InProgress;
        self.completed_at = None;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    /// Apply a state transition, enforcing the mission state machine.
    pub fn transition(&mut self, next: MissionStatus) -> FleetResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(FleetError::InvalidInput(format!(
                "mission {} cannot transition {:?} -> {:?}",
                self.id, self.status, next
            )));
        }
        match next {
            MissionStatus::InProgress if self.started_at.is_none() => {
                self.started_at = Some(Utc::now());
            }
            MissionStatus::Completed | MissionStatus::Failed | MissionStatus::Cancelled => {
                self.completed_at = Some(Utc::now());
            }
            _ => {}
        }
        self.status = next;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortieStatus {
    Open,
    InProgress,
    Blocked,
    Closed,
}

impl SortieStatus {
    pub const fn can_transition_to(self, next: Self) -> bool {
        use SortieStatus::{Blocked, Closed, InProgress, Open};
        matches!(
            (self, next),
            (Open, InProgress)
                | (InProgress, Blocked)
                | (Blocked, InProgress)
                | (InProgress, Closed)
                | (Blocked, Closed)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sortie {
    pub id: SortieId,
    pub mission_id: Option<MissionId>,
    pub status: SortieStatus,
    pub assigned_to: Option<String>,
    pub files: Vec<String>,
    pub blocked_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sortie {
    pub fn new(mission_id: Option<MissionId>) -> Self {
        let now = Utc::now();
        Self {
            id: SortieId::new(),
            mission_id,
            status: SortieStatus::Open,
            assigned_to: None,
            files: Vec::new(),
            blocked_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition(&mut self, next: SortieStatus) -> FleetResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(FleetError::InvalidInput(format!(
                "sortie {} cannot transition {:?} -> {:?}",
                self.id, self.status, next
            )));
        }
        if next != SortieStatus::Blocked {
            self.blocked_reason = None;
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn block(&mut self, reason: impl Into<String>) -> FleetResult<()> {
        self.blocked_reason = Some(reason.into());
        self.transition(SortieStatus::Blocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mission_cannot_skip_in_progress() {
        let mut mission = Mission::new("test", MissionPriority::Medium);
        assert!(mission.transition(MissionStatus::Completed).is_err());
    }

    #[test]
    fn mission_records_started_and_completed_timestamps() {
        let mut mission = Mission::new("test", MissionPriority::Medium);
        mission.transition(MissionStatus::InProgress).unwrap();
        assert!(mission.started_at.is_some());
        mission.transition(MissionStatus::Completed).unwrap();
        assert!(mission.completed_at.is_some());
    }

    #[test]
    fn sortie_blocked_then_resumed_clears_reason() {
        let mut sortie = Sortie::new(None);
        sortie.transition(SortieStatus::InProgress).unwrap();
        sortie.block("waiting on reservation").unwrap();
        assert!(sortie.blocked_reason.is_some());
        sortie.transition(SortieStatus::InProgress).unwrap();
        assert!(sortie.blocked_reason.is_none());
    }

    #[test]
    fn sortie_cannot_close_while_open() {
        let mut sortie = Sortie::new(None);
        assert!(sortie.transition(SortieStatus::Closed).is_err());
    }

    #[test]
    fn resume_in_progress_clears_completion_from_any_status() {
        let mut mission = Mission::new("test", MissionPriority::Medium);
        mission.transition(MissionStatus::InProgress).unwrap();
        mission.transition(MissionStatus::Failed).unwrap();
        assert!(mission.completed_at.is_some());

        mission.resume_in_progress();
        assert_eq!(mission.status, MissionStatus::InProgress);
        assert!(mission.completed_at.is_none());
    }
}
