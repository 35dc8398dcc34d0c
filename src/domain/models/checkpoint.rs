//! Checkpoint/resume entities (`spec.md` §3, §4.8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{CheckpointId, MissionId, Sequence};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointTrigger {
    Manual,
    Auto,
    Progress,
    Error,
    ContextLimit,
    Compaction,
}

/// A point-in-time snapshot of fleet state sufficient to resume from
/// `spec.md` §4.8. The snapshot is a serialized blob rather than typed
/// fields so the checkpoint schema does not need to evolve in lockstep with
/// every domain model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub mission_id: Option<MissionId>,
    pub trigger: CheckpointTrigger,
    pub event_watermark: Sequence,
    pub snapshot: serde_json::Value,
    pub created_at: DateTime<Utc>,
    /// Set once `resume` has consumed this checkpoint (`spec.md` §4.8 step
    /// 6). A checkpoint with `consumed_at` set can never be resumed again.
    pub consumed_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    pub fn new(
        mission_id: Option<MissionId>,
        trigger: CheckpointTrigger,
        event_watermark: Sequence,
        snapshot: serde_json::Value,
    ) -> Self {
        Self {
            id: CheckpointId::new(),
            mission_id,
            trigger,
            event_watermark,
            snapshot,
            created_at: Utc::now(),
            consumed_at: None,
        }
    }
}

/// Result of a dry-run resume (`spec.md` §4.8): reports what *would* be
/// restored without mutating any live state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumePlan {
    pub checkpoint_id: CheckpointId,
    pub missions_to_restore: usize,
    pub work_orders_to_requeue: usize,
    pub reservations_to_drop: usize,
    pub events_to_replay: u64,
}

/// A pilot's mailbox cursor plus the events it has not yet delivered, as of
/// the moment a checkpoint was taken (`spec.md` §4.8 snapshot contents).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxSnapshot {
    pub pilot_callsign: String,
    pub cursor: Sequence,
    pub undelivered: Vec<crate::domain::models::event::Event>,
}

/// A reference to a learned pattern's lineage and version at snapshot time,
/// so resume can tell whether a pattern has since been superseded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternRef {
    pub pattern_hash: String,
    pub version: u32,
}

/// Free-text recovery aid for whoever (or whatever) resumes the mission
/// (`spec.md` §4.8): what happened, what's left, what's in the way.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RecoveryContext {
    pub summary: String,
    pub last_steps: Vec<String>,
    pub next_steps: Vec<String>,
    pub blockers: Vec<String>,
    pub touched_paths: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_captures_watermark_and_snapshot() {
        let snapshot = serde_json::json!({"missions": []});
        let checkpoint = Checkpoint::new(None, CheckpointTrigger::Manual, Sequence(42), snapshot.clone());
        assert_eq!(checkpoint.event_watermark, Sequence(42));
        assert_eq!(checkpoint.snapshot, snapshot);
        assert!(checkpoint.consumed_at.is_none());
    }
}
