//! Event log entities (`spec.md` §3, §4.2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::ids::{EventId, Sequence};

/// The logical stream a sequence of events belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    Mission,
    Sortie,
    WorkOrder,
    Pilot,
    File,
    Lock,
    Checkpoint,
    Mailbox,
    System,
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Mission => "mission",
            Self::Sortie => "sortie",
            Self::WorkOrder => "work_order",
            Self::Pilot => "pilot",
            Self::File => "file",
            Self::Lock => "lock",
            Self::Checkpoint => "checkpoint",
            Self::Mailbox => "mailbox",
            Self::System => "system",
        };
        write!(f, "{s}")
    }
}

/// Tagged event payload. `event_type` on the wire is the serde tag.
///
/// Unknown `event_type` values are rejected by the schema registry in
/// `services::event_log` before an event ever reaches this enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "data")]
pub enum EventPayload {
    MissionSubmitted { title: String },
    MissionDecomposed { sortie_count: usize },
    MissionStateChanged { from: String, to: String },

    SortieOpened,
    SortieBlocked { reason: String },
    SortieClosed,

    WorkOrderSubmitted { work_type: String },
    TaskAssignment { work_order_id: Uuid, pilot_callsign: String },
    WorkOrderStateChanged { from: String, to: String },
    WorkOrderFailed { error: String, retry_count: u32 },

    PilotRegistered { callsign: String, agent_type: String },
    PilotDeregistered { callsign: String, reason: String },
    PilotHeartbeat { callsign: String },

    FileReserved { path: String, holder: String, exclusive: bool },
    FileReleased { path: String, holder: String, reason: String },
    FileConflict { path: String, holder: String, reason: String },

    LockAcquired { key: String, holder: String },
    LockReleased { key: String, holder: String, reason: String },

    CheckpointCreated { checkpoint_id: Uuid, trigger: String },
    FleetRecovered { checkpoint_id: Uuid },
    ContextInjected { mission_id: Uuid, prompt: String },

    PatternLearned { pattern_id: Uuid, effectiveness: f64 },
    PatternOutcomeRecorded { pattern_id: Uuid, outcome: String },
}

impl EventPayload {
    /// The `event_type` discriminant string used for schema validation and
    /// for the `QueryByType` operation (`spec.md` §4.2).
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MissionSubmitted { .. } => "mission_submitted",
            Self::MissionDecomposed { .. } => "mission_decomposed",
            Self::MissionStateChanged { .. } => "mission_state_changed",
            Self::SortieOpened => "sortie_opened",
            Self::SortieBlocked { .. } => "sortie_blocked",
            Self::SortieClosed => "sortie_closed",
            Self::WorkOrderSubmitted { .. } => "work_order_submitted",
            Self::TaskAssignment { .. } => "task_assignment",
            Self::WorkOrderStateChanged { .. } => "work_order_state_changed",
            Self::WorkOrderFailed { .. } => "work_order_failed",
            Self::PilotRegistered { .. } => "pilot_registered",
            Self::PilotDeregistered { .. } => "pilot_deregistered",
            Self::PilotHeartbeat { .. } => "pilot_heartbeat",
            Self::FileReserved { .. } => "file_reserved",
            Self::FileReleased { .. } => "file_released",
            Self::FileConflict { .. } => "file_conflict",
            Self::LockAcquired { .. } => "lock_acquired",
            Self::LockReleased { .. } => "lock_released",
            Self::CheckpointCreated { .. } => "checkpoint_created",
            Self::FleetRecovered { .. } => "fleet_recovered",
            Self::ContextInjected { .. } => "context_injected",
            Self::PatternLearned { .. } => "pattern_learned",
            Self::PatternOutcomeRecorded { .. } => "pattern_outcome_recorded",
        }
    }
}

/// The immutable event envelope (`spec.md` §3 Event).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    pub stream_type: StreamType,
    pub stream_id: String,
    pub sequence: Sequence,
    pub occurred_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
    pub causation_id: Option<EventId>,
    pub correlation_id: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
    pub schema_version: u32,
    pub payload: EventPayload,
}

impl Event {
    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }
}
