pub mod checkpoint;
pub mod dead_letter;
pub mod event;
pub mod lock;
pub mod mission;
pub mod pattern;
pub mod pilot;
pub mod reservation;
pub mod work_order;

pub use checkpoint::{Checkpoint, CheckpointTrigger, MailboxSnapshot, PatternRef, RecoveryContext, ResumePlan};
pub use dead_letter::{CircuitBreakerRecord, CircuitState, DeadLetterEntry};
pub use event::{Event, EventPayload, StreamType};
pub use lock::{Lock, LockStatus, LockWaitQueue};
pub use mission::{Mission, MissionPriority, MissionStatus, Sortie, SortieStatus};
pub use pattern::{
    LearnedPattern, OrderedFloat, OutcomeResult, PatternOutcome, ARCHIVAL_DELTA_THRESHOLD,
    MIN_OUTCOMES_FOR_ARCHIVAL,
};
pub use pilot::{Capability, HealthStatus, Pilot, PilotHealth, PilotStatus};
pub use reservation::{Reservation, ReservationStatus};
pub use work_order::{
    Assignment, DependencyStatus, DependencyType, TaskDependency, WorkOrder, WorkOrderStatus,
};
