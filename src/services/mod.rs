pub mod checkpoint;
pub mod dead_letter;
pub mod dependency_resolver;
pub mod event_log;
pub mod learning;
pub mod mailbox;
pub mod orchestrator;
pub mod pilot_registry;
pub mod priority;
pub mod reservations;
pub mod scheduler;

pub use checkpoint::CheckpointService;
pub use dead_letter::{DeadLetterService, DeliveryOutcome};
pub use dependency_resolver::DependencyResolver;
pub use event_log::EventLog;
pub use learning::{LearningService, PatternTypeMetrics};
pub use mailbox::MailboxService;
pub use orchestrator::Orchestrator;
pub use pilot_registry::PilotRegistry;
pub use priority::{ScoreCalculator, ScoringWeights};
pub use reservations::{LockService, ReservationService};
pub use scheduler::Scheduler;
