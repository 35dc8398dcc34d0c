pub mod checkpoint_repository;
pub mod dead_letter_repository;
pub mod event_repository;
pub mod lock_repository;
pub mod mission_repository;
pub mod pattern_repository;
pub mod pilot_repository;
pub mod reservation_repository;
pub mod work_order_repository;

pub use checkpoint_repository::CheckpointRepository;
pub use dead_letter_repository::DeadLetterRepository;
pub use event_repository::{EventFilter, EventRepository};
pub use lock_repository::LockRepository;
pub use mission_repository::{MissionFilter, MissionRepository, SortieRepository};
pub use pattern_repository::PatternRepository;
pub use pilot_repository::PilotRepository;
pub use reservation_repository::ReservationRepository;
pub use work_order_repository::{WorkOrderFilter, WorkOrderRepository};
