//! SQLite infrastructure: connection pooling, migrations, and one
//! sqlx-backed repository adapter per domain port.

pub mod checkpoint_repo;
pub mod connection;
pub mod dead_letter_repo;
pub mod event_repo;
pub mod migrations;
pub mod mission_repo;
pub mod pattern_repo;
pub mod pilot_repo;
pub mod reservation_repo;
pub mod utils;
pub mod work_order_repo;

pub use checkpoint_repo::SqliteCheckpointRepository;
pub use connection::{create_pool, create_test_pool, verify_connection, ConnectionError, PoolConfig};
pub use dead_letter_repo::SqliteDeadLetterRepository;
pub use event_repo::SqliteEventRepository;
pub use migrations::{all_embedded_migrations, Migrator};
pub use mission_repo::{SqliteMissionRepository, SqliteSortieRepository};
pub use pattern_repo::SqlitePatternRepository;
pub use pilot_repo::SqlitePilotRepository;
pub use reservation_repo::{SqliteLockRepository, SqliteReservationRepository};
pub use work_order_repo::SqliteWorkOrderRepository;
