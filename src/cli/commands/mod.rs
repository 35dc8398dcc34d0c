//! One submodule per CLI command group, mirroring the operations table.

pub mod checkpoint;
pub mod dead_letter;
pub mod lock;
pub mod mission;
pub mod pattern;
pub mod pilot;
pub mod reservation;
pub mod work_order;
