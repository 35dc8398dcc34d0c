//! Fleet coordination core: event log, reservations, locks, scheduling,
//! checkpoints, and learned task patterns for a swarm of AI worker pilots.

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod service;
pub mod services;

pub use domain::errors::{FleetError, FleetResult};
pub use service::FleetService;
