pub mod errors;
pub mod ids;
pub mod models;
pub mod ports;

pub use errors::{FleetError, FleetResult};
