//! Adapters binding the domain ports to concrete infrastructure: SQLite
//! storage, layered configuration, and structured logging.

pub mod config;
pub mod database;
pub mod logging;
