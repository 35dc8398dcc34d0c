//! Structured logging init (`spec.md` §6 ambient stack).
//!
//! Adapted from `infrastructure/logging/logger.rs`: stdout-only, since the
//! coordination core is meant to run under a process supervisor that
//! captures stdout rather than managing its own log files.

use std::io;

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::infrastructure::config::{LogFormat, LoggingConfig};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level: {0}")]
    InvalidLevel(String),
}

fn parse_level(level: &str) -> Result<Level, LoggingError> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(LoggingError::InvalidLevel(other.to_string())),
    }
}

/// Install the global `tracing` subscriber. Call once, from the binary's
/// `main`, before any other infrastructure is wired up.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let default_level = parse_level(&config.level)?;
    let env_filter = EnvFilter::builder().with_default_directive(default_level.into()).from_env_lossy();

    match config.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .json()
                .with_writer(io::stdout)
                .with_env_filter(env_filter)
                .with_target(true)
                .with_current_span(true)
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt().pretty().with_writer(io::stdout).with_env_filter(env_filter).with_target(true).init();
        }
    }

    tracing::info!(level = %config.level, format = ?config.format, "logger initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_level_is_rejected() {
        assert!(parse_level("verbose").is_err());
    }

    #[test]
    fn known_levels_parse() {
        assert!(matches!(parse_level("INFO"), Ok(Level::INFO)));
        assert!(matches!(parse_level("warn"), Ok(Level::WARN)));
    }
}
