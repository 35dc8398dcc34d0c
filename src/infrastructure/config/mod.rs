//! Layered configuration (`spec.md` §6, `SPEC_FULL.md` §6).
//!
//! Grounded on `infrastructure/config/loader.rs`'s `ConfigLoader`: defaults
//! are merged under a project YAML file, then a local override file, then
//! environment variables, highest precedence last. Field names and defaults
//! mirror the literal environment variable table in `spec.md` §6 rather
//! than the teacher's own naming.

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    #[error("invalid port: {0}")]
    InvalidPort(u16),

    #[error("database path cannot be empty")]
    EmptyDatabasePath,

    #[error("invalid max_concurrent_agents: {0}, must be between 1 and 1000")]
    InvalidMaxConcurrentAgents(u32),

    #[error("invalid task_retry_limit: {0}, must be at least 1")]
    InvalidRetryLimit(u32),

    #[error("invalid rate_limit_rpm: {0}, must be positive")]
    InvalidRateLimit(u32),

    #[error("invalid log format: {0}, must be one of: json, pretty")]
    InvalidLogFormat(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    pub port: u16,
    pub db_path: String,
    /// Externalized-store credentials, unused by the bundled SQLite adapter
    /// but accepted so the config schema matches the documented interface.
    pub db_password: Option<String>,
    pub db_user: Option<String>,
    pub db_host: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub logging: LoggingConfig,
    /// CORS is an external-transport concern: the core accepts and
    /// validates the knob but never enforces it itself.
    pub cors_enabled: bool,
    pub cors_allowed_origins: Vec<String>,
    pub heartbeat_timeout_ms: u64,
    pub reservation_ttl_ms: u64,
    pub lock_ttl_ms: u64,
    pub operation_timeout_ms: u64,
    pub max_concurrent_agents: u32,
    pub task_retry_limit: u32,
    /// Accepted and validated, not enforced — rate limiting is the
    /// transport's concern per `spec.md` §1.
    pub rate_limit_rpm: u32,
    pub inactivity_threshold_ms: u64,
    pub auto_resume: bool,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            db_path: "./.fleet/fleet.db".to_string(),
            db_password: None,
            db_user: None,
            db_host: None,
            db_max_connections: 5,
            db_min_connections: 1,
            logging: LoggingConfig::default(),
            cors_enabled: true,
            cors_allowed_origins: Vec::new(),
            heartbeat_timeout_ms: 180_000,
            reservation_ttl_ms: 3_600_000,
            lock_ttl_ms: 300_000,
            operation_timeout_ms: 30_000,
            max_concurrent_agents: 50,
            task_retry_limit: 3,
            rate_limit_rpm: 100,
            inactivity_threshold_ms: 300_000,
            auto_resume: true,
        }
    }
}

impl FleetConfig {
    pub fn heartbeat_timeout(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.heartbeat_timeout_ms as i64)
    }

    pub fn reservation_ttl(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.reservation_ttl_ms as i64)
    }

    pub fn lock_ttl(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.lock_ttl_ms as i64)
    }

    pub fn operation_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn inactivity_threshold(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.inactivity_threshold_ms as i64)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Precedence (lowest to highest): programmatic defaults, project
    /// `.fleet/config.yaml`, `.fleet/local.yaml` overrides, bare-named
    /// environment variables as enumerated in `spec.md` §6 (`PORT`,
    /// `DB_PATH`, `HEARTBEAT_TIMEOUT_MS`, ...).
    pub fn load() -> Result<FleetConfig, ConfigError> {
        let config: FleetConfig = Figment::new()
            .merge(Serialized::defaults(FleetConfig::default()))
            .merge(Yaml::file(".fleet/config.yaml"))
            .merge(Yaml::file(".fleet/local.yaml"))
            .merge(Env::raw())
            .extract()?;
        Self::validate(&config)?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<FleetConfig, ConfigError> {
        let config: FleetConfig = Figment::new()
            .merge(Serialized::defaults(FleetConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::raw())
            .extract()?;
        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &FleetConfig) -> Result<(), ConfigError> {
        if config.port == 0 {
            return Err(ConfigError::InvalidPort(config.port));
        }
        if config.db_path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.max_concurrent_agents == 0 || config.max_concurrent_agents > 1000 {
            return Err(ConfigError::InvalidMaxConcurrentAgents(config.max_concurrent_agents));
        }
        if config.task_retry_limit == 0 {
            return Err(ConfigError::InvalidRetryLimit(config.task_retry_limit));
        }
        if config.rate_limit_rpm == 0 {
            return Err(ConfigError::InvalidRateLimit(config.rate_limit_rpm));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_validation() {
        assert!(ConfigLoader::validate(&FleetConfig::default()).is_ok());
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut config = FleetConfig::default();
        config.port = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidPort(0))));
    }

    #[test]
    fn zero_retry_limit_is_rejected() {
        let mut config = FleetConfig::default();
        config.task_retry_limit = 0;
        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn env_override_takes_precedence_over_defaults() {
        temp_env::with_var("PORT", Some("9090"), || {
            let config: FleetConfig =
                Figment::new().merge(Serialized::defaults(FleetConfig::default())).merge(Env::raw()).extract().unwrap();
            assert_eq!(config.port, 9090);
        });
    }
}
