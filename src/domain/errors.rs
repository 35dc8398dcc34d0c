//! Domain-level error taxonomy for the fleet coordination core.
//!
//! Every variant maps 1:1 to an HTTP status in the (external) transport
//! layer; the mapping lives in `spec.md` §7 and is exposed here as
//! `FleetError::status_hint()` so the CLI/transport can render it without
//! re-deriving the taxonomy.

use thiserror::Error;

/// Crate-wide error type. Background workers never propagate this outward —
/// they log it (`tracing::warn!`) and continue, per `spec.md` §7.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type FleetResult<T> = Result<T, FleetError>;

impl FleetError {
    /// HTTP status code the (external) transport should map this to.
    pub const fn status_hint(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::PreconditionFailed(_) => 412,
            Self::Timeout(_) => 504,
            Self::InvalidInput(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::StorageUnavailable(_) => 503,
            Self::Cancelled(_) => 499,
            Self::Internal(_) => 500,
        }
    }

    /// Exit code for the administrative CLI, per `spec.md` §6.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Timeout(_) => 4,
            Self::Conflict(_) => 3,
            Self::StorageUnavailable(_) => 2,
            _ => 1,
        }
    }

    /// Whether the recovery policy in `spec.md` §7 allows an internal retry.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_) | Self::Timeout(_))
    }
}

impl From<sqlx::Error> for FleetError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound(err.to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::Conflict(db_err.to_string())
            }
            _ => Self::StorageUnavailable(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for FleetError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput(format!("serialization error: {err}"))
    }
}

impl From<crate::domain::ids::IdParseError> for FleetError {
    fn from(err: crate::domain::ids::IdParseError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds_match_recovery_policy() {
        assert!(FleetError::StorageUnavailable("x".into()).is_retryable());
        assert!(FleetError::Timeout("x".into()).is_retryable());
        assert!(!FleetError::Conflict("x".into()).is_retryable());
        assert!(!FleetError::NotFound("x".into()).is_retryable());
    }

    #[test]
    fn status_hints_match_spec_table() {
        assert_eq!(FleetError::NotFound("x".into()).status_hint(), 404);
        assert_eq!(FleetError::Conflict("x".into()).status_hint(), 409);
        assert_eq!(FleetError::PreconditionFailed("x".into()).status_hint(), 412);
        assert_eq!(FleetError::Timeout("x".into()).status_hint(), 504);
        assert_eq!(FleetError::Cancelled("x".into()).status_hint(), 499);
    }
}
