use thiserror::Error;

use crate::models::alert::AlertStatus;

/// Typed errors surfaced by the alert engine. Validation and transition
/// errors never mutate state; store errors leave the in-memory set exactly
/// as it was before the attempt.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("alert {0} not found")]
    NotFound(String),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: AlertStatus, to: AlertStatus },

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("alert store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("concurrent modification of alert {0}, retry with fresh state")]
    Conflict(String),
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => EngineError::NotFound("row not found".to_string()),
            other => EngineError::StoreUnavailable(other.to_string()),
        }
    }
}
