use std::time::Duration;

use thiserror::Error;

use crate::kernel::turn::TurnId;

/// Failure of one reasoning step call. Never surfaced to the user: each variant is
/// turned into a rejection that consumes an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("output does not match contract: {0}")]
    Schema(String),

    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend failure: {0}")]
    Backend(String),
}

/// Retrieval transport failure. "No results" is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    #[error("retrieval backend unavailable: {0}")]
    Unavailable(String),

    #[error("retrieval timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// The only way a turn ends without a user-facing response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    #[error("turn {turn_id} cancelled during attempt {attempt}")]
    Cancelled { turn_id: TurnId, attempt: u32 },
}
