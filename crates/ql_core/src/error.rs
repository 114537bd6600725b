use thiserror::Error;

use crate::models::MatchStatus;

/// Coarse error classification surfaced to callers.
///
/// Automation uses this to distinguish "already handled, safe to ignore"
/// (`Conflict`) from "truly failed, needs attention" (`Storage`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Storage,
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("match {match_id} is already finished")]
    AlreadyFinished { match_id: String },

    #[error("match {match_id} is {actual}, expected {expected}")]
    InvalidStatus { match_id: String, expected: MatchStatus, actual: MatchStatus },

    #[error("virtual clock cannot move backward (current {current}, requested {requested})")]
    ClockBackward { current: chrono::DateTime<chrono::Utc>, requested: chrono::DateTime<chrono::Utc> },

    #[error("need at least {minimum} teams to generate a season, found {found}")]
    InsufficientTeams { minimum: usize, found: usize },

    #[error("user {user_id} has insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { user_id: String, balance: i64, required: i64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_)
            | CoreError::InsufficientTeams { .. }
            | CoreError::InsufficientFunds { .. } => ErrorKind::Validation,
            CoreError::AlreadyFinished { .. }
            | CoreError::InvalidStatus { .. }
            | CoreError::ClockBackward { .. } => ErrorKind::Conflict,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Conflict errors mean the work was already done or the request is stale.
    /// Retrying the same call is safe and will keep failing the same way.
    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
