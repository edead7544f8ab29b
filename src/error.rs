use crate::models::PollStatus;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PollError>;

#[derive(Debug, Error)]
pub enum PollError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("poll {poll_id} is {actual}, expected {expected}")]
    InvalidState {
        poll_id: String,
        expected: PollStatus,
        actual: PollStatus,
    },

    #[error("poll {0} needs at least two options before it can be published")]
    TooFewOptions(String),

    #[error("voter is not registered for poll {0}")]
    Unauthorized(String),

    /// Results were requested before the poll closed. Never an empty ranking.
    #[error("results for poll {0} are not available until the poll is closed")]
    Sealed(String),

    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("poll {0} not found")]
    NotFound(String),

    #[error("storage failure: {0}")]
    Persistence(sqlx::Error),

    #[error("corrupt stored record: {0}")]
    Decode(String),
}

impl From<sqlx::Error> for PollError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                PollError::Conflict(db_err.message().to_string())
            }
            _ => PollError::Persistence(e),
        }
    }
}

impl From<serde_json::Error> for PollError {
    fn from(e: serde_json::Error) -> Self {
        PollError::Decode(e.to_string())
    }
}
