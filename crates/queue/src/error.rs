//! Queue-crate error type — wraps the lower layers plus the couple of
//! preconditions that are specific to the worker-facing signal surface.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("'{0}' is not a valid state id")]
    InvalidStateId(String),

    #[error("{0}")]
    Precondition(String),

    #[error("state already executed")]
    AlreadyExecuted,

    #[error("database error: {0}")]
    Database(#[from] db::DbError),

    #[error("engine error: {0}")]
    Engine(#[from] engine::EngineError),

    #[error("scheduler task failed: {0}")]
    Internal(String),
}

impl QueueError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Database(db::DbError::NotFound))
    }
}
